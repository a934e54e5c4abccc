use hull_geom::GridCoord;

use crate::block::Block;

/// Chunk edge length in cells. With 8 we get 8^3 cells per chunk, matching
/// the storage granularity the topology engine allocates nodes in.
pub const CHUNK_SIZE: i32 = 8;
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Address of one chunk in the chunk map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// Chunk containing a world cell.
    #[inline]
    pub fn containing(c: GridCoord) -> Self {
        Self {
            cx: c.x.div_euclid(CHUNK_SIZE),
            cy: c.y.div_euclid(CHUNK_SIZE),
            cz: c.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// World coordinate of this chunk's minimum corner.
    #[inline]
    pub fn base(self) -> GridCoord {
        GridCoord::new(
            self.cx * CHUNK_SIZE,
            self.cy * CHUNK_SIZE,
            self.cz * CHUNK_SIZE,
        )
    }
}

/// Local index of a world cell within its chunk.
#[inline]
pub fn cell_index(c: GridCoord) -> usize {
    let lx = c.x.rem_euclid(CHUNK_SIZE) as usize;
    let ly = c.y.rem_euclid(CHUNK_SIZE) as usize;
    let lz = c.z.rem_euclid(CHUNK_SIZE) as usize;
    (ly * CHUNK_SIZE as usize + lz) * CHUNK_SIZE as usize + lx
}

/// Fixed-size block storage for one chunk.
#[derive(Clone, Debug)]
pub struct Chunk {
    blocks: Vec<Block>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::EMPTY; CHUNK_VOLUME],
        }
    }

    #[inline]
    pub fn get(&self, c: GridCoord) -> &Block {
        &self.blocks[cell_index(c)]
    }

    #[inline]
    pub fn get_mut(&mut self, c: GridCoord) -> &mut Block {
        &mut self.blocks[cell_index(c)]
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}
