//! Chunked ship block grid with on-demand bounds growth.
#![forbid(unsafe_code)]

use std::collections::HashMap;

use hull_geom::{Face, GridCoord};

mod block;
mod chunk;

pub use block::{Block, BlockState, Surface};
pub use chunk::{CHUNK_SIZE, CHUNK_VOLUME, Chunk, ChunkCoord, cell_index};

/// Addressable 3D block storage. Chunks are allocated the first time a cell
/// inside them is written; reads outside allocated chunks resolve to empty
/// space (the unbounded exterior).
pub struct ShipGrid {
    chunks: HashMap<ChunkCoord, Chunk>,
    mins: ChunkCoord,
    maxs: ChunkCoord,
    // Chunks allocated since the last `take_grown` call. The topology engine
    // drains this to allocate matching node storage; a cell without a node is
    // a fatal invariant violation, so growth must never be silent.
    grown: Vec<ChunkCoord>,
}

impl ShipGrid {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
            mins: ChunkCoord::new(0, 0, 0),
            maxs: ChunkCoord::new(0, 0, 0),
            grown: Vec::new(),
        }
    }

    /// Chunk-coordinate bounds of allocated space, inclusive.
    #[inline]
    pub fn bounds(&self) -> (ChunkCoord, ChunkCoord) {
        (self.mins, self.maxs)
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Read a cell. `None` means the cell lies outside allocated chunks and
    /// is by definition empty exterior space.
    #[inline]
    pub fn get_block(&self, c: GridCoord) -> Option<&Block> {
        self.chunks.get(&ChunkCoord::containing(c)).map(|ch| ch.get(c))
    }

    /// Fetch a cell for writing, growing the grid if needed. Out-of-bounds
    /// writes grow the grid; they are never an error.
    pub fn ensure_block(&mut self, c: GridCoord) -> &mut Block {
        let cc = ChunkCoord::containing(c);
        if !self.chunks.contains_key(&cc) {
            log::debug!(target: "grid", "allocating chunk ({}, {}, {})", cc.cx, cc.cy, cc.cz);
            self.chunks.insert(cc, Chunk::new());
            self.grown.push(cc);
            if self.chunks.len() == 1 {
                self.mins = cc;
                self.maxs = cc;
            } else {
                self.mins.cx = self.mins.cx.min(cc.cx);
                self.mins.cy = self.mins.cy.min(cc.cy);
                self.mins.cz = self.mins.cz.min(cc.cz);
                self.maxs.cx = self.maxs.cx.max(cc.cx);
                self.maxs.cy = self.maxs.cy.max(cc.cy);
                self.maxs.cz = self.maxs.cz.max(cc.cz);
            }
        }
        self.chunks.entry(cc).or_default().get_mut(c)
    }

    /// Drain the list of chunks allocated since the last call.
    pub fn take_grown(&mut self) -> Vec<ChunkCoord> {
        std::mem::take(&mut self.grown)
    }

    #[inline]
    pub fn set_block_state(&mut self, c: GridCoord, state: BlockState) {
        self.ensure_block(c).state = state;
    }

    /// Solidity from the atmosphere's point of view. Unallocated space is
    /// open exterior, not solid.
    #[inline]
    pub fn is_solid(&self, c: GridCoord) -> bool {
        self.get_block(c).map(|b| b.is_solid()).unwrap_or(false)
    }

    #[inline]
    pub fn surf(&self, c: GridCoord, face: Face) -> Surface {
        self.get_block(c)
            .map(|b| b.surfs[face.index()])
            .unwrap_or(Surface::None)
    }

    pub fn set_surf(&mut self, c: GridCoord, face: Face, s: Surface) {
        self.ensure_block(c).surfs[face.index()] = s;
        // The same physical surface seen from the neighbor cell.
        self.ensure_block(c.neighbor(face)).surfs[face.opposite().index()] = s;
    }

    #[inline]
    pub fn surf_space(&self, c: GridCoord, face: Face) -> u16 {
        self.get_block(c)
            .map(|b| b.surf_space[face.index()])
            .unwrap_or(0)
    }

    pub fn set_surf_space(&mut self, c: GridCoord, face: Face, mask: u16) {
        self.ensure_block(c).surf_space[face.index()] = mask;
    }

    /// Can air cross from `c` into its neighbor across `face`? Both cells
    /// must be non-solid and the shared face must carry no air-tight surface
    /// on either side.
    pub fn open_face(&self, c: GridCoord, face: Face) -> bool {
        if self.is_solid(c) || self.is_solid(c.neighbor(face)) {
            return false;
        }
        self.surf(c, face).air_permeable()
            && self.surf(c.neighbor(face), face.opposite()).air_permeable()
    }

    /// Iterate all world cells of one allocated chunk.
    pub fn cells_of(&self, cc: ChunkCoord) -> impl Iterator<Item = GridCoord> + use<> {
        let base = cc.base();
        (0..CHUNK_SIZE).flat_map(move |y| {
            (0..CHUNK_SIZE).flat_map(move |z| {
                (0..CHUNK_SIZE).map(move |x| base.offset(x, y, z))
            })
        })
    }

    /// Build a sealed rectangular room: `Occupied` walls enclosing an empty
    /// interior of the given size, with the interior minimum corner at `at`.
    /// Used as the starter hull and by tests.
    pub fn sealed_room(at: GridCoord, sx: i32, sy: i32, sz: i32) -> Self {
        let mut g = Self::new();
        for y in -1..=sy {
            for z in -1..=sz {
                for x in -1..=sx {
                    let c = at.offset(x, y, z);
                    let boundary = x == -1
                        || y == -1
                        || z == -1
                        || x == sx
                        || y == sy
                        || z == sz;
                    let b = g.ensure_block(c);
                    b.state = if boundary {
                        BlockState::Occupied
                    } else {
                        BlockState::Empty
                    };
                }
            }
        }
        g
    }
}

impl Default for ShipGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulated bounding region whose derived lighting/physics must be
/// rebuilt. Fire-and-forget: the core only widens the box; a downstream
/// consumer drains it with `take`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirtyRegion {
    span: Option<(GridCoord, GridCoord)>,
}

impl DirtyRegion {
    /// Widen the region to cover `center` plus `halo` cells in each axis.
    pub fn mark(&mut self, center: GridCoord, halo: i32) {
        let lo = center.offset(-halo, -halo, -halo);
        let hi = center.offset(halo, halo, halo);
        self.span = Some(match self.span {
            None => (lo, hi),
            Some((a, b)) => (
                GridCoord::new(a.x.min(lo.x), a.y.min(lo.y), a.z.min(lo.z)),
                GridCoord::new(b.x.max(hi.x), b.y.max(hi.y), b.z.max(hi.z)),
            ),
        });
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.span.is_some()
    }

    pub fn take(&mut self) -> Option<(GridCoord, GridCoord)> {
        self.span.take()
    }
}
