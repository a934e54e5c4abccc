use hull_geom::FACE_COUNT;

/// Logical state of one cell. `Empty` and `Support` (scaffold framing) are
/// passable for atmosphere; `Entity` and `Occupied` are solid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockState {
    #[default]
    Empty,
    Support,
    Entity,
    Occupied,
}

impl BlockState {
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, BlockState::Entity | BlockState::Occupied)
    }
}

/// Surface material on one face of a cell. Surfaces live between two cells
/// and gate what crosses the shared face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Surface {
    #[default]
    None,
    Wall,
    Grate,
    Glass,
}

impl Surface {
    #[inline]
    pub fn air_permeable(self) -> bool {
        matches!(self, Surface::None | Surface::Grate)
    }

    #[inline]
    pub fn light_permeable(self) -> bool {
        matches!(self, Surface::None | Surface::Grate | Surface::Glass)
    }
}

/// One cell of the ship grid. `surfs` is the surface material per face;
/// `surf_space` is the per-face occupancy bitmask reserved by surface-mounted
/// entities (all bits taken means nothing else fits on that face).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Block {
    pub state: BlockState,
    pub surfs: [Surface; FACE_COUNT],
    pub surf_space: [u16; FACE_COUNT],
}

impl Block {
    pub const EMPTY: Block = Block {
        state: BlockState::Empty,
        surfs: [Surface::None; FACE_COUNT],
        surf_space: [0; FACE_COUNT],
    };

    #[inline]
    pub fn is_solid(&self) -> bool {
        self.state.is_solid()
    }
}
