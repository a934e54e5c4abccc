//! hullspace: incremental spatial topology and wiring maintenance for a
//! voxel ship. Zones of connected empty space carry conserved air through
//! block edits; wire attachments and segments form per-type networks that
//! survive index compaction. [`Ship`] ties the engines together.
#![forbid(unsafe_code)]

mod config;
mod ship;

pub use config::SimConfig;
pub use ship::{Ship, ShipCounters};

pub use hull_ents::{Entities, EntityId, EntityKind};
pub use hull_geom::{AttachTransform, Face, GridCoord, Vec3};
pub use hull_grid::{BlockState, DirtyRegion, ShipGrid, Surface};
pub use hull_topo::{TopoCounters, ZoneEngine};
pub use hull_wiring::{Segment, WireTable, WireType};
