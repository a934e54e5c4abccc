//! Zone topology for the ship interior: union-find components over open
//! cells, incremental maintenance under block and surface edits, and air
//! bookkeeping per zone.
#![forbid(unsafe_code)]

mod forest;
mod zones;

pub use forest::{Forest, NodeId, RootPayload};
pub use zones::{OUTSIDE, TopoCounters, ZoneAir, ZoneEngine};
