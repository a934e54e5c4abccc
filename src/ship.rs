//! The ship context: grid, zone engine, wiring tables, and entities in one
//! explicit object. Every tool-facing operation and the per-tick passes go
//! through here; nothing in the engine stack is global.

use hashbrown::HashMap;

use hull_ents::{Entities, EntityId, EntityKind};
use hull_geom::{AttachTransform, Face, GridCoord};
use hull_grid::{BlockState, DirtyRegion, ShipGrid, Surface};
use hull_topo::{NodeId, TopoCounters, ZoneEngine};
use hull_wiring::{WIRE_TYPE_COUNT, WireTable, WireType};

use crate::config::SimConfig;

/// Read-only diagnostics snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ShipCounters {
    pub topo: TopoCounters,
    pub total_air: f32,
    pub air_leaked: f32,
}

pub struct Ship {
    pub grid: ShipGrid,
    pub zones: ZoneEngine,
    wires: [WireTable; WIRE_TYPE_COUNT],
    pub ents: Entities,
    pub config: SimConfig,
    pub dirty: DirtyRegion,
}

impl Ship {
    pub fn new(config: SimConfig) -> Self {
        Self {
            grid: ShipGrid::new(),
            zones: ZoneEngine::new(),
            wires: [
                WireTable::new(WireType::Power),
                WireTable::new(WireType::Comms),
            ],
            ents: Entities::new(),
            config,
            dirty: DirtyRegion::default(),
        }
    }

    /// A sealed 5x3x5 starter hull with its interior zone pressurized to
    /// the configured per-cell amount.
    pub fn starter(config: SimConfig) -> Self {
        let mut ship = Ship::new(config);
        ship.grid = ShipGrid::sealed_room(GridCoord::new(0, 0, 0), 5, 3, 5);
        ship.zones.sync_with_grid(&mut ship.grid);
        let inside = GridCoord::new(2, 1, 2);
        let volume = ship.zones.zone_volume(inside) as f32;
        ship.zones
            .add_air(&ship.grid, inside, config.starter_air * volume);
        log::info!(
            target: "ship",
            "starter hull: {} cells pressurized to {:.2}",
            volume, config.starter_air
        );
        ship
    }

    // --- block and surface edit tools -----------------------------------

    /// Fill a cell. Out-of-bounds coordinates grow the grid; filling an
    /// already solid cell is a no-op.
    pub fn place_block(&mut self, c: GridCoord) {
        if self.grid.is_solid(c) {
            return;
        }
        self.grid.set_block_state(c, BlockState::Occupied);
        self.zones.sync_with_grid(&mut self.grid);
        self.zones.block_placed(&self.grid, c);
        self.zones.maybe_compact(&mut self.grid);
        self.dirty.mark(c, 1);
    }

    /// Empty a cell; its zone merges with whatever it now opens onto.
    pub fn remove_block(&mut self, c: GridCoord) {
        if !self.grid.is_solid(c) {
            return;
        }
        self.grid.set_block_state(c, BlockState::Empty);
        self.zones.sync_with_grid(&mut self.grid);
        self.zones.block_removed(&self.grid, c);
        self.zones.maybe_compact(&mut self.grid);
        self.dirty.mark(c, 1);
    }

    /// Install or replace the surface on one face of a cell (mirrored to
    /// the neighbor by the grid), driving the zone engine when the edit
    /// changes whether air can cross.
    pub fn place_surface(&mut self, c: GridCoord, face: Face, s: Surface) {
        let prev = self.grid.surf(c, face);
        if prev == s {
            return;
        }
        self.grid.set_surf(c, face, s);
        self.zones.sync_with_grid(&mut self.grid);
        if prev.air_permeable() && !s.air_permeable() {
            self.zones.surface_placed(&self.grid, c, face);
        } else if !prev.air_permeable() && s.air_permeable() {
            self.zones.surface_removed(&self.grid, c, face);
        }
        self.dirty.mark(c, 1);
    }

    pub fn remove_surface(&mut self, c: GridCoord, face: Face) {
        self.place_surface(c, face, Surface::None);
    }

    // --- wiring tools ---------------------------------------------------

    #[inline]
    pub fn wires(&self, wire_type: WireType) -> &WireTable {
        &self.wires[wire_type.index()]
    }

    #[inline]
    pub fn wires_mut(&mut self, wire_type: WireType) -> &mut WireTable {
        &mut self.wires[wire_type.index()]
    }

    pub fn insert_attachment(
        &mut self,
        wire_type: WireType,
        transform: AttachTransform,
        anchor: Option<EntityId>,
    ) -> u32 {
        let snap = self.config.wire_snap_radius;
        self.wires[wire_type.index()].insert_attachment(transform, anchor, snap)
    }

    pub fn remove_attachment(&mut self, wire_type: WireType, idx: u32) {
        self.wires[wire_type.index()].remove_attachment(idx);
    }

    pub fn insert_segment(&mut self, wire_type: WireType, a: u32, b: u32) -> bool {
        self.wires[wire_type.index()].insert_segment(a, b)
    }

    pub fn move_attachment(
        &mut self,
        wire_type: WireType,
        idx: u32,
        transform: AttachTransform,
    ) -> u32 {
        let snap = self.config.wire_snap_radius;
        self.wires[wire_type.index()].move_attachment(idx, transform, snap)
    }

    pub fn reduce(&mut self, wire_type: WireType) {
        self.wires[wire_type.index()].reduce();
    }

    pub fn topology_find(&mut self, wire_type: WireType, idx: u32) -> NodeId {
        self.wires[wire_type.index()].topology_find(idx)
    }

    // --- entities -------------------------------------------------------

    pub fn spawn_entity(&mut self, kind: EntityKind, at: GridCoord) -> EntityId {
        self.ents.spawn(kind, at)
    }

    /// Destroy an entity and every wire attachment anchored to it, across
    /// all wire types.
    pub fn destroy_entity(&mut self, e: EntityId) {
        for table in &mut self.wires {
            table.detach_entity(e);
        }
        self.ents.destroy(e);
    }

    // --- per-tick passes ------------------------------------------------

    pub fn tick(&mut self) {
        self.zones.clamp_outside();
        self.tick_gas_puffers();
        self.tick_power();
        self.tick_pressure_probes();
        for table in &mut self.wires {
            table.reduce();
        }
    }

    /// Enabled, powered puffers feed air into their zone until it reaches
    /// their pressure ceiling. Puffers sitting in the exterior (or inside a
    /// solid cell) add nothing.
    fn tick_gas_puffers(&mut self) {
        let mut jobs: Vec<(GridCoord, f32, f32)> = Vec::new();
        for (e, puffer) in self.ents.puffers.iter() {
            if !puffer.enabled {
                continue;
            }
            if self.ents.power.get(e).is_some_and(|p| !p.powered) {
                continue;
            }
            if let Some(&at) = self.ents.positions.get(e) {
                jobs.push((at, puffer.flow_rate, puffer.max_pressure));
            }
        }
        for (at, flow, ceiling) in jobs {
            if self.grid.is_solid(at) || self.zones.is_outside(at) {
                continue;
            }
            if self.zones.pressure(at) < ceiling {
                self.zones.add_air(&self.grid, at, flow);
            }
        }
    }

    /// Sum provider output per power-network root, then power every
    /// consumer attached to a root whose supply covers its demand.
    fn tick_power(&mut self) {
        let table = &mut self.wires[WireType::Power.index()];
        let ents = &mut self.ents;

        let mut supply: HashMap<NodeId, f32> = HashMap::new();
        let mut demand: HashMap<NodeId, f32> = HashMap::new();
        let mut roots_of: HashMap<EntityId, Vec<NodeId>> = HashMap::new();

        let attached: Vec<(EntityId, Vec<u32>)> = ents
            .power_sources
            .iter()
            .map(|(e, _)| e)
            .chain(ents.power.iter().map(|(e, _)| e))
            .map(|e| (e, table.attachments_of(e).collect()))
            .collect();
        for (e, idxs) in attached {
            let mut roots: Vec<NodeId> = idxs.iter().map(|&i| table.topology_find(i)).collect();
            roots.sort_unstable();
            roots.dedup();
            roots_of.insert(e, roots);
        }
        for (e, src) in ents.power_sources.iter() {
            if let Some(roots) = roots_of.get(&e) {
                for &r in roots {
                    *supply.entry(r).or_insert(0.0) += src.provided;
                }
            }
        }
        for (e, need) in ents.power.iter() {
            if let Some(roots) = roots_of.get(&e) {
                for &r in roots {
                    *demand.entry(r).or_insert(0.0) += need.required;
                }
            }
        }
        for (e, need) in ents.power.iter_mut() {
            let satisfied = roots_of.get(&e).is_some_and(|roots| {
                roots.iter().any(|r| {
                    let have = supply.get(r).copied().unwrap_or(0.0);
                    have > 0.0 && have >= demand.get(r).copied().unwrap_or(0.0)
                })
            });
            need.powered = satisfied;
        }
        // Lights follow their power state.
        let mut lit: Vec<(EntityId, bool)> = Vec::new();
        for (e, _) in ents.lights.iter() {
            let powered = ents.power.get(e).map(|p| p.powered).unwrap_or(true);
            lit.push((e, powered));
        }
        for (e, powered) in lit {
            if let Some(l) = ents.lights.get_mut(e) {
                l.intensity = if powered { l.requested } else { 0.0 };
            }
        }
    }

    fn tick_pressure_probes(&mut self) {
        let mut readings: Vec<(EntityId, f32)> = Vec::new();
        for (e, _) in self.ents.probes.iter() {
            if let Some(&at) = self.ents.positions.get(e) {
                readings.push((e, self.zones.pressure(at)));
            }
        }
        for (e, reading) in readings {
            if let Some(probe) = self.ents.probes.get_mut(e) {
                probe.reading = reading;
            }
        }
    }

    pub fn counters(&self) -> ShipCounters {
        ShipCounters {
            topo: self.zones.counters(),
            total_air: self.zones.total_air(),
            air_leaked: self.zones.air_leaked(),
        }
    }
}
