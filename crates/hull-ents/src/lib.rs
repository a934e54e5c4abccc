//! Entity handles and the component store consumed by the zone and wiring
//! engines: stable generational ids, dense per-component pools, and a
//! declarative kind table that says which components each entity kind
//! starts with.
#![forbid(unsafe_code)]

use hull_geom::GridCoord;

mod pool;

pub use pool::Pool;

/// Stable entity handle: a slot index plus a generation that invalidates
/// the handle when the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

pub struct EntityAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> EntityId {
        match self.free.pop() {
            Some(index) => EntityId {
                index,
                generation: self.generations[index as usize],
            },
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(0);
                EntityId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Retire a handle. The slot's generation advances so stale copies of
    /// the id stop matching.
    pub fn release(&mut self, e: EntityId) {
        if self.is_live(e) {
            self.generations[e.index as usize] = e.generation.wrapping_add(1);
            self.free.push(e.index);
        }
    }

    pub fn is_live(&self, e: EntityId) -> bool {
        self.generations
            .get(e.index as usize)
            .is_some_and(|&g| g == e.generation)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Power consumer state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Power {
    pub powered: bool,
    pub required: f32,
}

/// Power provider output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PowerSource {
    pub provided: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightEmit {
    pub intensity: f32,
    pub requested: f32,
}

/// Adds air to the zone it sits in, up to a pressure ceiling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GasPuffer {
    pub flow_rate: f32,
    pub max_pressure: f32,
    pub enabled: bool,
}

/// Samples the pressure of the zone it sits in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PressureProbe {
    pub reading: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Light,
    WarningLight,
    GasPuffer,
    PressureSensor,
    PowerProvider,
    Display,
}

/// Component defaults one entity kind starts with. `spawn` walks this
/// record; adding a kind means adding a row here, not a new branch in
/// spawn logic.
pub struct KindDefaults {
    pub kind: EntityKind,
    pub name: &'static str,
    pub power: Option<Power>,
    pub source: Option<PowerSource>,
    pub light: Option<LightEmit>,
    pub puffer: Option<GasPuffer>,
    pub probe: Option<PressureProbe>,
}

const NO_COMPONENTS: KindDefaults = KindDefaults {
    kind: EntityKind::Display,
    name: "",
    power: None,
    source: None,
    light: None,
    puffer: None,
    probe: None,
};

pub static KIND_TABLE: &[KindDefaults] = &[
    KindDefaults {
        kind: EntityKind::Light,
        name: "light",
        power: Some(Power {
            powered: false,
            required: 0.06,
        }),
        light: Some(LightEmit {
            intensity: 0.0,
            requested: 1.0,
        }),
        ..NO_COMPONENTS
    },
    KindDefaults {
        kind: EntityKind::WarningLight,
        name: "warning_light",
        power: Some(Power {
            powered: false,
            required: 0.02,
        }),
        light: Some(LightEmit {
            intensity: 0.0,
            requested: 0.6,
        }),
        ..NO_COMPONENTS
    },
    KindDefaults {
        kind: EntityKind::GasPuffer,
        name: "gas_puffer",
        power: Some(Power {
            powered: false,
            required: 0.1,
        }),
        puffer: Some(GasPuffer {
            flow_rate: 0.1,
            max_pressure: 1.0,
            enabled: true,
        }),
        ..NO_COMPONENTS
    },
    KindDefaults {
        kind: EntityKind::PressureSensor,
        name: "pressure_sensor",
        probe: Some(PressureProbe { reading: 0.0 }),
        ..NO_COMPONENTS
    },
    KindDefaults {
        kind: EntityKind::PowerProvider,
        name: "power_provider",
        source: Some(PowerSource { provided: 12.0 }),
        ..NO_COMPONENTS
    },
    KindDefaults {
        kind: EntityKind::Display,
        name: "display",
        power: Some(Power {
            powered: false,
            required: 0.04,
        }),
        ..NO_COMPONENTS
    },
];

pub fn kind_defaults(kind: EntityKind) -> &'static KindDefaults {
    KIND_TABLE
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or(&NO_COMPONENTS)
}

/// The whole component store: allocator plus one pool per component type.
pub struct Entities {
    alloc: EntityAllocator,
    pub kinds: Pool<EntityKind>,
    pub positions: Pool<GridCoord>,
    pub power: Pool<Power>,
    pub power_sources: Pool<PowerSource>,
    pub lights: Pool<LightEmit>,
    pub puffers: Pool<GasPuffer>,
    pub probes: Pool<PressureProbe>,
}

impl Entities {
    pub fn new() -> Self {
        Self {
            alloc: EntityAllocator::new(),
            kinds: Pool::new(),
            positions: Pool::new(),
            power: Pool::new(),
            power_sources: Pool::new(),
            lights: Pool::new(),
            puffers: Pool::new(),
            probes: Pool::new(),
        }
    }

    /// Create an entity of `kind` at `at`, attaching the components the
    /// kind table lists for it.
    pub fn spawn(&mut self, kind: EntityKind, at: GridCoord) -> EntityId {
        let e = self.alloc.allocate();
        self.kinds.assign(e, kind);
        self.positions.assign(e, at);
        let d = kind_defaults(kind);
        if let Some(v) = d.power {
            self.power.assign(e, v);
        }
        if let Some(v) = d.source {
            self.power_sources.assign(e, v);
        }
        if let Some(v) = d.light {
            self.lights.assign(e, v);
        }
        if let Some(v) = d.puffer {
            self.puffers.assign(e, v);
        }
        if let Some(v) = d.probe {
            self.probes.assign(e, v);
        }
        log::debug!(target: "ents", "spawned {} as {:?}", d.name, e);
        e
    }

    /// Destroy an entity, detaching every component it holds. Wiring
    /// anchored to it is the wiring engine's business (`detach_entity`).
    pub fn destroy(&mut self, e: EntityId) {
        self.kinds.remove(e);
        self.positions.remove(e);
        self.power.remove(e);
        self.power_sources.remove(e);
        self.lights.remove(e);
        self.puffers.remove(e);
        self.probes.remove(e);
        self.alloc.release(e);
    }

    pub fn is_live(&self, e: EntityId) -> bool {
        self.alloc.is_live(e)
    }
}

impl Default for Entities {
    fn default() -> Self {
        Self::new()
    }
}
