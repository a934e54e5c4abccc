//! Incremental air-zone maintenance over the ship grid.
//!
//! Every non-solid cell belongs to exactly one zone: a maximal region
//! connected through open faces. Zone membership lives in a union-find
//! forest; edits are absorbed with cheap local work where possible (a
//! single union on removal, a bounded connectivity probe on placement)
//! and a component rebuild only when a placement genuinely threatens to
//! split a zone.

use hashbrown::{HashMap, HashSet};
use std::collections::VecDeque;

use hull_geom::{Face, GridCoord};
use hull_grid::{CHUNK_VOLUME, ChunkCoord, ShipGrid, cell_index};

use crate::forest::{Forest, NodeId, RootPayload};

/// Sentinel node for the unbounded exterior. Allocated first, so it is
/// always node 0; its component never carries air.
pub const OUTSIDE: NodeId = 0;

/// Air carried by one zone, stored at the component root.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoneAir {
    pub amount: f32,
}

impl RootPayload for ZoneAir {
    #[inline]
    fn merge(self, other: Self) -> Self {
        ZoneAir {
            amount: self.amount + other.amount,
        }
    }
}

/// Running tallies of which maintenance path each edit took.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopoCounters {
    /// Placements or surface edits that forced a component rebuild.
    pub full_rebuilds: u64,
    /// Removals and surface openings absorbed with plain unions.
    pub fast_unifys: u64,
    /// Placements and surface closings proven split-free by a local probe.
    pub fast_nosplits: u64,
    /// Rebuilds whose fragments all re-merged into one zone anyway,
    /// usually by meeting again through the exterior.
    pub false_splits: u64,
}

struct RebuildGroup {
    cells: Vec<GridCoord>,
    exterior: bool,
}

pub struct ZoneEngine {
    forest: Forest<ZoneAir>,
    // Current forest node for every cell of every allocated chunk. A cell
    // gets a fresh node each time it re-enters service (its block removed),
    // so stale nodes can stay parented into old components as dormant links
    // without ever being reset out from under a live parent chain.
    nodes: HashMap<ChunkCoord, Vec<NodeId>>,
    counters: TopoCounters,
    // Air handed to the exterior: breaches, vented split shares, air
    // destroyed by sealing it into a filled cell.
    air_leaked: f32,
}

impl ZoneEngine {
    pub fn new() -> Self {
        let mut forest = Forest::new();
        let outside = forest.alloc();
        debug_assert_eq!(outside, OUTSIDE);
        Self {
            forest,
            nodes: HashMap::new(),
            counters: TopoCounters::default(),
            air_leaked: 0.0,
        }
    }

    #[inline]
    pub fn counters(&self) -> TopoCounters {
        self.counters
    }

    /// Total air handed to the exterior since construction.
    #[inline]
    pub fn air_leaked(&self) -> f32 {
        self.air_leaked
    }

    fn node(&self, c: GridCoord) -> NodeId {
        match self.nodes.get(&ChunkCoord::containing(c)) {
            Some(v) => v[cell_index(c)],
            None => panic!(
                "no topology node for cell ({}, {}, {}); grid growth was not synced",
                c.x, c.y, c.z
            ),
        }
    }

    fn node_opt(&self, c: GridCoord) -> Option<NodeId> {
        self.nodes
            .get(&ChunkCoord::containing(c))
            .map(|v| v[cell_index(c)])
    }

    /// Absorb chunks the grid allocated since the last call: give every
    /// cell a forest node and stitch the new cells into their neighbors'
    /// zones. Faces into still-unallocated space link to the exterior.
    /// Must run after any grid write and before the matching edit call.
    pub fn sync_with_grid(&mut self, grid: &mut ShipGrid) {
        let grown = grid.take_grown();
        if grown.is_empty() {
            return;
        }
        for &cc in &grown {
            let base = self.forest.alloc_n(CHUNK_VOLUME);
            self.nodes
                .insert(cc, (base..base + CHUNK_VOLUME as NodeId).collect());
            log::debug!(
                target: "topo",
                "allocated {} zone nodes for chunk ({}, {}, {})",
                CHUNK_VOLUME, cc.cx, cc.cy, cc.cz
            );
        }
        for &cc in &grown {
            for c in grid.cells_of(cc) {
                if grid.is_solid(c) {
                    continue;
                }
                for (f, nb) in c.neighbors() {
                    if !grid.open_face(c, f) {
                        continue;
                    }
                    let a = self.node(c);
                    match self.node_opt(nb) {
                        Some(b) => self.union_zones(a, b),
                        None => self.union_zones(a, OUTSIDE),
                    }
                }
            }
        }
    }

    /// Union two nodes and keep the exterior airless: whenever a merge
    /// lands air in the exterior component, the air is leaked instead.
    fn union_zones(&mut self, a: NodeId, b: NodeId) {
        let root = self.forest.union(a, b);
        if root == self.forest.find(OUTSIDE)
            && let Some(z) = self.forest.take_payload(OUTSIDE)
        {
            log::debug!(target: "topo", "vented {:.3} air to the exterior", z.amount);
            self.air_leaked += z.amount;
        }
    }

    /// Breadth-first probe of the open region containing `start`, bounded
    /// by `cap` cells. Returns true once every cell in `needed` has been
    /// reached and, if `want_exterior`, the region has touched unallocated
    /// space. Purely read-only; used to prove a placement split nothing.
    fn region_connects(
        &self,
        grid: &ShipGrid,
        start: GridCoord,
        needed: &mut HashSet<GridCoord>,
        want_exterior: bool,
        cap: u32,
    ) -> bool {
        let mut exterior = false;
        let mut visited: HashSet<GridCoord> = HashSet::new();
        let mut queue: VecDeque<GridCoord> = VecDeque::new();
        visited.insert(start);
        needed.remove(&start);
        queue.push_back(start);
        while let Some(cur) = queue.pop_front() {
            if needed.is_empty() && (exterior || !want_exterior) {
                return true;
            }
            for (f, nb) in cur.neighbors() {
                if !grid.open_face(cur, f) {
                    continue;
                }
                if self.node_opt(nb).is_none() {
                    exterior = true;
                    continue;
                }
                if visited.insert(nb) {
                    if visited.len() as u32 > cap {
                        return false;
                    }
                    needed.remove(&nb);
                    queue.push_back(nb);
                }
            }
        }
        needed.is_empty() && (exterior || !want_exterior)
    }

    /// The placed or closed-off cell leaves its component. If the cell's
    /// own node was the root, identity is handed to an heir first so the
    /// surviving members keep resolving to the same component.
    fn detach_cell(&mut self, n: NodeId, old_root: NodeId, old_size: u32, heir: Option<NodeId>) {
        if old_root == n {
            let heir = heir.unwrap_or(OUTSIDE);
            self.forest.reroot(n, heir);
            self.forest.set_size(heir, old_size.saturating_sub(1));
        } else {
            self.forest.set_size(old_root, old_size.saturating_sub(1));
        }
    }

    /// Call after a cell at `c` turned solid (grid already mutated, growth
    /// already synced). Tries the cheap no-split proof first; falls back to
    /// rebuilding the old component and splitting its air by volume.
    pub fn block_placed(&mut self, grid: &ShipGrid, c: GridCoord) {
        let n = self.node(c);
        let old_root = self.forest.find(n);
        let old_size = self.forest.size_of(old_root);
        let outside_root = self.forest.find(OUTSIDE);

        // Neighbors the cell used to link. The cell itself is solid now, so
        // judge each face by its far side only; and only neighbors that were
        // actually members of the old component count (a placement into
        // space that was never part of a zone cannot split one).
        let mut targets: Vec<GridCoord> = Vec::new();
        let mut want_exterior = false;
        for (f, nb) in c.neighbors() {
            if grid.is_solid(nb)
                || !grid.surf(c, f).air_permeable()
                || !grid.surf(nb, f.opposite()).air_permeable()
            {
                continue;
            }
            match self.node_opt(nb) {
                Some(t) => {
                    if self.forest.find(t) == old_root {
                        targets.push(nb);
                    }
                }
                None => {
                    if old_root == outside_root {
                        want_exterior = true;
                    }
                }
            }
        }

        if targets.is_empty() {
            if want_exterior {
                // Only exterior links; the unbounded exterior cannot split.
                self.detach_cell(n, old_root, old_size, None);
            } else if let Some(z) = self.forest.take_payload(n) {
                log::debug!(
                    target: "topo",
                    "sealed {:.3} air into cell ({}, {}, {})",
                    z.amount, c.x, c.y, c.z
                );
                self.air_leaked += z.amount;
            }
            self.counters.fast_nosplits += 1;
            return;
        }

        let mut needed: HashSet<GridCoord> = targets.iter().copied().collect();
        let start = targets[0];
        if self.region_connects(grid, start, &mut needed, want_exterior, old_size) {
            let heir = self.node_opt(start);
            self.detach_cell(n, old_root, old_size, heir);
            self.counters.fast_nosplits += 1;
            return;
        }

        self.rebuild_component(grid, old_root, &targets);
    }

    /// Retire the cell's current node and hand out a fresh singleton. The
    /// retired node stays parented wherever it was, so parent chains that
    /// run through it keep resolving; it just never matches a cell again.
    fn refresh_node(&mut self, c: GridCoord) -> NodeId {
        let cc = ChunkCoord::containing(c);
        let fresh = self.forest.alloc();
        match self.nodes.get_mut(&cc) {
            Some(v) => v[cell_index(c)] = fresh,
            None => panic!(
                "no topology nodes for chunk of cell ({}, {}, {}); grid growth was not synced",
                c.x, c.y, c.z
            ),
        }
        fresh
    }

    /// Call after a cell at `c` turned empty (grid already mutated, growth
    /// already synced). Always the fast path: a fresh node for the cell,
    /// one union per open face.
    pub fn block_removed(&mut self, grid: &ShipGrid, c: GridCoord) {
        let fresh = self.refresh_node(c);
        for (f, nb) in c.neighbors() {
            if !grid.open_face(c, f) {
                continue;
            }
            match self.node_opt(nb) {
                Some(b) => self.union_zones(fresh, b),
                None => self.union_zones(fresh, OUTSIDE),
            }
        }
        self.counters.fast_unifys += 1;
    }

    /// Call after an air-tight surface went up across `face` of `c`.
    pub fn surface_placed(&mut self, grid: &ShipGrid, c: GridCoord, face: Face) {
        let nb = c.neighbor(face);
        if grid.is_solid(c) || grid.is_solid(nb) {
            return;
        }
        let a = self.node(c);
        let b = self.node(nb);
        let old_root = self.forest.find(a);
        if self.forest.find(b) != old_root {
            // The face carried no airflow to begin with.
            return;
        }
        let old_size = self.forest.size_of(old_root);
        let mut needed: HashSet<GridCoord> = HashSet::new();
        needed.insert(nb);
        if self.region_connects(grid, c, &mut needed, false, old_size) {
            self.counters.fast_nosplits += 1;
            return;
        }
        self.rebuild_component(grid, old_root, &[c, nb]);
    }

    /// Call after a surface across `face` of `c` came down or became
    /// air-permeable.
    pub fn surface_removed(&mut self, grid: &ShipGrid, c: GridCoord, face: Face) {
        if !grid.open_face(c, face) {
            return;
        }
        let a = self.node(c);
        match self.node_opt(c.neighbor(face)) {
            Some(b) => self.union_zones(a, b),
            None => self.union_zones(a, OUTSIDE),
        }
        self.counters.fast_unifys += 1;
    }

    /// Re-derive the edited component: flood each seed's region, move every
    /// reached cell onto a fresh node, re-union the fragments, and split the
    /// old air across them in proportion to volume. Fragments that touch the
    /// exterior rejoin the outside component and leak their share.
    ///
    /// The old nodes are left in place rather than reset. The outside
    /// component can hold regions reachable only through unallocated space,
    /// and those must keep resolving through whatever parent chains they
    /// have; abandoning the old structure wholesale is the only safe move.
    fn rebuild_component(&mut self, grid: &ShipGrid, old_root: NodeId, seeds: &[GridCoord]) {
        self.counters.full_rebuilds += 1;
        let old_air = self
            .forest
            .take_payload(old_root)
            .map(|z| z.amount)
            .unwrap_or(0.0);
        let mut visited: HashSet<GridCoord> = HashSet::new();
        let mut groups: Vec<RebuildGroup> = Vec::new();
        for &seed in seeds {
            if !visited.insert(seed) {
                continue;
            }
            let mut cells = vec![seed];
            let mut exterior = false;
            let mut qi = 0;
            while qi < cells.len() {
                let cur = cells[qi];
                qi += 1;
                for (f, nb) in cur.neighbors() {
                    if !grid.open_face(cur, f) {
                        continue;
                    }
                    if self.node_opt(nb).is_none() {
                        exterior = true;
                        continue;
                    }
                    if visited.insert(nb) {
                        cells.push(nb);
                    }
                }
            }
            groups.push(RebuildGroup { cells, exterior });
        }

        for g in &groups {
            for &cell in &g.cells {
                self.refresh_node(cell);
            }
        }
        for g in &groups {
            let rep = self.node(g.cells[0]);
            for &cell in &g.cells[1..] {
                self.forest.union(rep, self.node(cell));
            }
            if g.exterior {
                self.union_zones(rep, OUTSIDE);
            }
        }

        if old_air > 0.0 {
            let total: u32 = groups.iter().map(|g| g.cells.len() as u32).sum();
            let largest = groups
                .iter()
                .enumerate()
                .max_by_key(|(_, g)| g.cells.len())
                .map(|(i, _)| i)
                .unwrap_or(0);
            // The largest fragment takes the residual so the shares sum to
            // exactly the old amount.
            let mut assigned = 0.0f32;
            let mut shares = vec![0.0f32; groups.len()];
            for (i, g) in groups.iter().enumerate() {
                if i != largest {
                    shares[i] = old_air * g.cells.len() as f32 / total as f32;
                    assigned += shares[i];
                }
            }
            shares[largest] = old_air - assigned;
            for (i, g) in groups.iter().enumerate() {
                if shares[i] <= 0.0 {
                    continue;
                }
                let rep = self.node(g.cells[0]);
                if self.forest.find(rep) == self.forest.find(OUTSIDE) {
                    log::debug!(
                        target: "topo",
                        "fragment of {} cell(s) open to the exterior, {:.3} air lost",
                        g.cells.len(), shares[i]
                    );
                    self.air_leaked += shares[i];
                } else {
                    self.forest.merge_payload(rep, ZoneAir { amount: shares[i] });
                }
            }
        }

        if groups.len() > 1 {
            let r0 = self.forest.find(self.node(groups[0].cells[0]));
            let mut rejoined = true;
            for g in &groups[1..] {
                let rep = self.node(g.cells[0]);
                if self.forest.find(rep) != r0 {
                    rejoined = false;
                    break;
                }
            }
            if rejoined {
                self.counters.false_splits += 1;
            }
        }
        log::info!(
            target: "topo",
            "full rebuild around ({}, {}, {}): {} fragment(s), {:.3} air redistributed",
            seeds[0].x, seeds[0].y, seeds[0].z, groups.len(), old_air
        );
    }

    /// Throw the whole forest away and re-derive every zone from the grid.
    /// Air is re-split per old zone across whatever new zones its cells
    /// landed in, by cell count; shares landing outside are leaked. Also
    /// compacts away nodes retired by earlier edits.
    pub fn rebuild_topology(&mut self, grid: &mut ShipGrid) {
        self.sync_with_grid(grid);
        self.counters.full_rebuilds += 1;

        // Old zone of every open cell, and each old zone's air, before the
        // forest is replaced.
        let chunks: Vec<ChunkCoord> = grid.chunk_coords().collect();
        let mut old_zone: HashMap<GridCoord, NodeId> = HashMap::new();
        let mut old_air: HashMap<NodeId, f32> = HashMap::new();
        let outside_before = self.forest.find(OUTSIDE);
        for &cc in &chunks {
            for c in grid.cells_of(cc) {
                if grid.is_solid(c) {
                    continue;
                }
                let r = self.forest.find(self.node(c));
                old_zone.insert(c, r);
            }
        }
        self.forest.for_each_payload(|root, z| {
            old_air.insert(root, z.amount);
        });

        let mut forest: Forest<ZoneAir> = Forest::new();
        let outside = forest.alloc();
        debug_assert_eq!(outside, OUTSIDE);
        self.forest = forest;
        self.nodes.clear();
        for &cc in &chunks {
            let base = self.forest.alloc_n(CHUNK_VOLUME);
            self.nodes
                .insert(cc, (base..base + CHUNK_VOLUME as NodeId).collect());
        }
        for &cc in &chunks {
            for c in grid.cells_of(cc) {
                if grid.is_solid(c) {
                    continue;
                }
                for (f, nb) in c.neighbors() {
                    if !grid.open_face(c, f) {
                        continue;
                    }
                    let a = self.node(c);
                    match self.node_opt(nb) {
                        Some(b) => self.union_zones(a, b),
                        None => self.union_zones(a, OUTSIDE),
                    }
                }
            }
        }

        // Where did each old zone's cells land? Count per (old, new) pair.
        let mut landed: HashMap<(NodeId, NodeId), u32> = HashMap::new();
        for (&c, &old) in &old_zone {
            if old == outside_before {
                continue;
            }
            let new = self.forest.find(self.node(c));
            *landed.entry((old, new)).or_insert(0) += 1;
        }
        for (&old, &amount) in &old_air {
            if amount <= 0.0 {
                continue;
            }
            let mut dests: Vec<(NodeId, u32)> = landed
                .iter()
                .filter(|((o, _), _)| *o == old)
                .map(|((_, n), &count)| (*n, count))
                .collect();
            if dests.is_empty() {
                self.air_leaked += amount;
                continue;
            }
            dests.sort_by_key(|&(_, count)| count);
            let total: u32 = dests.iter().map(|&(_, count)| count).sum();
            let mut assigned = 0.0f32;
            for &(new, count) in &dests[..dests.len() - 1] {
                let share = amount * count as f32 / total as f32;
                assigned += share;
                self.credit_zone(new, share);
            }
            let (largest, _) = dests[dests.len() - 1];
            self.credit_zone(largest, amount - assigned);
        }
        log::info!(
            target: "topo",
            "global topology rebuild over {} chunk(s), {:.3} air re-homed",
            chunks.len(),
            old_air.values().sum::<f32>()
        );
    }

    /// Compacting rebuild once retired nodes outnumber live cells. Every
    /// block removal and every component rebuild retires nodes behind fresh
    /// ones, so churn grows the forest without bound; past the threshold a
    /// global rebuild reclaims it. Returns whether a rebuild ran.
    pub fn maybe_compact(&mut self, grid: &mut ShipGrid) -> bool {
        let live = self.nodes.len() * CHUNK_VOLUME + 1;
        if self.forest.len() <= live * 2 {
            return false;
        }
        log::info!(
            target: "topo",
            "compacting forest: {} nodes over {} cell slots",
            self.forest.len(),
            live
        );
        self.rebuild_topology(grid);
        true
    }

    fn credit_zone(&mut self, root: NodeId, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        if self.forest.find(root) == self.forest.find(OUTSIDE) {
            self.air_leaked += amount;
        } else {
            self.forest.merge_payload(root, ZoneAir { amount });
        }
    }

    /// Current root of the exterior component.
    #[inline]
    pub fn outside_root(&mut self) -> NodeId {
        self.forest.find(OUTSIDE)
    }

    /// Root of the zone containing `c`. Unallocated cells are exterior.
    pub fn zone_root(&mut self, c: GridCoord) -> NodeId {
        match self.node_opt(c) {
            Some(n) => self.forest.find(n),
            None => self.forest.find(OUTSIDE),
        }
    }

    pub fn is_outside(&mut self, c: GridCoord) -> bool {
        let r = self.zone_root(c);
        r == self.forest.find(OUTSIDE)
    }

    /// Air held by the zone containing `c`.
    pub fn zone_air(&mut self, c: GridCoord) -> f32 {
        let r = self.zone_root(c);
        self.forest.payload(r).map(|z| z.amount).unwrap_or(0.0)
    }

    /// Cell count of the zone containing `c`.
    pub fn zone_volume(&mut self, c: GridCoord) -> u32 {
        let r = self.zone_root(c);
        self.forest.size_of(r)
    }

    /// Air per cell; the exterior is hard vacuum.
    pub fn pressure(&mut self, c: GridCoord) -> f32 {
        let r = self.zone_root(c);
        if r == self.forest.find(OUTSIDE) {
            return 0.0;
        }
        let amount = self.forest.payload(r).map(|z| z.amount).unwrap_or(0.0);
        let volume = self.forest.size_of(r).max(1);
        amount / volume as f32
    }

    /// Inject air into the zone containing `c`. Air pumped into the
    /// exterior, or into a solid cell, is lost.
    pub fn add_air(&mut self, grid: &ShipGrid, c: GridCoord, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        if grid.is_solid(c) {
            self.air_leaked += amount;
            return;
        }
        let r = self.zone_root(c);
        if r == self.forest.find(OUTSIDE) {
            self.air_leaked += amount;
            return;
        }
        self.forest.merge_payload(r, ZoneAir { amount });
    }

    /// Air across all interior zones.
    pub fn total_air(&self) -> f32 {
        let mut total = 0.0;
        self.forest.for_each_payload(|_, z| total += z.amount);
        total
    }

    /// Force the exterior back to vacuum. Run once per tick; any air that
    /// slipped into the outside component counts as leaked.
    pub fn clamp_outside(&mut self) {
        let r = self.forest.find(OUTSIDE);
        if let Some(z) = self.forest.take_payload(r) {
            log::warn!(target: "topo", "exterior held {:.3} air at tick boundary", z.amount);
            self.air_leaked += z.amount;
        }
    }
}

impl Default for ZoneEngine {
    fn default() -> Self {
        Self::new()
    }
}
