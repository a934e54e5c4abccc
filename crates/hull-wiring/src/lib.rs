//! Wire attachment and segment graph, one table per wire type.
//!
//! Attachments live in a dense vec where the index is the identity; every
//! removal swap-fills from the tail and fans the index change out to the
//! segment list, the entity-anchor lookup, and the highlight pair through a
//! relocation map staged before anything is mutated. Network membership is
//! a union-find forest rebuilt from the segment list, since parent pointers
//! are index-based and cannot survive an index swap.
#![forbid(unsafe_code)]

use hashbrown::{HashMap, HashSet};

use hull_ents::EntityId;
use hull_geom::{AttachTransform, Vec3};
use hull_topo::{Forest, NodeId};

/// Sentinel for "no attachment".
pub const INVALID_ATTACH: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    Power,
    Comms,
}

pub const WIRE_TYPE_COUNT: usize = 2;

impl WireType {
    pub const ALL: [WireType; WIRE_TYPE_COUNT] = [WireType::Power, WireType::Comms];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            WireType::Power => 0,
            WireType::Comms => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WireType::Power => "power",
            WireType::Comms => "comms",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Attachment {
    pub transform: AttachTransform,
    /// Entity this attachment is mounted on, if any. Anchored attachments
    /// survive reduction and die with their entity.
    pub anchor: Option<EntityId>,
}

/// Unordered pair of attachment indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub first: u32,
    pub second: u32,
}

impl Segment {
    #[inline]
    pub fn connects(&self, a: u32, b: u32) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }

    #[inline]
    fn touches(&self, idx: u32) -> bool {
        self.first == idx || self.second == idx
    }
}

/// The index fix-up produced by one swap-removal, staged completely before
/// any dependent structure is touched.
struct Relocation {
    removed: u32,
    /// The tail index that moves into the vacated slot, when the removal
    /// was not already at the tail.
    moved: Option<(u32, u32)>,
}

pub struct WireTable {
    wire_type: WireType,
    attachments: Vec<Attachment>,
    segments: Vec<Segment>,
    forest: Forest<()>,
    entity_lookup: HashMap<EntityId, HashSet<u32>>,
    // Tool highlight state: the attachment pair a preview wire would join.
    active_pair: Option<(u32, u32)>,
}

impl WireTable {
    pub fn new(wire_type: WireType) -> Self {
        Self {
            wire_type,
            attachments: Vec::new(),
            segments: Vec::new(),
            forest: Forest::new(),
            entity_lookup: HashMap::new(),
            active_pair: None,
        }
    }

    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    #[inline]
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    #[inline]
    pub fn attachment(&self, idx: u32) -> &Attachment {
        &self.attachments[idx as usize]
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn attachments_of(&self, e: EntityId) -> impl Iterator<Item = u32> + '_ {
        self.entity_lookup
            .get(&e)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    #[inline]
    pub fn active_pair(&self) -> Option<(u32, u32)> {
        self.active_pair
    }

    pub fn set_active_pair(&mut self, a: u32, b: u32) {
        self.active_pair = Some((a, b));
    }

    pub fn clear_active_pair(&mut self) {
        self.active_pair = None;
    }

    /// Nearest existing attachment within `radius` of `point`, linear scan.
    pub fn attachment_near(&self, point: Vec3, radius: f32) -> Option<u32> {
        self.nearest_excluding(point, radius, INVALID_ATTACH)
    }

    fn nearest_excluding(&self, point: Vec3, radius: f32, skip: u32) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;
        for (i, a) in self.attachments.iter().enumerate() {
            if i as u32 == skip {
                continue;
            }
            let d = (a.transform.position - point).length_sq();
            if d <= radius * radius && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i as u32, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Place an attachment, snapping onto an existing one within
    /// `snap_radius`. Returns the index either way.
    pub fn insert_attachment(
        &mut self,
        transform: AttachTransform,
        anchor: Option<EntityId>,
        snap_radius: f32,
    ) -> u32 {
        if let Some(existing) = self.attachment_near(transform.position, snap_radius) {
            if let Some(e) = anchor {
                self.anchor_attachment(existing, e);
            }
            return existing;
        }
        let idx = self.attachments.len() as u32;
        self.attachments.push(Attachment { transform, anchor });
        let node = self.forest.alloc();
        debug_assert_eq!(node as usize, idx as usize);
        if let Some(e) = anchor {
            self.entity_lookup.entry(e).or_default().insert(idx);
        }
        log::debug!(
            target: "wiring",
            "{}: attachment {} at ({:.2}, {:.2}, {:.2})",
            self.wire_type.label(), idx,
            transform.position.x, transform.position.y, transform.position.z
        );
        idx
    }

    fn anchor_attachment(&mut self, idx: u32, e: EntityId) {
        let slot = &mut self.attachments[idx as usize];
        match slot.anchor {
            Some(prev) if prev != e => {
                log::warn!(
                    target: "wiring",
                    "{}: attachment {} already anchored, keeping original entity",
                    self.wire_type.label(), idx
                );
            }
            _ => {
                slot.anchor = Some(e);
                self.entity_lookup.entry(e).or_default().insert(idx);
            }
        }
    }

    /// Draw a wire between two attachments. Self-loops and exact duplicates
    /// are rejected; reduction sweeps any that slip in through merges.
    pub fn insert_segment(&mut self, a: u32, b: u32) -> bool {
        debug_assert!((a as usize) < self.attachments.len());
        debug_assert!((b as usize) < self.attachments.len());
        if a == b || self.segments.iter().any(|s| s.connects(a, b)) {
            return false;
        }
        self.segments.push(Segment {
            first: a,
            second: b,
        });
        self.forest.union(a, b);
        true
    }

    /// Drop every segment touching `idx`. Undoing unions is impossible, so
    /// the forest is rebuilt from what remains.
    pub fn remove_segments_containing(&mut self, idx: u32) {
        let before = self.segments.len();
        self.segments.retain(|s| !s.touches(idx));
        if self.segments.len() != before {
            self.rebuild_topology();
        }
    }

    /// Remove one attachment by index. Precondition: `r` is valid.
    ///
    /// Staged as the relocation rule demands: segments touching `r` die,
    /// the tail attachment swap-fills slot `r`, and the {tail -> r} index
    /// move is applied to segment endpoints, entity-lookup sets, and the
    /// highlight pair in one pass before the forest is rebuilt.
    pub fn remove_attachment(&mut self, r: u32) {
        let last = self.attachments.len() as u32 - 1;
        let reloc = Relocation {
            removed: r,
            moved: (r != last).then_some((last, r)),
        };

        self.segments.retain(|s| !s.touches(reloc.removed));
        if let Some(e) = self.attachments[r as usize].anchor
            && let Some(set) = self.entity_lookup.get_mut(&e)
        {
            set.remove(&r);
            if set.is_empty() {
                self.entity_lookup.remove(&e);
            }
        }
        self.attachments.swap_remove(r as usize);
        self.apply_relocation(&reloc);
        self.rebuild_topology();
        log::debug!(
            target: "wiring",
            "{}: removed attachment {} ({} left)",
            self.wire_type.label(), r, self.attachments.len()
        );
    }

    fn apply_relocation(&mut self, reloc: &Relocation) {
        if let Some((old, new)) = reloc.moved {
            for s in &mut self.segments {
                if s.first == old {
                    s.first = new;
                }
                if s.second == old {
                    s.second = new;
                }
            }
            if let Some(e) = self.attachments[new as usize].anchor
                && let Some(set) = self.entity_lookup.get_mut(&e)
            {
                set.remove(&old);
                set.insert(new);
            }
        }
        if let Some((a, b)) = self.active_pair {
            let remap = |idx: u32| -> Option<u32> {
                if idx == reloc.removed {
                    None
                } else if let Some((old, new)) = reloc.moved
                    && idx == old
                {
                    Some(new)
                } else {
                    Some(idx)
                }
            };
            self.active_pair = match (remap(a), remap(b)) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            };
        }
    }

    /// Reposition an attachment. Topology only changes when the new point
    /// snaps onto a different attachment: the dragged one is merged into it
    /// and subsumed through the removal procedure. Returns the index the
    /// attachment lives at afterwards.
    pub fn move_attachment(
        &mut self,
        idx: u32,
        transform: AttachTransform,
        snap_radius: f32,
    ) -> u32 {
        let Some(other) = self.nearest_excluding(transform.position, snap_radius, idx) else {
            self.attachments[idx as usize].transform = transform;
            return idx;
        };
        log::debug!(
            target: "wiring",
            "{}: attachment {} subsumed into {}",
            self.wire_type.label(), idx, other
        );
        // Redirect segments first; collapsed self-loops and duplicates are
        // swept before the subsumed slot is removed.
        for s in &mut self.segments {
            if s.first == idx {
                s.first = other;
            }
            if s.second == idx {
                s.second = other;
            }
        }
        self.sweep_degenerate_segments();
        if let Some(e) = self.attachments[idx as usize].anchor {
            self.anchor_attachment(other, e);
        }
        let last = self.attachments.len() as u32 - 1;
        self.remove_attachment(idx);
        // If `other` was the tail it now lives in the vacated slot.
        if other == last { idx } else { other }
    }

    fn sweep_degenerate_segments(&mut self) {
        let mut seen: Vec<Segment> = Vec::with_capacity(self.segments.len());
        self.segments.retain(|s| {
            if s.first == s.second || seen.iter().any(|k| k.connects(s.first, s.second)) {
                return false;
            }
            seen.push(*s);
            true
        });
    }

    /// Collapse chains to a fixed point: any attachment with exactly two
    /// incident segments and no entity anchor is replaced by a direct
    /// segment between its neighbors. Connectivity is unchanged.
    pub fn reduce(&mut self) {
        loop {
            self.sweep_degenerate_segments();
            let Some((victim, left, right)) = self.find_reducible() else {
                break;
            };
            self.segments.retain(|s| !s.touches(victim));
            if left != right && !self.segments.iter().any(|s| s.connects(left, right)) {
                self.segments.push(Segment {
                    first: left,
                    second: right,
                });
            }
            self.remove_attachment(victim);
        }
        self.rebuild_topology();
    }

    fn find_reducible(&self) -> Option<(u32, u32, u32)> {
        let mut degree = vec![0u32; self.attachments.len()];
        for s in &self.segments {
            degree[s.first as usize] += 1;
            degree[s.second as usize] += 1;
        }
        for (i, a) in self.attachments.iter().enumerate() {
            if degree[i] != 2 || a.anchor.is_some() {
                continue;
            }
            let idx = i as u32;
            let mut ends = [INVALID_ATTACH; 2];
            let mut n = 0;
            for s in &self.segments {
                if s.touches(idx) {
                    ends[n] = if s.first == idx { s.second } else { s.first };
                    n += 1;
                }
            }
            debug_assert_eq!(n, 2);
            return Some((idx, ends[0], ends[1]));
        }
        None
    }

    /// Network root of an attachment; two attachments share a root exactly
    /// when a chain of segments joins them.
    #[inline]
    pub fn topology_find(&mut self, idx: u32) -> NodeId {
        self.forest.find(idx)
    }

    /// Re-derive the forest from the segment list, O(segments).
    pub fn rebuild_topology(&mut self) {
        self.forest = Forest::with_len(self.attachments.len());
        for s in &self.segments {
            self.forest.union(s.first, s.second);
        }
    }

    /// Remove every attachment anchored to `e`, and their segments. Used
    /// when the entity is destroyed.
    pub fn detach_entity(&mut self, e: EntityId) {
        loop {
            let Some(&idx) = self.entity_lookup.get(&e).and_then(|set| set.iter().next())
            else {
                break;
            };
            self.remove_attachment(idx);
        }
        self.entity_lookup.remove(&e);
    }

    /// Cross-structure diagnostics, a read-only companion to the topology
    /// accessors: every index reachable from segments or the entity lookup
    /// addresses a live attachment, anchors agree with the lookup, and the
    /// highlight pair is in bounds. Cheap enough to run after every edit.
    pub fn check_consistency(&self) -> bool {
        let len = self.attachments.len() as u32;
        for s in &self.segments {
            if s.first >= len || s.second >= len || s.first == s.second {
                return false;
            }
        }
        for (e, set) in &self.entity_lookup {
            for &idx in set {
                if idx >= len || self.attachments[idx as usize].anchor != Some(*e) {
                    return false;
                }
            }
        }
        for (i, a) in self.attachments.iter().enumerate() {
            if let Some(e) = a.anchor {
                let ok = self
                    .entity_lookup
                    .get(&e)
                    .is_some_and(|set| set.contains(&(i as u32)));
                if !ok {
                    return false;
                }
            }
        }
        if let Some((a, b)) = self.active_pair
            && (a >= len || b >= len)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hull_ents::EntityAllocator;
    use proptest::prelude::*;

    const SNAP: f32 = 0.025;

    fn at(x: f32, y: f32, z: f32) -> AttachTransform {
        AttachTransform::new(Vec3::new(x, y, z), Vec3::new(0.0, 1.0, 0.0))
    }

    fn table() -> WireTable {
        WireTable::new(WireType::Power)
    }

    #[test]
    fn insert_snaps_to_nearby_attachment() {
        let mut t = table();
        let a = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.01), None, SNAP);
        assert_eq!(a, b);
        assert_eq!(t.attachment_count(), 1);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        assert_ne!(a, c);
        assert_eq!(t.attachment_count(), 2);
    }

    #[test]
    fn remove_middle_relocates_tail_index() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);
        t.set_active_pair(a, c);

        t.remove_attachment(a);

        // c (the tail) now lives in slot 0; its segment endpoint followed.
        assert_eq!(t.attachment_count(), 2);
        assert!(t.check_consistency());
        assert_eq!(t.segments().len(), 1);
        assert!(t.segments()[0].connects(0, b));
        assert_eq!(t.attachment(0).transform.position.x, 2.0);
        // The highlight pair referenced the removed attachment and clears.
        assert_eq!(t.active_pair(), None);
    }

    #[test]
    fn removing_attachment_disconnects_network() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        let d = t.insert_attachment(at(3.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);
        t.insert_segment(c, d);
        assert_eq!(t.topology_find(a), t.topology_find(d));

        t.remove_attachment(b);

        // a sits alone; the c-d segment survives under relocated indices.
        assert!(t.check_consistency());
        assert_eq!(t.segments().len(), 1);
        let s = t.segments()[0];
        assert_ne!(t.topology_find(a), t.topology_find(s.first));
        assert_eq!(t.topology_find(s.first), t.topology_find(s.second));
    }

    #[test]
    fn remove_segments_containing_cuts_only_that_attachment() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        let d = t.insert_attachment(at(3.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);
        t.insert_segment(c, d);

        t.remove_segments_containing(b);

        // b stays as an isolated attachment; only c-d still conducts.
        assert_eq!(t.attachment_count(), 4);
        assert_eq!(t.segments().len(), 1);
        assert!(t.segments()[0].connects(c, d));
        assert_ne!(t.topology_find(a), t.topology_find(b));
        assert_ne!(t.topology_find(a), t.topology_find(c));
        assert_eq!(t.topology_find(c), t.topology_find(d));
        assert!(t.check_consistency());
    }

    #[test]
    fn reduce_collapses_interior_attachment() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);

        t.reduce();

        // b goes away; c relocates into its slot; one direct segment stays.
        assert_eq!(t.attachment_count(), 2);
        assert_eq!(t.segments().len(), 1);
        assert!(t.segments()[0].connects(0, 1));
        assert!(t.check_consistency());
        assert_eq!(t.topology_find(0), t.topology_find(1));
    }

    #[test]
    fn reduce_is_idempotent() {
        let mut t = table();
        let idx: Vec<u32> = (0..6)
            .map(|i| t.insert_attachment(at(i as f32, 0.0, 0.0), None, SNAP))
            .collect();
        for w in idx.windows(2) {
            t.insert_segment(w[0], w[1]);
        }
        t.reduce();
        let after_once: Vec<Segment> = t.segments().to_vec();
        let count_once = t.attachment_count();
        t.reduce();
        assert_eq!(t.segments(), &after_once[..]);
        assert_eq!(t.attachment_count(), count_once);
    }

    #[test]
    fn reduce_spares_anchored_attachments() {
        let mut t = table();
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), Some(e), SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);

        t.reduce();

        assert_eq!(t.attachment_count(), 3);
        assert_eq!(t.segments().len(), 2);
        assert!(t.check_consistency());
    }

    #[test]
    fn reduce_drops_parallel_chain_to_single_segment() {
        // a - b - c and a - c directly: collapsing b would duplicate (a, c).
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);
        t.insert_segment(a, c);

        t.reduce();

        assert_eq!(t.attachment_count(), 2);
        assert_eq!(t.segments().len(), 1);
        assert_eq!(t.topology_find(0), t.topology_find(1));
    }

    #[test]
    fn find_is_stable_under_unrelated_edits() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);
        assert_eq!(t.topology_find(a), t.topology_find(c));

        // Unrelated island elsewhere in the same wire type.
        let d = t.insert_attachment(at(9.0, 0.0, 0.0), None, SNAP);
        let e = t.insert_attachment(at(10.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(d, e);

        assert_eq!(t.topology_find(a), t.topology_find(c));
        assert_ne!(t.topology_find(a), t.topology_find(d));
    }

    #[test]
    fn move_without_snap_only_updates_transform() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        let kept = t.move_attachment(a, at(0.5, 0.5, 0.0), SNAP);
        assert_eq!(kept, a);
        assert_eq!(t.attachment_count(), 2);
        assert_eq!(t.attachment(a).transform.position.y, 0.5);
        assert_eq!(t.topology_find(a), t.topology_find(b));
    }

    #[test]
    fn move_onto_existing_attachment_merges() {
        let mut t = table();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), None, SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), None, SNAP);
        let c = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, c);

        // Drag c onto a: its segment to b transfers, the a-c wire is gone.
        let merged = t.move_attachment(c, at(0.0, 0.0, 0.001), SNAP);
        assert_eq!(t.attachment_count(), 2);
        assert!(t.check_consistency());
        assert_eq!(t.segments().len(), 1);
        assert_eq!(t.topology_find(merged), t.topology_find(b));
    }

    #[test]
    fn detach_entity_removes_its_attachments_and_segments() {
        let mut t = table();
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let a = t.insert_attachment(at(0.0, 0.0, 0.0), Some(e), SNAP);
        let b = t.insert_attachment(at(1.0, 0.0, 0.0), Some(e), SNAP);
        let free = t.insert_attachment(at(2.0, 0.0, 0.0), None, SNAP);
        t.insert_segment(a, b);
        t.insert_segment(b, free);

        t.detach_entity(e);

        assert_eq!(t.attachment_count(), 1);
        assert!(t.segments().is_empty());
        assert_eq!(t.attachments_of(e).count(), 0);
        assert!(t.check_consistency());
    }

    proptest! {
        // Arbitrary insert/segment/remove interleavings never leave a stale
        // index behind in any dependent structure.
        #[test]
        fn edits_keep_indices_consistent(ops in proptest::collection::vec((0u8..3, 0u32..16, 0u32..16), 1..40)) {
            let mut t = table();
            let mut alloc = EntityAllocator::new();
            let anchor = alloc.allocate();
            for (op, x, y) in ops {
                match op {
                    0 => {
                        let anchored = x % 3 == 0;
                        t.insert_attachment(
                            at(x as f32 * 10.0, y as f32 * 10.0, 0.0),
                            anchored.then_some(anchor),
                            SNAP,
                        );
                    }
                    1 => {
                        let len = t.attachment_count() as u32;
                        if len >= 2 {
                            t.insert_segment(x % len, y % len);
                        }
                    }
                    _ => {
                        let len = t.attachment_count() as u32;
                        if len > 0 {
                            t.remove_attachment(x % len);
                        }
                    }
                }
                prop_assert!(t.check_consistency());
            }
            t.reduce();
            prop_assert!(t.check_consistency());
        }
    }
}
