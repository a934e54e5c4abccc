//! End-to-end edit scenarios against the full ship context.

use proptest::prelude::*;

use hullspace::{GridCoord, Ship, ShipGrid, SimConfig, WireType};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hollow 3x3x3 hull: 26 solid boundary cells around one sealed interior
/// cell. Opening any boundary cell dumps the interior air into space.
#[test]
fn hollow_cube_breach_leaks_everything() {
    init_logs();
    let mut ship = Ship::new(SimConfig::default());
    for y in -1..=1 {
        for z in -1..=1 {
            for x in -1..=1 {
                if (x, y, z) != (0, 0, 0) {
                    ship.place_block(GridCoord::new(x, y, z));
                }
            }
        }
    }
    let inside = GridCoord::new(0, 0, 0);
    assert!(!ship.zones.is_outside(inside));
    ship.zones.add_air(&ship.grid, inside, 100.0);
    assert!((ship.counters().total_air - 100.0).abs() < 1e-4);

    ship.remove_block(GridCoord::new(1, 0, 0));
    ship.tick();

    assert!(ship.zones.is_outside(inside));
    assert!((ship.zones.zone_air(inside)).abs() < 1e-6);
    assert!(ship.counters().total_air.abs() < 1e-4);
    assert!((ship.counters().air_leaked - 100.0).abs() < 1e-4);
}

/// 1x5 corridor with 50 air; a block in the middle cell yields two zones
/// of two cells holding exactly 25 each.
#[test]
fn corridor_split_is_exact_for_equal_halves() {
    init_logs();
    let mut ship = Ship::new(SimConfig::default());
    ship.grid = ShipGrid::sealed_room(GridCoord::new(0, 0, 0), 5, 1, 1);
    ship.zones.sync_with_grid(&mut ship.grid);
    ship.zones.add_air(&ship.grid, GridCoord::new(0, 0, 0), 50.0);

    ship.place_block(GridCoord::new(2, 0, 0));

    let left = GridCoord::new(0, 0, 0);
    let right = GridCoord::new(4, 0, 0);
    assert_ne!(ship.zones.zone_root(left), ship.zones.zone_root(right));
    assert_eq!(ship.zones.zone_volume(left), 2);
    assert_eq!(ship.zones.zone_volume(right), 2);
    assert!((ship.zones.zone_air(left) - 25.0).abs() < 1e-4);
    assert!((ship.zones.zone_air(right) - 25.0).abs() < 1e-4);
    assert!((ship.counters().total_air - 50.0).abs() < 1e-4);
    assert_eq!(ship.counters().topo.full_rebuilds, 1);
}

/// Three attachments in a chain; reduction removes the middle one and the
/// tail attachment relocates into its slot.
#[test]
fn wire_chain_reduces_to_direct_segment() {
    init_logs();
    let mut ship = Ship::starter(SimConfig::default());
    let t = |x: f32| {
        hullspace::AttachTransform::new(
            hullspace::Vec3::new(x, 1.5, 2.5),
            hullspace::Vec3::new(0.0, 1.0, 0.0),
        )
    };
    let a = ship.insert_attachment(WireType::Comms, t(0.5), None);
    let b = ship.insert_attachment(WireType::Comms, t(1.5), None);
    let c = ship.insert_attachment(WireType::Comms, t(2.5), None);
    assert!(ship.insert_segment(WireType::Comms, a, b));
    assert!(ship.insert_segment(WireType::Comms, b, c));

    ship.reduce(WireType::Comms);

    let table = ship.wires(WireType::Comms);
    assert_eq!(table.attachment_count(), 2);
    assert_eq!(table.segments().len(), 1);
    // c moved into b's old slot; the surviving segment joins slots 0 and 1.
    assert!(table.segments()[0].connects(0, 1));
    assert!(table.check_consistency());
    assert_eq!(
        ship.topology_find(WireType::Comms, 0),
        ship.topology_find(WireType::Comms, 1)
    );
}

/// A sequence of splits, merges, and a breach never loses track of air:
/// zones plus the leak tally always account for the starting amount.
#[test]
fn edit_sequence_accounts_for_every_unit_of_air() {
    init_logs();
    let mut ship = Ship::starter(SimConfig::default());
    let start = ship.counters().total_air;
    let balance = |ship: &Ship| {
        let c = ship.counters();
        c.total_air + c.air_leaked
    };

    // Partition the room with a wall of blocks, one cell at a time.
    for y in 0..3 {
        for z in 0..5 {
            ship.place_block(GridCoord::new(2, y, z));
            assert!((balance(&ship) - start).abs() < 1e-2);
        }
    }
    assert_ne!(
        ship.zones.zone_root(GridCoord::new(0, 1, 2)),
        ship.zones.zone_root(GridCoord::new(4, 1, 2))
    );

    // Reopen one cell of the wall: the halves merge again.
    ship.remove_block(GridCoord::new(2, 1, 2));
    assert_eq!(
        ship.zones.zone_root(GridCoord::new(0, 1, 2)),
        ship.zones.zone_root(GridCoord::new(4, 1, 2))
    );
    assert!((balance(&ship) - start).abs() < 1e-2);

    // Breach the hull; everything vents but stays accounted.
    ship.remove_block(GridCoord::new(-1, 1, 2));
    ship.tick();
    assert!(ship.zones.is_outside(GridCoord::new(0, 1, 2)));
    assert!(ship.counters().total_air.abs() < 1e-3);
    assert!((balance(&ship) - start).abs() < 1e-2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Arbitrary interior edits through the tool-facing ops: whatever air is
    // not held by a zone has been counted leaked, after every single edit.
    #[test]
    fn interior_edits_keep_air_accounted(
        ops in proptest::collection::vec((0..5i32, 0..3i32, 0..5i32, proptest::bool::ANY), 1..24),
    ) {
        let mut ship = Ship::starter(SimConfig::default());
        let start = ship.counters().total_air;
        for (x, y, z, solid) in ops {
            let c = GridCoord::new(x, y, z);
            if solid {
                ship.place_block(c);
            } else {
                ship.remove_block(c);
            }
            let snap = ship.counters();
            prop_assert!((snap.total_air + snap.air_leaked - start).abs() < 1e-2);
        }
    }
}
