//! Property tests comparing neighbour candidates against brute force.
//!
//! With at least three buckets per axis, the candidates for a query point
//! must contain every particle closer than one bucket side on each axis
//! (minimum image on periodic axes), must not contain anything more than
//! two sides away, and must not repeat a slot.

use std::collections::HashSet;

use bucket_search::{BucketSearch, Domain};
use proptest::prelude::*;

fn place(fraction: (f64, f64, f64), extent: [f64; 3]) -> [f64; 3] {
    let f = [fraction.0, fraction.1, fraction.2];
    let mut p = [0.0; 3];
    for d in 0..3 {
        p[d] = (f[d] * extent[d]).min(extent[d] * (1.0 - 1e-12));
    }
    p
}

fn minimum_image(mut dx: f64, extent: f64, periodic: bool) -> f64 {
    if periodic {
        dx -= extent * (dx / extent).round();
    }
    dx
}

fn check_query(search: &BucketSearch<3>, positions: &[[f64; 3]], centre: [f64; 3]) {
    let domain = search.domain();
    let extent = domain.extent();
    let periodic = domain.periodic();
    let side = search.params().side_length();
    let query = search.query(positions);

    let mut seen = HashSet::new();
    for (j, dx) in query.get_neighbours(centre) {
        assert!(seen.insert(j), "slot {j} returned twice");
        for d in 0..3 {
            let raw = positions[j][d] - centre[d];
            assert!(
                dx[d].abs() < 2.0 * side[d] + 1e-9,
                "slot {j} axis {d}: |dx| {} exceeds two sides {}",
                dx[d],
                side[d]
            );
            let shift = dx[d] - raw;
            if periodic[d] {
                let images = shift / extent[d];
                assert!((images - images.round()).abs() < 1e-9, "axis {d} shift {shift}");
            } else {
                assert!(shift.abs() < 1e-12, "non-periodic axis {d} shifted by {shift}");
            }
        }
    }

    for (j, p) in positions.iter().enumerate() {
        let close = (0..3).all(|d| {
            minimum_image(p[d] - centre[d], extent[d], periodic[d]).abs() < side[d] * (1.0 - 1e-9)
        });
        if close {
            assert!(seen.contains(&j), "slot {j} at {p:?} missed around {centre:?}");
        }
    }
}

fn fraction() -> impl Strategy<Value = (f64, f64, f64)> {
    (0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64)
}

fn fractions() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec(fraction(), 1..80)
}

proptest! {
    #[test]
    fn candidates_cover_brute_force(
        extent in (6.0..12.0f64, 6.0..12.0f64, 6.0..12.0f64),
        target in 1.0..2.0f64,
        periodic in any::<[bool; 3]>(),
        points in fractions(),
    ) {
        let extent = [extent.0, extent.1, extent.2];
        let domain = Domain::new([0.0; 3], extent, periodic).unwrap();
        let mut search = BucketSearch::new(domain, target).unwrap();
        prop_assume!(search.params().bucket_count().iter().all(|&c| c >= 3));

        let positions: Vec<[f64; 3]> = points.iter().map(|&f| place(f, extent)).collect();
        search.embed(&positions);
        search.assert_consistent();

        for &centre in &positions {
            check_query(&search, &positions, centre);
        }
    }

    #[test]
    fn candidates_stay_sound_after_moves(
        target in 1.0..2.0f64,
        periodic in any::<[bool; 3]>(),
        points in fractions(),
        moves in prop::collection::vec((any::<prop::sample::Index>(), fraction()), 0..40),
    ) {
        let extent = [8.0; 3];
        let domain = Domain::new([0.0; 3], extent, periodic).unwrap();
        let mut search = BucketSearch::new(domain, target).unwrap();

        let mut positions: Vec<[f64; 3]> = points.iter().map(|&f| place(f, extent)).collect();
        search.embed(&positions);

        for (index, fraction) in moves {
            let slot = index.index(positions.len());
            let p = place(fraction, extent);
            positions[slot] = p;
            search.update_point(slot, &p);
        }
        search.assert_consistent();

        for &centre in &positions {
            check_query(&search, &positions, centre);
        }
    }
}
