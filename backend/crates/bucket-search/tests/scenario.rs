//! Two particles sharing a bucket in a 5x5x5 grid.
//!
//! Checks grid sizing, bucket assignment and the displacements returned for
//! a query centred on one of the particles.

use bucket_search::{BucketSearch, Domain};

fn setup() -> (BucketSearch<3>, Vec<[f64; 3]>) {
    let domain = Domain::new([0.0; 3], [10.0; 3], [false; 3]).unwrap();
    let mut search = BucketSearch::new(domain, 2.0).unwrap();
    let positions = vec![[1.0, 1.0, 1.0], [1.9, 1.9, 1.9]];
    search.embed(&positions);
    (search, positions)
}

#[test]
fn grid_has_125_buckets_of_side_two() {
    let (search, _) = setup();
    let params = search.params();
    assert_eq!(params.bucket_count(), [5, 5, 5]);
    assert_eq!(params.total_buckets(), 125);
    for side in params.side_length() {
        assert!((side - 2.0).abs() < 1e-12, "side length {side}");
    }
}

#[test]
fn both_particles_map_to_origin_bucket() {
    let (search, positions) = setup();
    let indexer = search.indexer();
    assert_eq!(indexer.bucket_vector(&positions[0]), [0, 0, 0]);
    assert_eq!(indexer.bucket_vector(&positions[1]), [0, 0, 0]);

    let mut members: Vec<usize> = search.bucket_members(0).collect();
    members.sort_unstable();
    assert_eq!(members, vec![0, 1]);
}

#[test]
fn query_returns_neighbour_and_self() {
    let (search, positions) = setup();
    let query = search.query(&positions);

    let mut hits: Vec<(usize, [f64; 3])> = query.get_neighbours([1.0, 1.0, 1.0]).collect();
    hits.sort_by_key(|(j, _)| *j);
    assert_eq!(hits.len(), 2);

    let (self_slot, self_dx) = hits[0];
    assert_eq!(self_slot, 0);
    assert_eq!(self_dx, [0.0, 0.0, 0.0]);

    let (other_slot, other_dx) = hits[1];
    assert_eq!(other_slot, 1);
    for c in other_dx {
        assert!((c - 0.9).abs() < 1e-12, "displacement {other_dx:?}");
    }
}

#[test]
fn callers_filter_self_by_index() {
    let (search, positions) = setup();
    let query = search.query(&positions);
    let others: Vec<usize> = query
        .get_neighbours(positions[0])
        .filter(|(j, _)| *j != 0)
        .map(|(j, _)| j)
        .collect();
    assert_eq!(others, vec![1]);
}

#[test]
fn distant_bucket_is_not_visited() {
    let domain = Domain::new([0.0; 3], [10.0; 3], [false; 3]).unwrap();
    let mut search = BucketSearch::new(domain, 2.0).unwrap();
    let positions = vec![[1.0, 1.0, 1.0], [5.0, 1.0, 1.0]];
    search.embed(&positions);
    let query = search.query(&positions);

    let found: Vec<usize> = query.get_neighbours([1.0, 1.0, 1.0]).map(|(j, _)| j).collect();
    assert_eq!(found, vec![0]);
}

#[test]
fn completeness_after_embed() {
    let domain = Domain::new([0.0; 3], [10.0; 3], [false; 3]).unwrap();
    let mut search = BucketSearch::new(domain, 2.0).unwrap();
    let positions: Vec<[f64; 3]> = (0..200)
        .map(|i| {
            let t = i as f64;
            [(t * 0.37) % 10.0, (t * 0.71) % 10.0, (t * 0.13) % 10.0]
        })
        .collect();
    search.embed(&positions);
    search.assert_consistent();

    let mut all: Vec<usize> = (0..search.params().total_buckets())
        .flat_map(|b| search.bucket_members(b))
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..positions.len()).collect::<Vec<_>>());
}
