//! Bucket search index and its mutation lifecycle.
//!
//! The index never owns particle data. The container tells it how its
//! particle array changed and hands over a [`PositionSource`] to read from:
//!
//! - [`BucketSearch::embed`] rebuilds everything from scratch.
//! - [`BucketSearch::append`] / [`BucketSearch::truncate`] follow pushes and
//!   pops at the end of the array.
//! - [`BucketSearch::update_point`] follows a single particle move.
//! - [`BucketSearch::relocate_slot`] follows a compaction step where the
//!   container copies one particle over another.
//!
//! All of these take `&mut self` while [`BucketSearch::query`] borrows
//! `&self`, so a snapshot can never observe a half-finished mutation.

use crate::bucket::BucketTable;
use crate::domain::Domain;
use crate::error::SearchResult;
use crate::grid::{GridIndexer, GridParams};
use crate::link::{Chain, LinkedListStore, Slot};
use crate::particle::PositionSource;
use crate::query::NeighbourQuery;

/// Uniform-grid index over a particle array.
#[derive(Debug, Clone)]
pub struct BucketSearch<const D: usize> {
    domain: Domain<D>,
    indexer: GridIndexer<D>,
    buckets: BucketTable,
    links: LinkedListStore,
}

impl<const D: usize> BucketSearch<D> {
    /// Create an empty index over `domain` with buckets of roughly
    /// `target_side_length`.
    pub fn new(domain: Domain<D>, target_side_length: f64) -> SearchResult<Self> {
        let params = GridParams::new(&domain, target_side_length)?;
        let search = Self {
            domain,
            indexer: GridIndexer::new(&domain, params),
            buckets: BucketTable::new(params.total_buckets()),
            links: LinkedListStore::default(),
        };
        search.log_grid();
        Ok(search)
    }

    /// Replace the domain and bucket size.
    ///
    /// All buckets are emptied and no slots are tracked afterwards; call
    /// [`embed`](Self::embed) to index the particles again. On error the
    /// index is left untouched.
    pub fn set_domain(&mut self, domain: Domain<D>, target_side_length: f64) -> SearchResult<()> {
        let params = GridParams::new(&domain, target_side_length)?;
        self.domain = domain;
        self.indexer = GridIndexer::new(&domain, params);
        self.buckets = BucketTable::new(params.total_buckets());
        self.links.reset(0);
        self.log_grid();
        Ok(())
    }

    fn log_grid(&self) {
        let params = self.indexer.params();
        tracing::debug!(
            "bucket grid: side_length = {:?}, buckets = {:?} (total = {}), periodic = {:?}",
            params.side_length(),
            params.bucket_count(),
            params.total_buckets(),
            self.domain.periodic(),
        );
    }

    /// Domain covered by the grid.
    pub fn domain(&self) -> &Domain<D> {
        &self.domain
    }

    /// Bucket counts and side lengths.
    pub fn params(&self) -> &GridParams<D> {
        self.indexer.params()
    }

    /// Position -> bucket mapping used by this index.
    pub fn indexer(&self) -> &GridIndexer<D> {
        &self.indexer
    }

    /// Bucket heads and dirty set.
    pub fn buckets(&self) -> &BucketTable {
        &self.buckets
    }

    /// Per-slot chain links.
    pub fn links(&self) -> &LinkedListStore {
        &self.links
    }

    /// Number of slots tracked, which matches the container size between
    /// mutations.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// `true` if no slots are tracked.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of slots currently sitting in a bucket chain.
    pub fn linked_count(&self) -> usize {
        self.links.owners().iter().filter(|owner| owner.is_some()).count()
    }

    /// Slots in `bucket`, in chain order.
    pub fn bucket_members(&self, bucket: usize) -> Chain<'_> {
        self.links.chain(self.buckets.head(bucket))
    }

    /// Rebuild the index for the whole particle array.
    pub fn embed<P>(&mut self, positions: &P)
    where
        P: PositionSource<D> + ?Sized,
    {
        let n = positions.len();
        let strategy = self.buckets.clear();
        self.links.reset(n);
        for i in 0..n {
            let bucket = self.indexer.bucket_of(&positions.position(i));
            self.links.splice_front(&mut self.buckets, i, bucket);
        }
        tracing::trace!(
            "embedded {} particles into {} buckets (cleared: {:?})",
            n,
            self.buckets.dirty().len(),
            strategy,
        );
        self.trace_buckets();
    }

    /// Index the last `count` particles, which the container just appended.
    ///
    /// # Panics
    /// If the container does not hold exactly `count` more particles than
    /// the index tracks.
    pub fn append<P>(&mut self, positions: &P, count: usize)
    where
        P: PositionSource<D> + ?Sized,
    {
        let n = positions.len();
        let start = self.links.len();
        assert_eq!(
            start + count,
            n,
            "append of {count} particles is not consistent with container size {n} (tracking {start})"
        );
        self.links.resize(n);
        for i in start..n {
            let bucket = self.indexer.bucket_of(&positions.position(i));
            self.links.splice_front(&mut self.buckets, i, bucket);
        }
        tracing::trace!("appended {} particles (now {})", count, n);
        self.trace_buckets();
    }

    /// Forget the last `count` slots, which the container just removed.
    ///
    /// Slots detached by [`relocate_slot`](Self::relocate_slot) are dropped
    /// without touching any chain.
    ///
    /// Buckets the removed slots occupied stay in the dirty set even if they
    /// are empty now. The set means "touched since the last clear", so the
    /// next [`embed`](Self::embed) resets them too.
    ///
    /// # Panics
    /// If the container does not hold exactly `count` fewer particles than
    /// the index tracks.
    pub fn truncate<P>(&mut self, positions: &P, count: usize)
    where
        P: PositionSource<D> + ?Sized,
    {
        let n = positions.len();
        let old = self.links.len();
        assert!(
            count <= old && old - count == n,
            "truncate of {count} particles is not consistent with container size {n} (tracking {old})"
        );
        for i in n..old {
            self.links.unsplice(&mut self.buckets, i);
        }
        self.links.resize(n);
        tracing::trace!("truncated {} particles (now {})", count, n);
    }

    /// Move `slot` to the bucket of `new_position`.
    ///
    /// # Panics
    /// If `slot` is not a linked slot, or the position is out of bounds.
    pub fn update_point(&mut self, slot: usize, new_position: &[f64; D]) {
        assert!(
            slot < self.links.len() && self.links.is_linked(slot),
            "cannot update slot {slot}: not a tracked particle"
        );
        let bucket = self.indexer.bucket_of(new_position);
        if self.links.owner(slot) == Some(bucket) {
            return;
        }
        self.links.unsplice(&mut self.buckets, slot);
        self.links.splice_front(&mut self.buckets, slot, bucket);
    }

    /// Record that the container copied the particle in `from` over `to`.
    ///
    /// `to` takes over `from`'s place in its bucket chain and whatever `to`
    /// held before is dropped. `from` is left detached; the container is
    /// expected to remove it next (usually with `truncate`).
    ///
    /// # Panics
    /// If either slot is out of range or `from` is not linked.
    pub fn relocate_slot(&mut self, from: usize, to: usize) {
        let n = self.links.len();
        assert!(
            from < n && to < n,
            "relocate from slot {from} to slot {to} is out of range (tracking {n})"
        );
        self.links.relocate(&mut self.buckets, from, to);
    }

    /// Immutable neighbour-query snapshot over `positions`.
    ///
    /// # Panics
    /// If the container size differs from the number of tracked slots.
    pub fn query<'a, P>(&'a self, positions: &'a P) -> NeighbourQuery<'a, D, P>
    where
        P: PositionSource<D> + ?Sized,
    {
        assert_eq!(
            positions.len(),
            self.links.len(),
            "query positions are not consistent with the indexed particle count"
        );
        NeighbourQuery::new(
            self.domain,
            self.indexer,
            self.buckets.heads(),
            &self.links,
            positions,
        )
    }

    /// Walk every chain and panic on the first broken invariant.
    ///
    /// Checks that backward links mirror forward links, each slot's owner
    /// matches the chain it was found in, no slot is reachable twice, every
    /// linked slot is reachable, and occupied buckets are marked dirty.
    pub fn assert_consistent(&self) {
        let n = self.links.len();
        let mut seen = vec![false; n];
        for bucket in 0..self.buckets.len() {
            let mut prev: Option<Slot> = None;
            let mut cursor = self.buckets.head(bucket);
            if cursor.is_some() {
                assert!(
                    self.buckets.dirty().contains(bucket),
                    "occupied bucket {bucket} is missing from the dirty set"
                );
            }
            while let Some(slot) = cursor {
                let i = slot.index();
                assert!(i < n, "bucket {bucket} links to untracked slot {i}");
                assert!(!seen[i], "slot {i} is reachable twice (found again in bucket {bucket})");
                seen[i] = true;
                assert_eq!(
                    self.links.backward(i),
                    prev,
                    "backward link of slot {i} in bucket {bucket} does not match its chain"
                );
                assert_eq!(
                    self.links.owner(i),
                    Some(bucket),
                    "slot {i} is in the chain of bucket {bucket} but records another owner"
                );
                prev = cursor;
                cursor = self.links.forward(i);
            }
        }
        for (i, owner) in self.links.owners().iter().enumerate() {
            if let Some(bucket) = owner {
                assert!(
                    seen[i],
                    "slot {i} claims bucket {} but is not in any chain",
                    bucket.index()
                );
            }
        }
    }

    fn trace_buckets(&self) {
        if !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        for (bucket, head) in self.buckets.occupied() {
            let members: Vec<usize> = self.links.chain(Some(head)).collect();
            tracing::trace!("bucket {} contents = {:?}", bucket, members);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(side: f64) -> BucketSearch<2> {
        let domain = Domain::new([0.0; 2], [1.0; 2], [false; 2]).unwrap();
        BucketSearch::new(domain, side).unwrap()
    }

    fn sorted(chain: Chain<'_>) -> Vec<usize> {
        let mut v: Vec<usize> = chain.collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn embed_places_every_particle_once() {
        let mut search = unit_square(0.25);
        let positions = vec![[0.1, 0.1], [0.2, 0.2], [0.6, 0.1], [0.9, 0.9]];
        search.embed(&positions);
        search.assert_consistent();

        assert_eq!(search.len(), 4);
        assert_eq!(search.linked_count(), 4);
        let b00 = search.indexer().bucket_of(&[0.1, 0.1]);
        assert_eq!(sorted(search.bucket_members(b00)), vec![0, 1]);
        let b20 = search.indexer().bucket_of(&[0.6, 0.1]);
        assert_eq!(sorted(search.bucket_members(b20)), vec![2]);
    }

    #[test]
    fn re_embed_clears_previous_configuration() {
        let mut search = unit_square(0.25);
        let first = vec![[0.1, 0.1], [0.9, 0.9]];
        search.embed(&first);
        let second = vec![[0.5, 0.5]];
        search.embed(&second);
        search.assert_consistent();

        let old = search.indexer().bucket_of(&[0.9, 0.9]);
        assert_eq!(search.bucket_members(old).count(), 0);
        assert_eq!(search.buckets().occupied().count(), 1);
        assert_eq!(search.buckets().dirty().len(), 1);
    }

    #[test]
    fn append_then_truncate_restores_links() {
        let mut search = unit_square(0.5);
        let mut positions = vec![[0.1, 0.1], [0.7, 0.2]];
        search.embed(&positions);
        let heads = search.buckets().heads().to_vec();
        let links = search.links().clone();

        positions.extend([[0.2, 0.3], [0.8, 0.8], [0.15, 0.05]]);
        search.append(&positions, 3);
        search.assert_consistent();
        assert_eq!(search.linked_count(), 5);

        positions.truncate(2);
        search.truncate(&positions, 3);
        search.assert_consistent();
        assert_eq!(search.buckets().heads(), heads.as_slice());
        assert_eq!(search.links(), &links);
    }

    #[test]
    fn truncate_leaves_vacated_buckets_dirty() {
        let mut search = unit_square(0.5);
        let mut positions = vec![[0.1, 0.1]];
        search.embed(&positions);
        assert_eq!(search.buckets().dirty().len(), 1);

        positions.push([0.9, 0.9]);
        search.append(&positions, 1);
        positions.pop();
        search.truncate(&positions, 1);

        let vacated = search.indexer().bucket_of(&[0.9, 0.9]);
        assert_eq!(search.buckets().dirty().len(), 2);
        assert!(search.buckets().dirty().contains(vacated));
        assert_eq!(search.bucket_members(vacated).count(), 0);
        search.assert_consistent();

        // a rebuild clears the stale entry along with the rest
        search.embed(&positions);
        assert_eq!(search.buckets().dirty().len(), 1);
        assert!(!search.buckets().dirty().contains(vacated));
    }

    #[test]
    #[should_panic(expected = "not consistent with container size")]
    fn append_with_wrong_count_panics() {
        let mut search = unit_square(0.5);
        let positions = vec![[0.1, 0.1], [0.2, 0.2]];
        search.append(&positions, 1);
    }

    #[test]
    #[should_panic(expected = "not consistent with container size")]
    fn truncate_more_than_tracked_panics() {
        let mut search = unit_square(0.5);
        let positions: Vec<[f64; 2]> = Vec::new();
        search.truncate(&positions, 1);
    }

    #[test]
    fn update_point_moves_between_buckets() {
        let mut search = unit_square(0.5);
        let positions = vec![[0.1, 0.1], [0.2, 0.2]];
        search.embed(&positions);

        search.update_point(0, &[0.9, 0.9]);
        search.assert_consistent();
        let old = search.indexer().bucket_of(&[0.1, 0.1]);
        let new = search.indexer().bucket_of(&[0.9, 0.9]);
        assert_eq!(sorted(search.bucket_members(old)), vec![1]);
        assert_eq!(sorted(search.bucket_members(new)), vec![0]);
        assert_eq!(search.links().owner(0), Some(new));
    }

    #[test]
    fn update_point_within_bucket_keeps_chain() {
        let mut search = unit_square(0.5);
        let positions = vec![[0.1, 0.1], [0.2, 0.2]];
        search.embed(&positions);
        let before = search.links().clone();
        search.update_point(1, &[0.3, 0.3]);
        assert_eq!(search.links(), &before);
    }

    #[test]
    fn relocate_then_truncate_compacts() {
        let mut search = unit_square(0.5);
        let mut positions = vec![[0.1, 0.1], [0.9, 0.9], [0.2, 0.8]];
        search.embed(&positions);

        // remove slot 0 by moving the last particle into it
        positions.swap_remove(0);
        search.relocate_slot(2, 0);
        search.truncate(&positions, 1);
        search.assert_consistent();

        assert_eq!(search.len(), 2);
        let b = search.indexer().bucket_of(&[0.2, 0.8]);
        assert_eq!(sorted(search.bucket_members(b)), vec![0]);
        let gone = search.indexer().bucket_of(&[0.1, 0.1]);
        assert_eq!(search.bucket_members(gone).count(), 0);
    }

    #[test]
    #[should_panic(expected = "not a tracked particle")]
    fn update_detached_slot_panics() {
        let mut search = unit_square(0.5);
        let positions = vec![[0.1, 0.1], [0.9, 0.9]];
        search.embed(&positions);
        search.relocate_slot(1, 0);
        search.update_point(1, &[0.5, 0.5]);
    }

    #[test]
    fn set_domain_resets_index() {
        let mut search = unit_square(0.5);
        let positions = vec![[0.1, 0.1]];
        search.embed(&positions);

        let domain = Domain::new([0.0; 2], [4.0; 2], [true; 2]).unwrap();
        search.set_domain(domain, 1.0).unwrap();
        assert_eq!(search.params().bucket_count(), [4, 4]);
        assert!(search.is_empty());
        assert_eq!(search.buckets().occupied().count(), 0);

        search.embed(&positions);
        search.assert_consistent();
        assert_eq!(search.linked_count(), 1);
    }

    #[test]
    fn set_domain_error_keeps_old_grid() {
        let mut search = unit_square(0.5);
        let domain = Domain::new([0.0; 2], [4.0; 2], [false; 2]).unwrap();
        assert!(search.set_domain(domain, -1.0).is_err());
        assert_eq!(search.params().bucket_count(), [2, 2]);
    }
}
