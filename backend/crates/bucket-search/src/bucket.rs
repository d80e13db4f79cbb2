//! Bucket chain heads and the dirty-bucket set.

use std::fmt;
use std::num::NonZeroU32;

use crate::link::Slot;

/// Flat id of a bucket, as recorded by every linked slot.
///
/// Stored off-by-one in a `NonZeroU32` like [`Slot`], so a detached slot's
/// `Option<BucketId>` takes four bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketId(NonZeroU32);

impl BucketId {
    /// Largest representable bucket id.
    pub const MAX_INDEX: usize = u32::MAX as usize - 1;

    /// Wrap a flat bucket id.
    ///
    /// # Panics
    /// If `index` exceeds [`BucketId::MAX_INDEX`].
    #[inline]
    pub fn new(index: usize) -> Self {
        assert!(
            index <= Self::MAX_INDEX,
            "bucket id {index} exceeds the representable range"
        );
        BucketId(NonZeroU32::MIN.saturating_add(index as u32))
    }

    /// The flat bucket id.
    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({})", self.index())
    }
}

/// Buckets touched since the table was last cleared.
///
/// A per-bucket flag keeps the list free of duplicates, so the list never
/// grows beyond the number of buckets. Clearing a table through this set
/// costs O(touched) instead of O(buckets), which pays off when the grid is
/// much larger than the particle count.
#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    touched: Vec<bool>,
    buckets: Vec<usize>,
}

impl DirtySet {
    /// Empty set over `total_buckets` buckets.
    pub fn new(total_buckets: usize) -> Self {
        Self {
            touched: vec![false; total_buckets],
            buckets: Vec::new(),
        }
    }

    /// Record `bucket` as touched.
    #[inline]
    pub fn insert(&mut self, bucket: usize) {
        if !self.touched[bucket] {
            self.touched[bucket] = true;
            self.buckets.push(bucket);
        }
    }

    /// `true` if `bucket` was touched since the last clear.
    pub fn contains(&self, bucket: usize) -> bool {
        self.touched[bucket]
    }

    /// Number of distinct touched buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// `true` if nothing was touched.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Touched buckets in first-touch order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.buckets.iter().copied()
    }

    /// Forget all touched buckets, keeping the allocation.
    pub fn clear(&mut self) {
        for &bucket in &self.buckets {
            self.touched[bucket] = false;
        }
        self.buckets.clear();
    }
}

/// How [`BucketTable::clear`] emptied the heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearStrategy {
    /// Only the listed dirty buckets were reset.
    Selective(usize),
    /// Every bucket was touched, so the whole table was reset.
    Full,
}

/// One chain head per grid bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketTable {
    heads: Vec<Option<Slot>>,
    dirty: DirtySet,
}

impl BucketTable {
    /// Table of `total_buckets` empty buckets.
    pub fn new(total_buckets: usize) -> Self {
        Self {
            heads: vec![None; total_buckets],
            dirty: DirtySet::new(total_buckets),
        }
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// `true` if the table has no buckets (only before a domain is set).
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// First slot of `bucket`'s chain.
    #[inline]
    pub fn head(&self, bucket: usize) -> Option<Slot> {
        self.heads[bucket]
    }

    #[inline]
    pub(crate) fn set_head(&mut self, bucket: usize, head: Option<Slot>) {
        self.heads[bucket] = head;
    }

    /// All chain heads, indexed by flat bucket id.
    pub fn heads(&self) -> &[Option<Slot>] {
        &self.heads
    }

    /// Buckets touched since the last clear.
    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self, bucket: usize) {
        self.dirty.insert(bucket);
    }

    /// Buckets whose chain is non-empty, with their head slot.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, Slot)> + '_ {
        self.heads
            .iter()
            .enumerate()
            .filter_map(|(bucket, head)| head.map(|h| (bucket, h)))
    }

    /// Empty every chain and forget the dirty set.
    ///
    /// Only dirty buckets can hold a head, so resetting those is enough
    /// unless every bucket is dirty anyway.
    pub fn clear(&mut self) -> ClearStrategy {
        let strategy = if self.dirty.len() < self.heads.len() {
            for bucket in self.dirty.iter() {
                self.heads[bucket] = None;
            }
            ClearStrategy::Selective(self.dirty.len())
        } else {
            self.heads.fill(None);
            ClearStrategy::Full
        };
        self.dirty.clear();
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_id_option_is_niche_packed() {
        assert_eq!(std::mem::size_of::<Option<BucketId>>(), 4);
        assert_eq!(BucketId::new(0).index(), 0);
        assert_eq!(BucketId::new(BucketId::MAX_INDEX).index(), BucketId::MAX_INDEX);
        assert_eq!(format!("{:?}", BucketId::new(12)), "BucketId(12)");
    }

    #[test]
    #[should_panic(expected = "exceeds the representable range")]
    fn bucket_id_beyond_range_panics() {
        BucketId::new(u32::MAX as usize);
    }

    #[test]
    fn dirty_set_deduplicates() {
        let mut dirty = DirtySet::new(8);
        dirty.insert(3);
        dirty.insert(5);
        dirty.insert(3);
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(3));
        assert!(!dirty.contains(4));
        assert_eq!(dirty.iter().collect::<Vec<_>>(), vec![3, 5]);

        dirty.clear();
        assert!(dirty.is_empty());
        assert!(!dirty.contains(3));
        dirty.insert(3);
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn clear_resets_only_dirty_buckets() {
        let mut table = BucketTable::new(10);
        table.set_head(2, Some(Slot::new(0)));
        table.mark_dirty(2);
        table.set_head(7, Some(Slot::new(1)));
        table.mark_dirty(7);

        assert_eq!(table.occupied().count(), 2);
        assert_eq!(table.clear(), ClearStrategy::Selective(2));
        assert!(table.heads().iter().all(Option::is_none));
        assert!(table.dirty().is_empty());
    }

    #[test]
    fn clear_falls_back_to_full_reset() {
        let mut table = BucketTable::new(2);
        table.set_head(0, Some(Slot::new(0)));
        table.mark_dirty(0);
        table.set_head(1, Some(Slot::new(1)));
        table.mark_dirty(1);

        assert_eq!(table.clear(), ClearStrategy::Full);
        assert_eq!(table.occupied().count(), 0);
    }
}
