//! Intrusive doubly linked bucket chains threaded through particle slots.
//!
//! Every tracked slot stores a forward and a backward link plus the bucket
//! it belongs to. Inserting, removing and moving a slot only touches its
//! immediate neighbours and possibly the bucket head, never the rest of the
//! chain or any other particle.

use std::fmt;
use std::num::NonZeroU32;

use crate::bucket::{BucketId, BucketTable};

/// Index of a particle slot, used as a chain link.
///
/// Stored off-by-one in a `NonZeroU32`, so `Option<Slot>` is the same size
/// as a `u32` and "no link" can never be confused with a real slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(NonZeroU32);

impl Slot {
    /// Largest slot index that can be linked.
    pub const MAX_INDEX: usize = u32::MAX as usize - 1;

    /// Wrap a slot index.
    ///
    /// # Panics
    /// If `index` exceeds [`Slot::MAX_INDEX`].
    #[inline]
    pub fn new(index: usize) -> Self {
        assert!(
            index <= Self::MAX_INDEX,
            "slot index {index} exceeds the linkable range"
        );
        Slot(NonZeroU32::MIN.saturating_add(index as u32))
    }

    /// The slot index.
    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.index())
    }
}

impl From<Slot> for usize {
    fn from(slot: Slot) -> usize {
        slot.index()
    }
}

/// Forward/backward links and owning bucket for each particle slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedListStore {
    forward: Vec<Option<Slot>>,
    backward: Vec<Option<Slot>>,
    owner: Vec<Option<BucketId>>,
}

impl LinkedListStore {
    /// Number of slots tracked (linked or detached).
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// `true` if no slots are tracked.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Next slot in `slot`'s chain.
    #[inline]
    pub fn forward(&self, slot: usize) -> Option<Slot> {
        self.forward[slot]
    }

    /// Previous slot in `slot`'s chain.
    #[inline]
    pub fn backward(&self, slot: usize) -> Option<Slot> {
        self.backward[slot]
    }

    /// Bucket whose chain holds `slot`, or `None` if it is detached.
    #[inline]
    pub fn owner(&self, slot: usize) -> Option<usize> {
        self.owner[slot].map(BucketId::index)
    }

    /// `true` if `slot` currently sits in a bucket chain.
    pub fn is_linked(&self, slot: usize) -> bool {
        self.owner[slot].is_some()
    }

    /// Owning bucket of every slot.
    pub fn owners(&self) -> &[Option<BucketId>] {
        &self.owner
    }

    /// Walk a chain starting at `head`.
    pub fn chain(&self, head: Option<Slot>) -> Chain<'_> {
        Chain {
            links: self,
            cursor: head,
        }
    }

    /// Drop every slot and track `len` detached slots instead.
    pub(crate) fn reset(&mut self, len: usize) {
        self.forward.clear();
        self.backward.clear();
        self.owner.clear();
        self.resize(len);
    }

    /// Grow or shrink the tracked range; new slots start detached.
    pub(crate) fn resize(&mut self, len: usize) {
        self.forward.resize(len, None);
        self.backward.resize(len, None);
        self.owner.resize(len, None);
    }

    /// Insert a detached `slot` at the head of `bucket`'s chain.
    pub(crate) fn splice_front(&mut self, table: &mut BucketTable, slot: usize, bucket: usize) {
        debug_assert!(self.owner[slot].is_none(), "slot {slot} is already linked");
        let this = Slot::new(slot);
        let old_head = table.head(bucket);

        self.forward[slot] = old_head;
        self.backward[slot] = None;
        self.owner[slot] = Some(BucketId::new(bucket));
        if let Some(head) = old_head {
            self.backward[head.index()] = Some(this);
        }
        table.set_head(bucket, Some(this));
        table.mark_dirty(bucket);
    }

    /// Remove `slot` from its chain and detach it.
    ///
    /// Returns the bucket it left, or `None` if it was already detached.
    pub(crate) fn unsplice(&mut self, table: &mut BucketTable, slot: usize) -> Option<usize> {
        let bucket = self.owner[slot].take()?.index();
        let next = self.forward[slot].take();
        let prev = self.backward[slot].take();

        if let Some(next) = next {
            self.backward[next.index()] = prev;
        }
        match prev {
            Some(prev) => self.forward[prev.index()] = next,
            None => {
                assert_eq!(
                    table.head(bucket),
                    Some(Slot::new(slot)),
                    "inconsistent bucket table: slot {slot} is not the head of bucket {bucket}"
                );
                table.set_head(bucket, next);
            }
        }
        Some(bucket)
    }

    /// Give `to` the chain position of `from`, then detach `from`.
    ///
    /// Whatever `to` was linked to before is unspliced first.
    pub(crate) fn relocate(&mut self, table: &mut BucketTable, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.unsplice(table, to);

        let bucket = match self.owner[from].take() {
            Some(bucket) => bucket,
            None => panic!("cannot relocate slot {from}: it is not linked to any bucket"),
        };
        let this = Slot::new(to);
        let next = self.forward[from].take();
        let prev = self.backward[from].take();

        self.forward[to] = next;
        self.backward[to] = prev;
        self.owner[to] = Some(bucket);
        if let Some(next) = next {
            self.backward[next.index()] = Some(this);
        }
        match prev {
            Some(prev) => self.forward[prev.index()] = Some(this),
            None => table.set_head(bucket.index(), Some(this)),
        }
    }
}

/// Iterator over the slot indices of one bucket chain.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    links: &'a LinkedListStore,
    cursor: Option<Slot>,
}

impl Iterator for Chain<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = self.cursor?;
        self.cursor = self.links.forward(slot.index());
        Some(slot.index())
    }
}
