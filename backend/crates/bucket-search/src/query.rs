//! Broad-phase neighbour queries over a bucket search snapshot.
//!
//! A query visits the 3^D block of buckets centred on the bucket of the
//! query point. Offsets are enumerated like an odometer with the last axis
//! turning fastest, which matches the flat bucket ordering. On periodic axes
//! a bucket index that falls off one edge wraps to the other and the
//! candidate displacements are shifted by the domain extent, so they stay
//! physically correct across the seam. On non-periodic axes the bucket is
//! simply skipped.
//!
//! With fewer than three buckets on a periodic axis the block covers the
//! same bucket more than once, and a particle is reported once per image.
//!
//! Candidates come back in no particular order, and a particle sitting at
//! the query point is returned with a zero displacement. Exact distance
//! filtering is left to the caller, or to
//! [`NeighbourQuery::for_each_neighbour`].

use std::iter::FusedIterator;

use crate::domain::Domain;
use crate::grid::{GridIndexer, GridParams};
use crate::link::{LinkedListStore, Slot};
use crate::particle::PositionSource;

/// Read-only view of a [`crate::BucketSearch`] plus the positions it indexes.
pub struct NeighbourQuery<'a, const D: usize, P: ?Sized> {
    domain: Domain<D>,
    extent: [f64; D],
    indexer: GridIndexer<D>,
    heads: &'a [Option<Slot>],
    links: &'a LinkedListStore,
    positions: &'a P,
}

impl<const D: usize, P: ?Sized> Clone for NeighbourQuery<'_, D, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<const D: usize, P: ?Sized> Copy for NeighbourQuery<'_, D, P> {}

impl<'a, const D: usize, P> NeighbourQuery<'a, D, P>
where
    P: PositionSource<D> + ?Sized,
{
    pub(crate) fn new(
        domain: Domain<D>,
        indexer: GridIndexer<D>,
        heads: &'a [Option<Slot>],
        links: &'a LinkedListStore,
        positions: &'a P,
    ) -> Self {
        Self {
            domain,
            extent: domain.extent(),
            indexer,
            heads,
            links,
            positions,
        }
    }

    /// Domain of the snapshot.
    pub fn domain(&self) -> &Domain<D> {
        &self.domain
    }

    /// Grid parameters of the snapshot.
    pub fn params(&self) -> &GridParams<D> {
        self.indexer.params()
    }

    /// Number of particles visible to the snapshot.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` if the snapshot holds no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.len() == 0
    }

    /// Position of particle `slot`.
    pub fn position(&self, slot: usize) -> [f64; D] {
        self.positions.position(slot)
    }

    /// All particles in the buckets surrounding `position`, with their
    /// displacement `neighbour - position` corrected for periodic wrap.
    ///
    /// Every particle within one bucket side length of `position` on every
    /// axis is returned; nothing further than two side lengths is.
    ///
    /// # Panics
    /// If `position` lies outside the domain. Positions on periodic axes
    /// must be normalized first (see [`Domain::normalize`]).
    pub fn get_neighbours(&self, position: [f64; D]) -> Neighbours<'a, D, P> {
        assert!(
            self.domain.contains(&position),
            "search position {position:?} is outside the neighbourhood search bounds {:?}..{:?}",
            self.domain.min(),
            self.domain.max(),
        );
        Neighbours {
            query: *self,
            centre: position,
            home: self.indexer.bucket_vector(&position),
            next_offset: 0,
            cursor: None,
            transpose: [0.0; D],
        }
    }

    /// Call `f(slot, displacement)` for every particle within Euclidean
    /// distance `radius` of `position`, including a particle at `position`
    /// itself.
    ///
    /// Only complete when `radius` does not exceed the bucket side length.
    pub fn for_each_neighbour<F>(&self, position: [f64; D], radius: f64, mut f: F)
    where
        F: FnMut(usize, [f64; D]),
    {
        let radius_sq = radius * radius;
        for (slot, dx) in self.get_neighbours(position) {
            let dist_sq: f64 = dx.iter().map(|c| c * c).sum();
            if dist_sq <= radius_sq {
                f(slot, dx);
            }
        }
    }
}

/// Lazy iterator over `(slot, displacement)` neighbour candidates.
///
/// Holds no allocation; cloning it restarts from the same state.
pub struct Neighbours<'a, const D: usize, P: ?Sized> {
    query: NeighbourQuery<'a, D, P>,
    centre: [f64; D],
    home: [usize; D],
    next_offset: usize,
    cursor: Option<Slot>,
    transpose: [f64; D],
}

impl<const D: usize, P: ?Sized> Clone for Neighbours<'_, D, P> {
    fn clone(&self) -> Self {
        Self {
            query: self.query,
            centre: self.centre,
            home: self.home,
            next_offset: self.next_offset,
            cursor: self.cursor,
            transpose: self.transpose,
        }
    }
}

impl<'a, const D: usize, P> Neighbours<'a, D, P>
where
    P: PositionSource<D> + ?Sized,
{
    const OFFSET_COUNT: usize = 3usize.pow(D as u32);

    /// Resolve the `code`-th offset (base 3, last axis least significant)
    /// into a flat bucket id and the periodic shift of its contents.
    fn candidate(&self, mut code: usize) -> Option<(usize, [f64; D])> {
        let counts = self.query.indexer.params().bucket_count();
        let periodic = self.query.domain.periodic();
        let mut other = [0usize; D];
        let mut transpose = [0.0; D];
        for d in (0..D).rev() {
            let digit = code % 3;
            code /= 3;
            let home = self.home[d];
            other[d] = match digit {
                0 if home == 0 => {
                    if !periodic[d] {
                        return None;
                    }
                    transpose[d] = -self.query.extent[d];
                    counts[d] - 1
                }
                0 => home - 1,
                2 if home + 1 == counts[d] => {
                    if !periodic[d] {
                        return None;
                    }
                    transpose[d] = self.query.extent[d];
                    0
                }
                2 => home + 1,
                _ => home,
            };
        }
        Some((self.query.indexer.flatten(&other), transpose))
    }
}

impl<const D: usize, P> Iterator for Neighbours<'_, D, P>
where
    P: PositionSource<D> + ?Sized,
{
    type Item = (usize, [f64; D]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.cursor {
                let j = slot.index();
                self.cursor = self.query.links.forward(j);
                let p = self.query.positions.position(j);
                let mut dx = [0.0; D];
                for d in 0..D {
                    dx[d] = p[d] - self.centre[d] + self.transpose[d];
                }
                return Some((j, dx));
            }
            if self.next_offset >= Self::OFFSET_COUNT {
                return None;
            }
            let code = self.next_offset;
            self.next_offset += 1;
            if let Some((bucket, transpose)) = self.candidate(code) {
                self.cursor = self.query.heads[bucket];
                self.transpose = transpose;
            }
        }
    }
}

impl<const D: usize, P> FusedIterator for Neighbours<'_, D, P> where
    P: PositionSource<D> + ?Sized
{
}
