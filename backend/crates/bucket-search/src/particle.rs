//! Particle positions as seen by the index, and a reference container.
//!
//! The index only needs indexed read access to positions, expressed by
//! [`PositionSource`]. [`PointCloud`] is a minimal struct-of-arrays
//! container that owns a [`BucketSearch`] and drives its incremental
//! lifecycle on every push, pop, removal and move.

use crate::domain::Domain;
use crate::error::SearchResult;
use crate::query::{NeighbourQuery, Neighbours};
use crate::search::BucketSearch;

/// Indexed access to particle positions.
pub trait PositionSource<const D: usize> {
    /// Number of particles.
    fn len(&self) -> usize;

    /// `true` if there are no particles.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of particle `index`.
    fn position(&self, index: usize) -> [f64; D];
}

impl<const D: usize> PositionSource<D> for [[f64; D]] {
    fn len(&self) -> usize {
        <[[f64; D]]>::len(self)
    }

    #[inline]
    fn position(&self, index: usize) -> [f64; D] {
        self[index]
    }
}

impl<const D: usize> PositionSource<D> for Vec<[f64; D]> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn position(&self, index: usize) -> [f64; D] {
        self[index]
    }
}

/// Struct-of-arrays point storage kept in sync with a bucket index.
///
/// Every particle carries a stable id next to its position, because slot
/// indices change when particles are removed.
#[derive(Debug, Clone)]
pub struct PointCloud<const D: usize> {
    positions: Vec<[f64; D]>,
    ids: Vec<u64>,
    next_id: u64,
    search: BucketSearch<D>,
}

impl<const D: usize> PointCloud<D> {
    /// Create an empty cloud indexed by `search`.
    ///
    /// Anything `search` tracked before is discarded.
    pub fn new(mut search: BucketSearch<D>) -> Self {
        let positions: Vec<[f64; D]> = Vec::new();
        search.embed(&positions);
        Self {
            positions,
            ids: Vec::new(),
            next_id: 0,
            search,
        }
    }

    /// Create an empty cloud over `domain` with the given bucket size.
    pub fn with_domain(domain: Domain<D>, target_side_length: f64) -> SearchResult<Self> {
        Ok(Self::new(BucketSearch::new(domain, target_side_length)?))
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` if the cloud holds no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All positions, indexed by slot.
    pub fn positions(&self) -> &[[f64; D]] {
        &self.positions
    }

    /// Position of slot `index`.
    pub fn position(&self, index: usize) -> [f64; D] {
        self.positions[index]
    }

    /// All ids, indexed by slot.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Id of the particle in slot `index`.
    pub fn id(&self, index: usize) -> u64 {
        self.ids[index]
    }

    /// Domain of the underlying index.
    pub fn domain(&self) -> &Domain<D> {
        self.search.domain()
    }

    /// The underlying index.
    pub fn search(&self) -> &BucketSearch<D> {
        &self.search
    }

    fn admit(&self, position: [f64; D]) -> [f64; D] {
        let position = self.search.domain().normalize(position);
        assert!(
            self.search.domain().contains(&position),
            "particle position {position:?} is outside the domain"
        );
        position
    }

    /// Add a particle and return its id.
    ///
    /// Periodic coordinates are wrapped into the domain.
    ///
    /// # Panics
    /// If the position is outside the domain on a non-periodic axis.
    pub fn push(&mut self, position: [f64; D]) -> u64 {
        let position = self.admit(position);
        let id = self.next_id;
        self.next_id += 1;
        self.positions.push(position);
        self.ids.push(id);
        self.search.append(&self.positions, 1);
        id
    }

    /// Add several particles with a single index update.
    pub fn extend<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = [f64; D]>,
    {
        let before = self.positions.len();
        for position in positions {
            let position = self.admit(position);
            self.positions.push(position);
            self.ids.push(self.next_id);
            self.next_id += 1;
        }
        let added = self.positions.len() - before;
        if added > 0 {
            self.search.append(&self.positions, added);
        }
    }

    /// Remove the last particle.
    pub fn pop(&mut self) -> Option<([f64; D], u64)> {
        let position = self.positions.pop()?;
        let id = self.ids.pop()?;
        self.search.truncate(&self.positions, 1);
        Some((position, id))
    }

    /// Remove the particle in slot `index`, moving the last particle into
    /// its place.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub fn swap_remove(&mut self, index: usize) -> ([f64; D], u64) {
        assert!(
            index < self.positions.len(),
            "swap_remove index {index} out of range (len {})",
            self.positions.len()
        );
        let last = self.positions.len() - 1;
        if index != last {
            self.search.relocate_slot(last, index);
        }
        let position = self.positions.swap_remove(index);
        let id = self.ids.swap_remove(index);
        self.search.truncate(&self.positions, 1);
        (position, id)
    }

    /// Keep only the particles for which `keep(position, id)` is true.
    ///
    /// Removal swaps from the end, so surviving particles may change slot.
    /// Returns the number of particles removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&[f64; D], u64) -> bool,
    {
        let mut removed = 0;
        let mut i = 0;
        while i < self.positions.len() {
            if keep(&self.positions[i], self.ids[i]) {
                i += 1;
            } else {
                self.swap_remove(i);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::trace!("removed {} particles, {} remain", removed, self.positions.len());
        }
        removed
    }

    /// Move slot `index` to `position` (periodic coordinates are wrapped).
    pub fn set_position(&mut self, index: usize, position: [f64; D]) {
        let position = self.admit(position);
        self.positions[index] = position;
        self.search.update_point(index, &position);
    }

    /// Rebuild the index from scratch.
    pub fn rebuild(&mut self) {
        self.search.embed(&self.positions);
    }

    /// Switch to a new domain and bucket size, then re-index.
    ///
    /// # Panics
    /// If a particle falls outside `domain` on a non-periodic axis.
    pub fn set_domain(&mut self, domain: Domain<D>, target_side_length: f64) -> SearchResult<()> {
        self.search.set_domain(domain, target_side_length)?;
        for i in 0..self.positions.len() {
            let position = self.admit(self.positions[i]);
            self.positions[i] = position;
        }
        self.search.embed(&self.positions);
        Ok(())
    }

    /// Neighbour-query snapshot over the current positions.
    pub fn query(&self) -> NeighbourQuery<'_, D, Vec<[f64; D]>> {
        self.search.query(&self.positions)
    }

    /// Neighbour candidates around `position`.
    pub fn neighbours(&self, position: [f64; D]) -> Neighbours<'_, D, Vec<[f64; D]>> {
        self.query().get_neighbours(position)
    }
}

impl<const D: usize> PositionSource<D> for PointCloud<D> {
    fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    fn position(&self, index: usize) -> [f64; D] {
        self.positions[index]
    }
}
