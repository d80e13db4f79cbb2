//! Bucket sizing and the position -> bucket mapping.
//!
//! Buckets tile the domain exactly: the requested side length is only a
//! target, and the real side length per axis is `extent / bucket_count`.
//! Flat bucket ids are row-major with the last axis contiguous, so the id of
//! a bucket is stable for a given domain and side length.

use crate::domain::Domain;
use crate::error::{SearchError, SearchResult};

/// Per-axis bucket counts and side lengths derived from a domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams<const D: usize> {
    bucket_count: [usize; D],
    side_length: [f64; D],
}

impl<const D: usize> GridParams<D> {
    /// Upper bound on the total number of buckets in one grid.
    pub const MAX_TOTAL_BUCKETS: usize = 1 << 28;

    /// Derive grid parameters so that buckets are at least `target_side_length`
    /// wide (or span the whole axis if the domain is narrower than that).
    ///
    /// Fails if the grid would need more than
    /// [`MAX_TOTAL_BUCKETS`](Self::MAX_TOTAL_BUCKETS) buckets.
    pub fn new(domain: &Domain<D>, target_side_length: f64) -> SearchResult<Self> {
        if !(target_side_length.is_finite() && target_side_length > 0.0) {
            return Err(SearchError::InvalidSideLength(target_side_length));
        }
        let extent = domain.extent();
        let mut bucket_count = [1usize; D];
        let mut side_length = [0.0; D];
        let mut total = 1usize;
        for d in 0..D {
            let ratio = (extent[d] / target_side_length).floor();
            if !ratio.is_finite() || ratio > Self::MAX_TOTAL_BUCKETS as f64 {
                return Err(Self::too_large(extent, target_side_length));
            }
            bucket_count[d] = (ratio as usize).max(1);
            side_length[d] = extent[d] / bucket_count[d] as f64;
            total = total
                .checked_mul(bucket_count[d])
                .filter(|&t| t <= Self::MAX_TOTAL_BUCKETS)
                .ok_or_else(|| Self::too_large(extent, target_side_length))?;
        }
        Ok(Self {
            bucket_count,
            side_length,
        })
    }

    fn too_large(extent: [f64; D], target_side_length: f64) -> SearchError {
        SearchError::InvalidConfig(format!(
            "grid too large: extent {extent:?} with bucket side {target_side_length} needs more than {} buckets",
            Self::MAX_TOTAL_BUCKETS
        ))
    }

    /// Number of buckets along each axis.
    pub fn bucket_count(&self) -> [usize; D] {
        self.bucket_count
    }

    /// Bucket side length along each axis.
    pub fn side_length(&self) -> [f64; D] {
        self.side_length
    }

    /// Total number of buckets in the grid (at most
    /// [`MAX_TOTAL_BUCKETS`](Self::MAX_TOTAL_BUCKETS)).
    pub fn total_buckets(&self) -> usize {
        self.bucket_count.iter().product()
    }
}

/// Stateless mapping from positions to bucket coordinates and flat ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndexer<const D: usize> {
    min: [f64; D],
    max: [f64; D],
    params: GridParams<D>,
}

impl<const D: usize> GridIndexer<D> {
    /// Build an indexer for `domain` with the given grid parameters.
    pub fn new(domain: &Domain<D>, params: GridParams<D>) -> Self {
        Self {
            min: domain.min(),
            max: domain.max(),
            params,
        }
    }

    /// Grid parameters this indexer maps onto.
    pub fn params(&self) -> &GridParams<D> {
        &self.params
    }

    /// Map a position to its bucket coordinate.
    ///
    /// # Panics
    /// If the position lies outside `[min, max)` on any axis. Positions on
    /// periodic axes must be normalized by the caller.
    #[inline]
    pub fn bucket_vector(&self, position: &[f64; D]) -> [usize; D] {
        let mut vector = [0usize; D];
        for d in 0..D {
            let offset = position[d] - self.min[d];
            assert!(
                offset >= 0.0 && position[d] < self.max[d],
                "position {position:?} is outside the search bounds {:?}..{:?} on axis {d}",
                self.min,
                self.max,
            );
            let cell = (offset / self.params.side_length[d]).floor() as usize;
            vector[d] = cell.min(self.params.bucket_count[d] - 1);
        }
        vector
    }

    /// Collapse a bucket coordinate into a flat id (last axis contiguous).
    #[inline]
    pub fn flatten(&self, vector: &[usize; D]) -> usize {
        let mut index = 0;
        for d in 0..D {
            debug_assert!(
                vector[d] < self.params.bucket_count[d],
                "bucket coordinate {vector:?} outside grid {:?}",
                self.params.bucket_count
            );
            index = index * self.params.bucket_count[d] + vector[d];
        }
        index
    }

    /// Flat bucket id of a position.
    #[inline]
    pub fn bucket_of(&self, position: &[f64; D]) -> usize {
        self.flatten(&self.bucket_vector(position))
    }
}
