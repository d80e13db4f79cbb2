//! Axis-aligned simulation domain with optional periodic wrap per axis.

use crate::error::{SearchError, SearchResult};

/// Half-open box `[min, max)` with a periodic flag per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<const D: usize> {
    min: [f64; D],
    max: [f64; D],
    periodic: [bool; D],
}

impl<const D: usize> Domain<D> {
    /// Create a domain, rejecting non-finite or non-increasing bounds.
    pub fn new(min: [f64; D], max: [f64; D], periodic: [bool; D]) -> SearchResult<Self> {
        for axis in 0..D {
            let ok = min[axis].is_finite() && max[axis].is_finite() && min[axis] < max[axis];
            if !ok {
                return Err(SearchError::InvalidBounds {
                    axis,
                    min: min[axis],
                    max: max[axis],
                });
            }
        }
        Ok(Self { min, max, periodic })
    }

    /// Minimum corner.
    pub fn min(&self) -> [f64; D] {
        self.min
    }

    /// Maximum corner (exclusive).
    pub fn max(&self) -> [f64; D] {
        self.max
    }

    /// Per-axis periodic flags.
    pub fn periodic(&self) -> [bool; D] {
        self.periodic
    }

    /// Per-axis length `max - min`.
    pub fn extent(&self) -> [f64; D] {
        let mut extent = [0.0; D];
        for d in 0..D {
            extent[d] = self.max[d] - self.min[d];
        }
        extent
    }

    /// `true` if `min <= position < max` on every axis.
    pub fn contains(&self, position: &[f64; D]) -> bool {
        (0..D).all(|d| position[d] >= self.min[d] && position[d] < self.max[d])
    }

    /// Wrap coordinates on periodic axes back into `[min, max)`.
    ///
    /// Non-periodic axes are returned unchanged, so the result may still lie
    /// outside the domain.
    pub fn normalize(&self, mut position: [f64; D]) -> [f64; D] {
        for d in 0..D {
            if !self.periodic[d] {
                continue;
            }
            let extent = self.max[d] - self.min[d];
            let wrapped = self.min[d] + (position[d] - self.min[d]).rem_euclid(extent);
            // rounding can land exactly on max for inputs just below a period boundary
            position[d] = if wrapped >= self.max[d] {
                self.min[d]
            } else {
                wrapped
            };
        }
        position
    }
}
