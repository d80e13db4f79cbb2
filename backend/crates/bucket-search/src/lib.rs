//! Uniform-grid bucket search for particle neighbourhoods
//!
//! This crate provides a bucket (cell list) spatial index that is kept in
//! sync with a particle array through incremental mutations, and answers
//! periodic-aware broad-phase neighbour queries without allocating.
//!
//! # Modules
//! - [`domain`] -- Axis-aligned domain bounds with per-axis periodicity.
//! - [`grid`] -- Bucket sizing and position-to-bucket mapping.
//! - [`bucket`] -- Per-bucket chain heads and the dirty-bucket set.
//! - [`link`] -- Intrusive doubly linked chains threaded through particle slots.
//! - [`search`] -- The mutation API that keeps buckets and links consistent.
//! - [`query`] -- Immutable snapshots that enumerate neighbour candidates.
//! - [`particle`] -- Position sources and a reference point-cloud container.
//! - [`config`] -- JSON configuration for building a search index.
//!
//! # Example
//! ```
//! use bucket_search::{BucketSearch, Domain};
//!
//! let domain = Domain::new([0.0; 3], [10.0; 3], [false; 3])?;
//! let mut search = BucketSearch::new(domain, 2.0)?;
//! let positions = vec![[1.0, 1.0, 1.0], [1.9, 1.9, 1.9], [8.0, 8.0, 8.0]];
//! search.embed(&positions);
//!
//! let query = search.query(&positions);
//! let close: Vec<usize> = query.get_neighbours([1.0, 1.0, 1.0]).map(|(j, _)| j).collect();
//! assert_eq!(close.len(), 2);
//! # Ok::<(), bucket_search::SearchError>(())
//! ```

#![warn(missing_docs)]

pub mod bucket;
pub mod config;
pub mod domain;
pub mod error;
pub mod grid;
pub mod link;
pub mod particle;
pub mod query;
pub mod search;

pub use bucket::{BucketId, BucketTable, DirtySet};
pub use config::SearchConfig;
pub use domain::Domain;
pub use error::{SearchError, SearchResult};
pub use grid::{GridIndexer, GridParams};
pub use link::{LinkedListStore, Slot};
pub use particle::{PointCloud, PositionSource};
pub use query::{NeighbourQuery, Neighbours};
pub use search::BucketSearch;
