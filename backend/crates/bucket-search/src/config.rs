//! Configuration parsing and validation for bucket search indices

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::{SearchError, SearchResult};
use crate::search::BucketSearch;

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Human-readable configuration name
    pub name: String,
    /// Domain bounds, one entry per axis
    pub domain: DomainBounds,
    /// Periodic flag per axis (empty means no periodic axes)
    #[serde(default)]
    pub periodic: Vec<bool>,
    /// Target bucket side length; buckets are stretched to tile the domain
    pub bucket_side_length: f64,
}

/// Domain bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBounds {
    /// Minimum corner
    pub min: Vec<f64>,
    /// Maximum corner (exclusive)
    pub max: Vec<f64>,
}

impl SearchConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> SearchResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SearchError::Io(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> SearchResult<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of axes described by the configuration
    pub fn dimension(&self) -> usize {
        self.domain.min.len()
    }

    /// Validate the configuration
    pub fn validate(&self) -> SearchResult<()> {
        let dim = self.dimension();
        if dim == 0 {
            return Err(SearchError::InvalidConfig(
                "domain must have at least one axis".to_string(),
            ));
        }
        if self.domain.max.len() != dim {
            return Err(SearchError::DimensionMismatch {
                field: "domain.max",
                expected: dim,
                found: self.domain.max.len(),
            });
        }
        if !self.periodic.is_empty() && self.periodic.len() != dim {
            return Err(SearchError::DimensionMismatch {
                field: "periodic",
                expected: dim,
                found: self.periodic.len(),
            });
        }

        for axis in 0..dim {
            let (min, max) = (self.domain.min[axis], self.domain.max[axis]);
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(SearchError::InvalidBounds { axis, min, max });
            }
        }

        if !(self.bucket_side_length.is_finite() && self.bucket_side_length > 0.0) {
            return Err(SearchError::InvalidSideLength(self.bucket_side_length));
        }

        Ok(())
    }

    /// Domain for a `D`-dimensional index
    pub fn domain<const D: usize>(&self) -> SearchResult<Domain<D>> {
        self.validate()?;
        if self.dimension() != D {
            return Err(SearchError::DimensionMismatch {
                field: "domain.min",
                expected: D,
                found: self.dimension(),
            });
        }
        let mut min = [0.0; D];
        let mut max = [0.0; D];
        let mut periodic = [false; D];
        min.copy_from_slice(&self.domain.min);
        max.copy_from_slice(&self.domain.max);
        if !self.periodic.is_empty() {
            periodic.copy_from_slice(&self.periodic);
        }
        Domain::new(min, max, periodic)
    }

    /// Build an empty `D`-dimensional index from this configuration
    pub fn build<const D: usize>(&self) -> SearchResult<BucketSearch<D>> {
        let domain = self.domain::<D>()?;
        let search = BucketSearch::new(domain, self.bucket_side_length)?;
        tracing::info!(
            "Configured bucket search '{}': {} buckets",
            self.name,
            search.params().total_buckets()
        );
        Ok(search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_config() -> SearchConfig {
        SearchConfig {
            name: "test".to_string(),
            domain: DomainBounds {
                min: vec![0.0, 0.0, 0.0],
                max: vec![10.0, 10.0, 10.0],
            },
            periodic: vec![true, false, false],
            bucket_side_length: 2.0,
        }
    }

    #[test]
    fn test_build_from_config() {
        let search = cube_config().build::<3>().unwrap();
        assert_eq!(search.params().bucket_count(), [5, 5, 5]);
        assert_eq!(search.domain().periodic(), [true, false, false]);
    }

    #[test]
    fn test_parse_json_with_default_periodic() {
        let json = r#"{
            "name": "plane",
            "domain": { "min": [0.0, 0.0], "max": [1.0, 2.0] },
            "bucket_side_length": 0.5
        }"#;
        let config = SearchConfig::from_json(json).unwrap();
        assert!(config.periodic.is_empty());
        let domain = config.domain::<2>().unwrap();
        assert_eq!(domain.periodic(), [false, false]);
        assert_eq!(domain.max(), [1.0, 2.0]);
    }

    #[test]
    fn test_validation_domain_bounds() {
        let mut config = cube_config();
        config.domain.min[1] = 11.0;
        assert!(matches!(
            config.validate(),
            Err(SearchError::InvalidBounds { axis: 1, .. })
        ));

        config.domain.min[1] = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_side_length() {
        let mut config = cube_config();
        config.bucket_side_length = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SearchError::InvalidSideLength(_))
        ));
    }

    #[test]
    fn test_validation_periodic_length() {
        let mut config = cube_config();
        config.periodic = vec![true];
        assert!(matches!(
            config.validate(),
            Err(SearchError::DimensionMismatch { field: "periodic", .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch_on_build() {
        let err = cube_config().build::<2>().unwrap_err();
        assert!(matches!(
            err,
            SearchError::DimensionMismatch { expected: 2, found: 3, .. }
        ));
    }

    #[test]
    fn test_oversized_grid_is_an_error() {
        let json = r#"{
            "name": "huge",
            "domain": { "min": [0.0, 0.0, 0.0], "max": [1e7, 1e7, 1e7] },
            "bucket_side_length": 1e-3
        }"#;
        let config = SearchConfig::from_json(json).unwrap();
        let err = config.build::<3>().unwrap_err();
        assert!(matches!(err, SearchError::InvalidConfig(ref m) if m.contains("grid too large")));
    }

    #[test]
    fn test_invalid_json() {
        let err = SearchConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SearchError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = SearchConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SearchError::Io(_)));
    }
}
