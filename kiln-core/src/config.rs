//! Graph Configuration
//!
//! Runtime knobs for the graph, loaded from JSON. Every field has a default,
//! so an empty object (or no file at all) is a valid configuration.
//!
//! ```json
//! {
//!     "detailed_log": true,
//!     "icosphere": { "degree": 3, "radius": 2.0 },
//!     "command_queue_capacity": 128
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest icosphere degree whose vertex count still fits 16-bit indices
/// (`10 * 4^(d-1) + 2` vertices).
pub const ICOSPHERE_DEGREE_LIMIT: u32 = 7;

/// Errors raised while loading a [`GraphConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("icosphere degree {degree} exceeds the maximum of {max}")]
    DegreeOutOfRange { degree: u32, max: u32 },
}

/// Top-level configuration shared by every node created from one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Log every generation step, not just failures.
    pub detailed_log: bool,

    /// Defaults for newly created icosphere generators.
    pub icosphere: IcosphereConfig,

    /// Queue length above which posting a command logs a warning.
    pub command_queue_capacity: usize,
}

/// Icosphere generator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcosphereConfig {
    pub degree: u32,
    pub radius: f32,
    pub max_degree: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            detailed_log: false,
            icosphere: IcosphereConfig::default(),
            command_queue_capacity: 64,
        }
    }
}

impl Default for IcosphereConfig {
    fn default() -> Self {
        Self {
            degree: 1,
            radius: 1.0,
            max_degree: ICOSPHERE_DEGREE_LIMIT,
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ico = &self.icosphere;
        if ico.max_degree > ICOSPHERE_DEGREE_LIMIT {
            return Err(ConfigError::DegreeOutOfRange {
                degree: ico.max_degree,
                max: ICOSPHERE_DEGREE_LIMIT,
            });
        }
        if ico.degree > ico.max_degree {
            return Err(ConfigError::DegreeOutOfRange {
                degree: ico.degree,
                max: ico.max_degree,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = GraphConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
        assert_eq!(config.icosphere.max_degree, ICOSPHERE_DEGREE_LIMIT);
    }

    #[test]
    fn partial_override() {
        let config = GraphConfig::from_json_str(
            r#"{ "detailed_log": true, "icosphere": { "degree": 3 } }"#,
        )
        .unwrap();
        assert!(config.detailed_log);
        assert_eq!(config.icosphere.degree, 3);
        assert_eq!(config.icosphere.radius, 1.0);
        assert_eq!(config.command_queue_capacity, 64);
    }

    #[test]
    fn rejects_degree_above_limit() {
        let err = GraphConfig::from_json_str(r#"{ "icosphere": { "max_degree": 9 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DegreeOutOfRange { degree: 9, max: 7 }
        ));

        let err = GraphConfig::from_json_str(r#"{ "icosphere": { "degree": 5, "max_degree": 4 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DegreeOutOfRange { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = GraphConfig::from_json_str("{ detailed_log: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = GraphConfig::load("/definitely/not/here/kiln.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
