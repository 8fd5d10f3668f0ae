//! Driver configuration.
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```json
//! { "buffer_size": 65536, "default_level": 6 }
//! ```

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::DEFAULT_BUFFER_SIZE;
use crate::codec::{DEFAULT_LEVEL, MAX_WORK_FACTOR};
use crate::file::TIMEOUT_DEFAULT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("buffer_size must be at least 1")]
    ZeroBuffer,
    #[error("default_level must be 1-9, got {0}")]
    Level(u32),
    #[error("work_factor must be 0-{MAX_WORK_FACTOR}, got {0}")]
    WorkFactor(u32),
    #[error("default_timeout must be -1 or greater, got {0}")]
    Timeout(i64),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Staging buffer capacity per handle.
    pub buffer_size:      usize,
    /// Level used when the name tag carries no digit.
    pub default_level:    u32,
    /// Initial timeout budget of new handles (ms; -1 = underlying default).
    pub default_timeout:  i64,
    /// Low-memory decoder variant.
    pub small_decompress: bool,
    /// Encoder work factor; 0 lets the library pick.
    pub work_factor:      u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            buffer_size:      DEFAULT_BUFFER_SIZE,
            default_level:    DEFAULT_LEVEL,
            default_timeout:  TIMEOUT_DEFAULT,
            small_decompress: false,
            work_factor:      0,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        if !(1..=9).contains(&self.default_level) {
            return Err(ConfigError::Level(self.default_level));
        }
        if self.work_factor > MAX_WORK_FACTOR {
            return Err(ConfigError::WorkFactor(self.work_factor));
        }
        if self.default_timeout < -1 {
            return Err(ConfigError::Timeout(self.default_timeout));
        }
        Ok(())
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = DriverConfig::from_json(br#"{ "default_level": 4 }"#).unwrap();
        assert_eq!(cfg.default_level, 4);
        assert_eq!(cfg.buffer_size, 8192);
        assert_eq!(cfg.default_timeout, -1);
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            DriverConfig::from_json(br#"{ "default_level": 0 }"#),
            Err(ConfigError::Level(0))
        ));
        assert!(matches!(
            DriverConfig::from_json(br#"{ "buffer_size": 0 }"#),
            Err(ConfigError::ZeroBuffer)
        ));
        assert!(matches!(
            DriverConfig::from_json(br#"{ "work_factor": 900 }"#),
            Err(ConfigError::WorkFactor(900))
        ));
        assert!(matches!(
            DriverConfig::from_json(br#"{ "default_timeout": -5 }"#),
            Err(ConfigError::Timeout(-5))
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(DriverConfig::from_json(b"{"), Err(ConfigError::Parse(_))));
    }
}
