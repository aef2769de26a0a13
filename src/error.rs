//! Error types
//!
//! Nothing in the scheduler is fatal. These errors are caught, logged and the
//! affected chunk or region is left with its previous content.

use std::fmt;

/// Why a single chunk or region failed to regenerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenError {
    /// The oracle could not be reached or refused the request
    Oracle(String),
    /// The oracle answered but the reply was not a tile grid
    Parse(String),
    /// The oracle's grid did not match the region's size
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// Any other failure raised by a regeneration callback
    Callback(String),
}

impl fmt::Display for RegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegenError::Oracle(e) => write!(f, "Oracle error: {}", e),
            RegenError::Parse(e) => write!(f, "Parse error: {}", e),
            RegenError::DimensionMismatch { expected, actual } => write!(
                f,
                "Dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            RegenError::Callback(e) => write!(f, "Regeneration failed: {}", e),
        }
    }
}

impl std::error::Error for RegenError {}

/// Errors loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config read error: {}", e),
            ConfigError::Parse(e) => write!(f, "Config parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}
