//! Configuration errors
//!
//! Tracking loss is never an error; it shows up as confidence decay on the
//! stabilized pose. Only invalid configuration is reported here.

use thiserror::Error;

/// Rejected configuration value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("display resolution {width}x{height} gives a degenerate aspect ratio")]
    DegenerateAspect { width: u32, height: u32 },
    #[error("clip planes must satisfy 0 < near < far and give a finite projection, got near={near} far={far}")]
    ClipPlanes { near: f64, far: f64 },
}

impl ConfigError {
    pub(crate) fn out_of_range(name: &'static str, expected: &'static str, value: f64) -> Self {
        Self::OutOfRange {
            name,
            expected,
            value,
        }
    }
}

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(name, "finite and > 0", value))
    }
}

/// Fails unless `value` is finite.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(name, "finite", value))
    }
}
