//! Stabilizer parameters
//!
//! Parameters for the pose stabilization state machine

use crate::error::{ensure_finite, ConfigError};

/// Parameters for the pose stabilizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerParams {
    /// EMA smoothing factor (0 < alpha <= 1, 1 disables smoothing)
    pub ema_alpha: f64,
    /// Maximum head speed [m/s]; infinity disables rate limiting
    pub velocity_limit_m_s: f64,
    /// Samples below this confidence count as lost
    pub min_confidence: f64,
    /// How long the last stable pose is held after loss [ms]
    pub loss_timeout_ms: i64,
    /// Duration of the glide towards the fallback pose [s]
    pub recenter_seconds: f64,
}

impl StabilizerParams {
    /// Create validated stabilizer parameters
    pub fn new(
        ema_alpha: f64,
        velocity_limit_m_s: f64,
        min_confidence: f64,
        loss_timeout_ms: i64,
        recenter_seconds: f64,
    ) -> Result<Self, ConfigError> {
        let params = Self {
            ema_alpha,
            velocity_limit_m_s,
            min_confidence,
            loss_timeout_ms,
            recenter_seconds,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters tuned for a 60 Hz display fed by a 30-60 Hz tracker
    pub fn default_params() -> Self {
        Self {
            ema_alpha: 0.35,
            velocity_limit_m_s: 1.5,
            min_confidence: 0.4,
            loss_timeout_ms: 300,
            recenter_seconds: 0.6,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::out_of_range(
                "ema_alpha",
                "in (0, 1]",
                self.ema_alpha,
            ));
        }
        // NaN fails the comparison; +inf is accepted.
        if !(self.velocity_limit_m_s > 0.0) {
            return Err(ConfigError::out_of_range(
                "velocity_limit_m_s",
                "> 0",
                self.velocity_limit_m_s,
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::out_of_range(
                "min_confidence",
                "in [0, 1]",
                self.min_confidence,
            ));
        }
        if self.loss_timeout_ms < 0 {
            return Err(ConfigError::out_of_range(
                "loss_timeout_ms",
                ">= 0",
                self.loss_timeout_ms as f64,
            ));
        }
        ensure_finite("recenter_seconds", self.recenter_seconds)?;
        if self.recenter_seconds < 0.0 {
            return Err(ConfigError::out_of_range(
                "recenter_seconds",
                ">= 0",
                self.recenter_seconds,
            ));
        }
        Ok(())
    }

    /// Recenter glide length in whole milliseconds.
    ///
    /// Truncates, so a glide shorter than 1 ms becomes 0 and the stabilizer
    /// jumps straight to the fallback instead of interpolating over the
    /// fractional duration.
    pub fn recenter_ms(&self) -> i64 {
        (self.recenter_seconds * 1000.0) as i64
    }
}

impl Default for StabilizerParams {
    fn default() -> Self {
        Self::default_params()
    }
}
