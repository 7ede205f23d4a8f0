//! Pose stabilizer
//!
//! Smooths, rate-limits, holds through short dropouts and recenters after
//! long ones. The regime is chosen fresh on every call from the incoming
//! sample and the time elapsed since the loss episode began.

use nalgebra::Vector3;
use tracing::debug;

use crate::error::ConfigError;
use crate::params::StabilizerParams;
use crate::pose::{clamp_confidence, Pose};
use crate::state::{Regime, StabilizerState};

/// Minimum time step used by the rate limiter [s]
const MIN_DT_S: f64 = 1e-3;

/// Pose stabilizer
///
/// Single-owner: `update` takes `&mut self` and there is no interior locking.
#[derive(Debug, Clone)]
pub struct PoseStabilizer {
    /// Stabilizer parameters
    params: StabilizerParams,
    /// Mutable filter memory
    state: StabilizerState,
    /// Regime selected by the most recent call
    regime: Option<Regime>,
}

impl PoseStabilizer {
    /// Create a new stabilizer, rejecting out-of-range parameters
    pub fn new(params: StabilizerParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            params,
            state: StabilizerState::new(),
            regime: None,
        })
    }

    /// Feed one raw sample and get the stabilized pose.
    ///
    /// Never fails. Degraded tracking is reported through the confidence of
    /// the returned pose, which decays to zero while recentering.
    pub fn update(&mut self, raw: Pose, fallback: Pose) -> Pose {
        let confidence = clamp_confidence(raw.confidence);
        if raw.valid && raw.is_finite() && confidence >= self.params.min_confidence {
            if let Some(started) = self.state.loss_started_ms.take() {
                debug!(
                    lost_for_ms = raw.timestamp_ms - started,
                    "tracking reacquired"
                );
            }
            let filtered = self.filter(Pose { confidence, ..raw });
            self.state.last_stable_pose = Some(filtered);
            self.state.last_output_pose = Some(filtered);
            self.regime = Some(Regime::Tracking);
            return filtered;
        }

        let now_ms = raw.timestamp_ms;
        let started = *self.state.loss_started_ms.get_or_insert_with(|| {
            debug!(at_ms = now_ms, confidence, valid = raw.valid, "tracking lost");
            now_ms
        });
        let elapsed_ms = now_ms - started;
        let stable = self.state.last_stable_pose.unwrap_or(fallback);

        let (out, regime) = if elapsed_ms <= self.params.loss_timeout_ms {
            let held = Pose::new(
                now_ms,
                stable.position_m,
                stable.yaw_pitch_roll_deg,
                stable.confidence,
                true,
            );
            (held, Regime::Holding)
        } else {
            if self.regime != Some(Regime::Recentering) {
                debug!(elapsed_ms, "hold expired, recentering");
            }
            (
                self.recenter(now_ms, elapsed_ms, &stable, &fallback),
                Regime::Recentering,
            )
        };

        self.state.last_output_pose = Some(out);
        self.regime = Some(regime);
        out
    }

    /// Rate limit then exponentially smooth against the previous output
    fn filter(&self, pose: Pose) -> Pose {
        let prev = match self.state.last_output_pose {
            Some(prev) => prev,
            None => return Pose { valid: true, ..pose },
        };

        let dt_s = ((pose.timestamp_ms - prev.timestamp_ms) as f64 / 1000.0).max(MIN_DT_S);
        let target = clamp_step(
            &prev.position_m,
            &pose.position_m,
            self.params.velocity_limit_m_s * dt_s,
        );

        let a = self.params.ema_alpha;
        let position = prev.position_m * (1.0 - a) + target * a;
        let rotation = prev.yaw_pitch_roll_deg * (1.0 - a) + pose.yaw_pitch_roll_deg * a;

        Pose::new(pose.timestamp_ms, position, rotation, pose.confidence, true)
    }

    /// Glide from the stable pose to the fallback as loss time grows
    fn recenter(&self, now_ms: i64, elapsed_ms: i64, stable: &Pose, fallback: &Pose) -> Pose {
        let duration_ms = self.params.recenter_ms();
        let t = if duration_ms <= 0 {
            1.0
        } else {
            ((elapsed_ms - self.params.loss_timeout_ms) as f64 / duration_ms as f64).clamp(0.0, 1.0)
        };

        let (position, rotation) = stable.lerp(fallback, t);
        Pose::new(now_ms, position, rotation, 1.0 - t, true)
    }

    /// Get the parameters
    pub fn params(&self) -> &StabilizerParams {
        &self.params
    }

    /// Get the current state
    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    /// Regime chosen by the last `update`, `None` before the first call
    pub fn regime(&self) -> Option<Regime> {
        self.regime
    }
}

/// Move from `from` towards `to`, at most `max_step` meters
fn clamp_step(from: &Vector3<f64>, to: &Vector3<f64>, max_step: f64) -> Vector3<f64> {
    let delta = to - from;
    let dist = delta.norm();
    if dist > max_step {
        from + delta * (max_step / dist)
    } else {
        *to
    }
}
