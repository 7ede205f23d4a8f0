//! Simulation harness
//!
//! Generates synthetic head paths, corrupts them the way a real tracker
//! would (jitter, dropouts, low-confidence frames) and runs the stabilizer
//! over the result.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{ensure_positive, ConfigError};
use crate::params::StabilizerParams;
use crate::pose::Pose;
use crate::stabilizer::PoseStabilizer;
use crate::state::Regime;

/// Shape of the simulated head path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathShape {
    /// Ellipse in x/y with a slow z breathing
    Orbit,
    /// 2:3 Lissajous figure
    Lissajous,
}

impl PathShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orbit => "orbit",
            Self::Lissajous => "lissajous",
        }
    }
}

/// Path generator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    pub duration_s: f64,
    pub fps: u32,
    pub x_amp_m: f64,
    pub y_amp_m: f64,
    pub z_base_m: f64,
    pub z_amp_m: f64,
    pub clamp_xy_m: f64,
    pub clamp_z_min_m: f64,
    pub clamp_z_max_m: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            duration_s: 6.0,
            fps: 30,
            x_amp_m: 0.2,
            y_amp_m: 0.12,
            z_base_m: 0.7,
            z_amp_m: 0.08,
            clamp_xy_m: 0.35,
            clamp_z_min_m: 0.4,
            clamp_z_max_m: 1.2,
        }
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("duration_s", self.duration_s)?;
        if self.fps == 0 {
            return Err(ConfigError::out_of_range("fps", "> 0", 0.0));
        }
        Ok(())
    }

    pub fn frames(&self) -> usize {
        (self.duration_s * self.fps as f64).round() as usize
    }

    fn pose(&self, i: usize, x: f64, y: f64, z: f64) -> Pose {
        let xy = self.clamp_xy_m;
        let position = Vector3::new(
            x.clamp(-xy, xy),
            y.clamp(-xy, xy),
            z.clamp(self.clamp_z_min_m, self.clamp_z_max_m),
        );
        let timestamp_ms = (i as f64 * 1000.0 / self.fps as f64) as i64;
        Pose::at(timestamp_ms, position)
    }
}

/// Generate a clean head path sampled at `config.fps`
pub fn generate_path(shape: PathShape, config: &PathConfig) -> Result<Vec<Pose>, ConfigError> {
    config.validate()?;
    let frames = config.frames();
    let denom = frames.saturating_sub(1).max(1) as f64;

    let path = (0..frames)
        .map(|i| {
            let phase = i as f64 / denom * TAU;
            let (x, y, z) = match shape {
                PathShape::Orbit => (
                    config.x_amp_m * phase.cos(),
                    config.y_amp_m * phase.sin(),
                    config.z_base_m + config.z_amp_m * (phase * 0.5).sin(),
                ),
                PathShape::Lissajous => (
                    config.x_amp_m * (2.0 * phase).sin(),
                    config.y_amp_m * (3.0 * phase + PI / 4.0).sin(),
                    config.z_base_m + config.z_amp_m * phase.cos(),
                ),
            };
            config.pose(i, x, y, z)
        })
        .collect();
    Ok(path)
}

/// Tracker fault model
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Std-dev of Gaussian position jitter [m]
    pub jitter_std_m: f64,
    /// Start of a hard dropout window [s]
    pub dropout_start_s: f64,
    /// Length of the dropout window [s]; zero disables it
    pub dropout_duration_s: f64,
    /// Probability that a frame arrives with low confidence
    pub low_confidence_prob: f64,
    /// Confidence assigned to those frames
    pub low_confidence: f64,
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            jitter_std_m: 0.004,
            dropout_start_s: 2.0,
            dropout_duration_s: 1.2,
            low_confidence_prob: 0.05,
            low_confidence: 0.2,
            seed: 42,
        }
    }
}

impl FaultConfig {
    /// No jitter, no dropouts
    pub fn clean() -> Self {
        Self {
            jitter_std_m: 0.0,
            dropout_duration_s: 0.0,
            low_confidence_prob: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.jitter_std_m >= 0.0 && self.jitter_std_m.is_finite()) {
            return Err(ConfigError::out_of_range(
                "jitter_std_m",
                "finite and >= 0",
                self.jitter_std_m,
            ));
        }
        if !(self.dropout_duration_s >= 0.0) {
            return Err(ConfigError::out_of_range(
                "dropout_duration_s",
                ">= 0",
                self.dropout_duration_s,
            ));
        }
        if !(0.0..=1.0).contains(&self.low_confidence_prob) {
            return Err(ConfigError::out_of_range(
                "low_confidence_prob",
                "in [0, 1]",
                self.low_confidence_prob,
            ));
        }
        Ok(())
    }

    fn in_dropout(&self, timestamp_ms: i64) -> bool {
        let t = timestamp_ms as f64 / 1000.0;
        self.dropout_duration_s > 0.0
            && t >= self.dropout_start_s
            && t < self.dropout_start_s + self.dropout_duration_s
    }
}

/// Corrupt a clean path according to `faults`. Deterministic for a given seed.
pub fn inject_faults(path: &[Pose], faults: &FaultConfig) -> Result<Vec<Pose>, ConfigError> {
    faults.validate()?;
    let mut rng = rand::rngs::StdRng::seed_from_u64(faults.seed);
    let jitter = Normal::new(0.0, faults.jitter_std_m)
        .map_err(|_| ConfigError::out_of_range("jitter_std_m", "finite and >= 0", faults.jitter_std_m))?;

    let corrupted = path
        .iter()
        .map(|truth| {
            if faults.in_dropout(truth.timestamp_ms) {
                return Pose::lost(truth.timestamp_ms);
            }
            let noise = Vector3::new(
                jitter.sample(&mut rng),
                jitter.sample(&mut rng),
                jitter.sample(&mut rng),
            );
            let confidence = if rng.gen::<f64>() < faults.low_confidence_prob {
                faults.low_confidence
            } else {
                truth.confidence
            };
            Pose::new(
                truth.timestamp_ms,
                truth.position_m + noise,
                truth.yaw_pitch_roll_deg,
                confidence,
                true,
            )
        })
        .collect();
    Ok(corrupted)
}

/// Simulation results for one time step
#[derive(Debug, Clone, PartialEq)]
pub struct SimStep {
    pub timestamp_ms: i64,
    pub truth: Vector3<f64>,
    pub raw: Pose,
    pub stabilized: Pose,
    pub regime: Regime,
    /// |stabilized - truth|
    pub err_stabilized: f64,
    /// |raw - truth|, `None` for frames the tracker dropped
    pub err_raw: Option<f64>,
}

/// Run the stabilizer over `raw`, comparing against the clean `truth` path.
///
/// Both slices must be the same length and sampled at the same times.
pub fn run_simulation(
    truth: &[Pose],
    raw: &[Pose],
    params: StabilizerParams,
    fallback: Pose,
) -> Result<Vec<SimStep>, ConfigError> {
    let mut stabilizer = PoseStabilizer::new(params)?;

    let steps: Vec<SimStep> = truth
        .iter()
        .zip(raw.iter())
        .map(|(t, r)| {
            let stabilized = stabilizer.update(*r, fallback);
            let regime = stabilizer.regime().unwrap_or(Regime::Tracking);
            SimStep {
                timestamp_ms: r.timestamp_ms,
                truth: t.position_m,
                raw: *r,
                stabilized,
                regime,
                err_stabilized: (stabilized.position_m - t.position_m).norm(),
                err_raw: r.valid.then(|| (r.position_m - t.position_m).norm()),
            }
        })
        .collect();
    Ok(steps)
}

/// Position error of each valid pose against the truth sample at the same
/// index. Invalid poses are skipped.
pub fn position_errors(truth: &[Pose], poses: &[Pose]) -> Vec<f64> {
    truth
        .iter()
        .zip(poses.iter())
        .filter(|(_, p)| p.valid)
        .map(|(t, p)| (p.position_m - t.position_m).norm())
        .collect()
}

/// Calculate RMS error; zero for an empty slice
pub fn rms_error(errors: &[f64]) -> f64 {
    if errors.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = errors.iter().map(|&e| e * e).sum();
    (sum_sq / errors.len() as f64).sqrt()
}

/// Mean frame-to-frame displacement, a rough jitter measure
pub fn mean_step(positions: &[Vector3<f64>]) -> f64 {
    if positions.len() < 2 {
        return 0.0;
    }
    let total: f64 = positions.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    total / (positions.len() - 1) as f64
}
