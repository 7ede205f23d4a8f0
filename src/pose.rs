//! Head pose sample
//!
//! A pose carries:
//! - position in meters (right-handed)
//! - yaw/pitch/roll in degrees
//! - a confidence score in [0, 1] and a validity flag

use nalgebra::Vector3;

/// One head pose sample, as produced by a pose source or the stabilizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Sample time in milliseconds, non-decreasing per source
    pub timestamp_ms: i64,
    /// Position [m]
    pub position_m: Vector3<f64>,
    /// Yaw, pitch, roll [deg]
    pub yaw_pitch_roll_deg: Vector3<f64>,
    /// Tracking confidence in [0, 1]
    pub confidence: f64,
    /// Whether the source considers this sample usable
    pub valid: bool,
}

impl Pose {
    /// Create a new pose. Confidence is clamped into [0, 1].
    pub fn new(
        timestamp_ms: i64,
        position_m: Vector3<f64>,
        yaw_pitch_roll_deg: Vector3<f64>,
        confidence: f64,
        valid: bool,
    ) -> Self {
        Self {
            timestamp_ms,
            position_m,
            yaw_pitch_roll_deg,
            confidence: clamp_confidence(confidence),
            valid,
        }
    }

    /// Fully confident, valid pose at `position_m` with zero rotation
    pub fn at(timestamp_ms: i64, position_m: Vector3<f64>) -> Self {
        Self::new(timestamp_ms, position_m, Vector3::zeros(), 1.0, true)
    }

    /// Invalid sample reported while the source has nothing to offer
    pub fn lost(timestamp_ms: i64) -> Self {
        Self::new(timestamp_ms, Vector3::zeros(), Vector3::zeros(), 0.0, false)
    }

    /// Same pose with a different timestamp
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Position and orientation are all finite numbers
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite())
            && self.yaw_pitch_roll_deg.iter().all(|v| v.is_finite())
    }

    /// Linear blend between `self` (t = 0) and `other` (t = 1).
    ///
    /// Angles are blended on raw degrees without wrap handling, so
    /// -179 and 179 meet near 0 rather than near 180.
    pub fn lerp(&self, other: &Pose, t: f64) -> (Vector3<f64>, Vector3<f64>) {
        let position = self.position_m * (1.0 - t) + other.position_m * t;
        let rotation = self.yaw_pitch_roll_deg * (1.0 - t) + other.yaw_pitch_roll_deg * t;
        (position, rotation)
    }
}

/// Clamp into [0, 1]; NaN maps to 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
