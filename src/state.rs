//! Stabilizer state representation
//!
//! The stabilizer keeps three pieces of memory between calls:
//! - last_stable_pose: last pose accepted while tracking
//! - last_output_pose: last pose emitted, the smoothing anchor
//! - loss_started_ms: onset of the current loss episode, if any

use crate::pose::Pose;

/// Which branch of the state machine produced an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Sample accepted, filtered output
    Tracking,
    /// Sample rejected, last stable pose held
    Holding,
    /// Hold expired, gliding to the fallback pose
    Recentering,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Holding => "holding",
            Self::Recentering => "recentering",
        }
    }
}

/// State of the pose stabilizer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilizerState {
    /// Last pose accepted while tracking
    pub last_stable_pose: Option<Pose>,
    /// Last pose emitted
    pub last_output_pose: Option<Pose>,
    /// Start of the current loss episode [ms]
    pub loss_started_ms: Option<i64>,
}

impl StabilizerState {
    /// Create an empty state: nothing tracked yet, no loss in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a loss episode is open
    pub fn in_loss(&self) -> bool {
        self.loss_started_ms.is_some()
    }
}
