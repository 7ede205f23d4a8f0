//! anabox - head-coupled perspective for a fixed display
//!
//! Turns noisy head poses from a tracker into a stable viewer pose, then into
//! the view and projection matrices that make the screen look like a window
//! into a box. Tracking loss is handled by holding the last good pose and
//! then easing back to a home position.

pub mod calibration;
pub mod config;
pub mod error;
pub mod io;
pub mod params;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod sim;
pub mod source;
pub mod stabilizer;
pub mod state;

// Re-export main types
pub use calibration::{CalibrationOffset, Calibrator, DisplayGeometry, ProjectionParams};
pub use config::AppSettings;
pub use error::ConfigError;
pub use params::StabilizerParams;
pub use pipeline::{Pipeline, TickStats};
pub use pose::Pose;
pub use render::{RenderFrame, RenderSink, RenderState, RenderTransform};
pub use source::{LatestPose, PoseSource};
pub use stabilizer::PoseStabilizer;
pub use state::{Regime, StabilizerState};
