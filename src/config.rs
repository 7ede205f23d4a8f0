use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationOffset, DisplayGeometry, ProjectionParams};
use crate::error::{ensure_positive, ConfigError};
use crate::params::StabilizerParams;

/// Application settings, built once at startup and handed to each component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub tracking: TrackingSettings,
    pub render: RenderSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub ema_alpha: f64,
    pub velocity_limit_m_s: f64,
    pub min_confidence: f64,
    pub loss_timeout_ms: i64,
    pub recenter_seconds: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        let p = StabilizerParams::default();
        Self {
            ema_alpha: p.ema_alpha,
            velocity_limit_m_s: p.velocity_limit_m_s,
            min_confidence: p.min_confidence,
            loss_timeout_ms: p.loss_timeout_ms,
            recenter_seconds: p.recenter_seconds,
        }
    }
}

impl TrackingSettings {
    pub fn params(&self) -> Result<StabilizerParams, ConfigError> {
        StabilizerParams::new(
            self.ema_alpha,
            self.velocity_limit_m_s,
            self.min_confidence,
            self.loss_timeout_ms,
            self.recenter_seconds,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Tick rate of the render loop [Hz]
    pub target_fps: u32,
    /// Depth of the rendered box [m]
    pub box_depth_m: f64,
    /// Edge length of the box opening [m]
    pub box_size_m: f64,
    pub fov_deg: f64,
    pub near_m: f64,
    pub far_m: f64,
    /// Head position the stabilizer recenters to [m]
    pub home_position_m: [f64; 3],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            target_fps: 60,
            box_depth_m: 0.5,
            box_size_m: 0.3,
            fov_deg: 60.0,
            near_m: 0.05,
            far_m: 10.0,
            home_position_m: [0.0, 0.0, 0.7],
        }
    }
}

impl RenderSettings {
    pub fn projection(&self) -> Result<ProjectionParams, ConfigError> {
        ProjectionParams::new(self.fov_deg, self.near_m, self.far_m)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::out_of_range("target_fps", "> 0", 0.0));
        }
        ensure_positive("box_depth_m", self.box_depth_m)?;
        ensure_positive("box_size_m", self.box_size_m)?;
        self.projection()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width_m: f64,
    pub height_m: f64,
    pub resolution_w: u32,
    pub resolution_h: u32,
    /// `[tx, ty, tz]` in meters then `[yaw, pitch, roll]` in degrees
    pub camera_offset: [f64; 6],
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width_m: 0.6,
            height_m: 0.34,
            resolution_w: 1920,
            resolution_h: 1080,
            camera_offset: [0.0; 6],
        }
    }
}

impl DisplaySettings {
    pub fn geometry(&self) -> Result<DisplayGeometry, ConfigError> {
        DisplayGeometry::new(
            self.width_m,
            self.height_m,
            self.resolution_w,
            self.resolution_h,
        )
    }

    pub fn offset(&self) -> Result<CalibrationOffset, ConfigError> {
        CalibrationOffset::from_array(self.camera_offset)
    }
}

impl AppSettings {
    /// Load and validate settings from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        let settings: AppSettings = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML settings: {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking.params()?;
        self.render.validate()?;
        self.display.geometry()?;
        self.display.offset()?;
        Ok(())
    }
}
