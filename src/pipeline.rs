//! Render loop tick
//!
//! Owns one pose source, one stabilizer and one calibrator, and turns the
//! latest raw pose into a render frame each time `tick` is called.

use nalgebra::Vector3;
use tracing::info;

use crate::calibration::{Calibrator, ProjectionParams};
use crate::config::AppSettings;
use crate::error::{ensure_positive, ConfigError};
use crate::pose::Pose;
use crate::render::{RenderFrame, RenderSink, RenderState};
use crate::source::PoseSource;
use crate::stabilizer::PoseStabilizer;
use crate::state::Regime;

/// Per-regime frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub frames: u64,
    pub tracking: u64,
    pub holding: u64,
    pub recentering: u64,
    /// Lowest output confidence seen so far
    pub min_confidence: Option<f64>,
}

impl TickStats {
    fn record(&mut self, regime: Regime, confidence: f64) {
        self.frames += 1;
        match regime {
            Regime::Tracking => self.tracking += 1,
            Regime::Holding => self.holding += 1,
            Regime::Recentering => self.recentering += 1,
        }
        self.min_confidence = Some(self.min_confidence.map_or(confidence, |c| c.min(confidence)));
    }
}

pub struct Pipeline {
    source: Box<dyn PoseSource>,
    stabilizer: PoseStabilizer,
    calibrator: Calibrator,
    projection: ProjectionParams,
    box_size_m: f64,
    box_depth_m: f64,
    home_position_m: Vector3<f64>,
    fallback: Pose,
    running: bool,
    last_timestamp_ms: i64,
    stats: TickStats,
}

impl Pipeline {
    /// Build every component from validated settings
    pub fn new(source: Box<dyn PoseSource>, settings: &AppSettings) -> Result<Self, ConfigError> {
        settings.render.validate()?;
        let stabilizer = PoseStabilizer::new(settings.tracking.params()?)?;
        let calibrator = Calibrator::new(settings.display.geometry()?, settings.display.offset()?)?;
        let [hx, hy, hz] = settings.render.home_position_m;
        let home_position_m = Vector3::new(hx, hy, hz);

        Ok(Self {
            source,
            stabilizer,
            calibrator,
            projection: settings.render.projection()?,
            box_size_m: settings.render.box_size_m,
            box_depth_m: settings.render.box_depth_m,
            home_position_m,
            fallback: Pose::at(0, home_position_m),
            running: true,
            last_timestamp_ms: 0,
            stats: TickStats::default(),
        })
    }

    pub fn start(&mut self) {
        self.source.start();
    }

    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// Pause or resume frame production without touching the source
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Produce one frame, or `None` while paused
    pub fn tick(&mut self) -> Result<Option<RenderFrame>, ConfigError> {
        if !self.running {
            return Ok(None);
        }

        let raw = self.source.get_latest_pose();
        let pose = self.stabilizer.update(raw, self.fallback);
        let regime = self.stabilizer.regime().unwrap_or(Regime::Tracking);
        self.last_timestamp_ms = raw.timestamp_ms;

        let transform = self
            .calibrator
            .compute_render_transform(&pose, &self.projection)?;
        self.stats.record(regime, pose.confidence);

        Ok(Some(RenderFrame {
            raw,
            pose,
            regime,
            state: RenderState::new(&transform, self.box_size_m, self.box_depth_m),
        }))
    }

    /// Tick `ticks` times, handing every produced frame to `sink`
    pub fn run_into(&mut self, sink: &mut dyn RenderSink, ticks: usize) -> anyhow::Result<usize> {
        let mut submitted = 0;
        for _ in 0..ticks {
            if let Some(frame) = self.tick()? {
                sink.submit(&frame)?;
                submitted += 1;
            }
        }
        Ok(submitted)
    }

    /// Reset the fallback to the home position, stamped with the latest sample
    /// time, and recenter the source where it supports it
    pub fn recalibrate(&mut self) {
        self.fallback = Pose::at(self.last_timestamp_ms, self.home_position_m);
        self.source.recenter();
        info!(home = ?self.home_position_m, "fallback pose reset");
    }

    pub fn set_fov(&mut self, fov_deg: f64) -> Result<(), ConfigError> {
        self.projection = ProjectionParams::new(fov_deg, self.projection.near_m, self.projection.far_m)?;
        Ok(())
    }

    pub fn set_box_depth(&mut self, box_depth_m: f64) -> Result<(), ConfigError> {
        ensure_positive("box_depth_m", box_depth_m)?;
        self.box_depth_m = box_depth_m;
        Ok(())
    }

    pub fn calibrator_mut(&mut self) -> &mut Calibrator {
        &mut self.calibrator
    }

    pub fn fallback(&self) -> &Pose {
        &self.fallback
    }

    pub fn projection(&self) -> &ProjectionParams {
        &self.projection
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameRecorder;
    use crate::source::ScriptedSource;

    fn scripted(poses: Vec<Pose>) -> Box<dyn PoseSource> {
        Box::new(ScriptedSource::new(poses))
    }

    #[test]
    fn test_tick_produces_frame() {
        let poses = vec![Pose::at(0, Vector3::new(0.1, 0.0, 0.7))];
        let mut p = Pipeline::new(scripted(poses), &AppSettings::default()).unwrap();
        p.start();
        let frame = p.tick().unwrap().unwrap();

        assert_eq!(frame.regime, Regime::Tracking);
        assert_eq!(frame.state.box_size_m, 0.3);
        assert_eq!(frame.state.proj_matrix[14], -1.0);
        assert!((frame.state.view_matrix[3] + 0.1).abs() < 1e-6);
        assert_eq!(p.stats().frames, 1);
    }

    #[test]
    fn test_paused_pipeline_yields_nothing() {
        let mut p = Pipeline::new(scripted(Vec::new()), &AppSettings::default()).unwrap();
        p.set_running(false);
        assert!(p.tick().unwrap().is_none());
        assert_eq!(p.stats().frames, 0);
    }

    #[test]
    fn test_exhausted_source_recenters_home() {
        let poses: Vec<Pose> = (0..5)
            .map(|i| Pose::at(i * 100, Vector3::new(0.3, 0.0, 0.7)))
            .collect();
        let mut p = Pipeline::new(scripted(poses), &AppSettings::default()).unwrap();
        p.start();
        let mut sink = FrameRecorder::default();
        let n = p.run_into(&mut sink, 12).unwrap();
        assert_eq!(n, 12);

        // Loss starts at 500 ms; held through 800 ms, then 300 ms into the
        // 600 ms glide towards home by 1100 ms.
        assert_eq!(p.stats().tracking, 5);
        assert_eq!(p.stats().holding, 4);
        assert_eq!(p.stats().recentering, 3);

        let last = sink.frames.last().unwrap();
        assert_eq!(last.regime, Regime::Recentering);
        assert_eq!(last.pose.timestamp_ms, 1100);
        assert!((last.pose.confidence - 0.5).abs() < 1e-9);
        assert!((last.pose.position_m.x - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_long_exhaustion_settles_at_home() {
        let poses = vec![Pose::at(0, Vector3::new(0.3, 0.0, 0.7))];
        let mut p = Pipeline::new(scripted(poses), &AppSettings::default()).unwrap();
        p.start();
        let mut sink = FrameRecorder::default();
        p.run_into(&mut sink, 500).unwrap();

        let last = sink.frames.last().unwrap();
        assert_eq!(last.regime, Regime::Recentering);
        assert_eq!(last.pose.confidence, 0.0);
        assert_eq!(last.pose.position_m, Vector3::new(0.0, 0.0, 0.7));
    }

    #[test]
    fn test_recalibrate_uses_home_position() {
        let mut settings = AppSettings::default();
        settings.render.home_position_m = [0.0, 0.1, 0.8];
        let poses = vec![Pose::at(250, Vector3::zeros())];
        let mut p = Pipeline::new(scripted(poses), &settings).unwrap();
        p.start();
        p.tick().unwrap();
        p.recalibrate();
        assert_eq!(p.fallback().timestamp_ms, 250);
        assert_eq!(p.fallback().position_m, Vector3::new(0.0, 0.1, 0.8));
    }

    #[test]
    fn test_setters_validate() {
        let mut p = Pipeline::new(scripted(Vec::new()), &AppSettings::default()).unwrap();
        assert!(p.set_fov(0.0).is_err());
        assert!(p.set_fov(75.0).is_ok());
        assert_eq!(p.projection().fov_deg, 75.0);
        assert!(p.set_box_depth(-0.1).is_err());
        assert!(p.set_box_depth(0.8).is_ok());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut settings = AppSettings::default();
        settings.display.resolution_h = 0;
        assert!(Pipeline::new(scripted(Vec::new()), &settings).is_err());

        let mut settings = AppSettings::default();
        settings.render.far_m = settings.render.near_m;
        assert!(Pipeline::new(scripted(Vec::new()), &settings).is_err());
    }
}
