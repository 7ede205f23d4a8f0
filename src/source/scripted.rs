//! Replay of a pre-recorded or generated pose sequence

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::info;

use crate::pose::Pose;
use crate::source::PoseSource;

/// Frame interval used when the script is too short to infer one [ms]
const DEFAULT_FRAME_INTERVAL_MS: i64 = 33;

/// Hands out one sample per read while started.
///
/// Once the sequence is exhausted every read reports an invalid pose whose
/// timestamp keeps advancing by the script's median frame interval, as a
/// tracker that lost its subject would.
#[derive(Debug)]
pub struct ScriptedSource {
    poses: Vec<Pose>,
    frame_interval_ms: i64,
    cursor: AtomicUsize,
    running: AtomicBool,
}

impl ScriptedSource {
    pub fn new(poses: Vec<Pose>) -> Self {
        let frame_interval_ms = median_interval_ms(&poses).unwrap_or(DEFAULT_FRAME_INTERVAL_MS);
        Self {
            poses,
            frame_interval_ms,
            cursor: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Samples not yet handed out
    pub fn remaining(&self) -> usize {
        self.poses
            .len()
            .saturating_sub(self.cursor.load(Ordering::Acquire))
    }

    /// Spacing of the synthetic loss samples after exhaustion [ms]
    pub fn frame_interval_ms(&self) -> i64 {
        self.frame_interval_ms
    }

    fn sample(&self, idx: usize) -> Pose {
        if let Some(pose) = self.poses.get(idx) {
            return *pose;
        }
        let last_ts = self.poses.last().map_or(0, |p| p.timestamp_ms);
        let overrun = (idx + 1 - self.poses.len()) as i64;
        Pose::lost(last_ts.saturating_add(self.frame_interval_ms.saturating_mul(overrun)))
    }
}

fn median_interval_ms(poses: &[Pose]) -> Option<i64> {
    let mut steps: Vec<i64> = poses
        .windows(2)
        .map(|w| w[1].timestamp_ms - w[0].timestamp_ms)
        .collect();
    if steps.is_empty() {
        return None;
    }
    steps.sort_unstable();
    let median = steps[steps.len() / 2];
    (median > 0).then_some(median)
}

impl PoseSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn start(&mut self) {
        self.running.store(true, Ordering::Release);
        info!(source = self.name(), samples = self.poses.len(), "pose source started");
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        info!(source = self.name(), "pose source stopped");
    }

    fn get_latest_pose(&self) -> Pose {
        if !self.running.load(Ordering::Acquire) {
            // Repeat the last sample handed out without advancing.
            return match self.cursor.load(Ordering::Acquire).checked_sub(1) {
                Some(idx) => self.sample(idx),
                None => Pose::lost(0),
            };
        }
        let idx = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.sample(idx)
    }
}
