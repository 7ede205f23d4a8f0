//! Pose sources
//!
//! A source produces raw head poses. Hardware-backed sources poll on their
//! own thread and publish into a [`LatestPose`] cell; the render tick reads
//! that cell without waiting on the poller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pose::Pose;

pub mod keyboard;
pub mod polled;
pub mod scripted;

pub use keyboard::{DirectionKey, KeyboardConfig, KeyboardController, KeyboardSource};
pub use polled::PolledSource;
pub use scripted::ScriptedSource;

/// Anything that can hand out the most recent head pose
pub trait PoseSource: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;
    fn start(&mut self);
    fn stop(&mut self);
    /// Latest sample. Must not block; may be stale or invalid.
    fn get_latest_pose(&self) -> Pose;
    /// Move a simulated head back to the display center. Trackers that
    /// observe a real head ignore this.
    fn recenter(&mut self) {}
}

/// Single-slot, last-write-wins pose cell shared between a producer thread
/// and the render tick.
#[derive(Debug, Clone, Default)]
pub struct LatestPose {
    slot: Arc<Mutex<Option<Pose>>>,
    sequence: Arc<AtomicU64>,
}

impl LatestPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with `pose`
    pub fn publish(&self, pose: Pose) {
        *self.lock() = Some(pose);
        self.sequence.fetch_add(1, Ordering::Release);
    }

    /// Most recent pose, `None` before the first publish
    pub fn load(&self) -> Option<Pose> {
        *self.lock()
    }

    /// Number of publishes so far; changes whenever a new pose lands
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pose>> {
        // A panicking writer cannot leave a half-written Copy value behind.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
