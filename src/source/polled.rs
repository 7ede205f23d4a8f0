//! Threaded polling source
//!
//! Wraps a blocking poll function (the hardware adapter) and runs it on its
//! own thread, publishing every pose it returns into a [`LatestPose`] cell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::pose::Pose;
use crate::source::{LatestPose, PoseSource};

/// Runs `poll` on a background thread every `interval`.
///
/// `poll` returns `None` when no new sample is ready; the cell then keeps its
/// previous (stale) value.
pub struct PolledSource<F>
where
    F: FnMut() -> Option<Pose> + Send + 'static,
{
    poll: Option<F>,
    interval: Duration,
    latest: LatestPose,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<F>>,
}

impl<F> PolledSource<F>
where
    F: FnMut() -> Option<Pose> + Send + 'static,
{
    pub fn new(poll: F, interval: Duration) -> Self {
        Self {
            poll: Some(poll),
            interval,
            latest: LatestPose::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// The cell the poller publishes into
    pub fn latest(&self) -> &LatestPose {
        &self.latest
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl<F> PoseSource for PolledSource<F>
where
    F: FnMut() -> Option<Pose> + Send + 'static,
{
    fn name(&self) -> &'static str {
        "polled"
    }

    fn start(&mut self) {
        let Some(mut poll) = self.poll.take() else {
            return;
        };
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let latest = self.latest.clone();
        let interval = self.interval;
        self.handle = Some(thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                if let Some(pose) = poll() {
                    latest.publish(pose);
                }
                thread::sleep(interval);
            }
            poll
        }));
        info!(source = self.name(), ?interval, "pose source started");
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            // Keep the poll function so the source can be restarted.
            Ok(poll) => self.poll = Some(poll),
            Err(_) => warn!(source = self.name(), "poll thread panicked"),
        }
        info!(source = self.name(), "pose source stopped");
    }

    fn get_latest_pose(&self) -> Pose {
        self.latest.load().unwrap_or_else(|| Pose::lost(0))
    }
}

impl<F> Drop for PolledSource<F>
where
    F: FnMut() -> Option<Pose> + Send + 'static,
{
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
