//! Keyboard-driven pose source
//!
//! Stands in for a head tracker during development: held arrow keys move the
//! head in the display plane at a fixed speed, integrated over wall-clock
//! time between reads.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use nalgebra::Vector3;
use tracing::info;

use crate::error::{ensure_finite, ensure_positive, ConfigError};
use crate::pose::Pose;
use crate::source::PoseSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionKey {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardConfig {
    /// Movement speed while a key is held [m/s]
    pub speed_m_s: f64,
    /// Constant head distance from the display [m]
    pub z_fixed_m: f64,
    /// x and y are clamped to +/- this bound [m]
    pub bound_xy_m: f64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            speed_m_s: 0.35,
            z_fixed_m: 0.7,
            bound_xy_m: 0.35,
        }
    }
}

impl KeyboardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("speed_m_s", self.speed_m_s)?;
        ensure_finite("z_fixed_m", self.z_fixed_m)?;
        ensure_positive("bound_xy_m", self.bound_xy_m)?;
        Ok(())
    }
}

#[derive(Debug)]
struct KeyboardState {
    running: bool,
    pressed: HashSet<DirectionKey>,
    x: f64,
    y: f64,
    last_read: Instant,
}

/// Handle for the UI thread to feed key events into a [`KeyboardSource`]
#[derive(Debug, Clone)]
pub struct KeyboardController {
    state: Arc<Mutex<KeyboardState>>,
}

impl KeyboardController {
    pub fn set_key(&self, key: DirectionKey, pressed: bool) {
        let mut state = lock(&self.state);
        if pressed {
            state.pressed.insert(key);
        } else {
            state.pressed.remove(&key);
        }
    }

    /// Release every key, e.g. when the window loses focus
    pub fn clear_keys(&self) {
        lock(&self.state).pressed.clear();
    }

    /// Move back to the display center and release all keys
    pub fn recenter(&self) {
        let mut state = lock(&self.state);
        state.x = 0.0;
        state.y = 0.0;
        state.pressed.clear();
    }
}

/// Simulated tracker driven by direction keys
#[derive(Debug)]
pub struct KeyboardSource {
    config: KeyboardConfig,
    epoch: Instant,
    state: Arc<Mutex<KeyboardState>>,
}

impl KeyboardSource {
    pub fn new(config: KeyboardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = Instant::now();
        Ok(Self {
            config,
            epoch: now,
            state: Arc::new(Mutex::new(KeyboardState {
                running: false,
                pressed: HashSet::new(),
                x: 0.0,
                y: 0.0,
                last_read: now,
            })),
        })
    }

    pub fn controller(&self) -> KeyboardController {
        KeyboardController {
            state: Arc::clone(&self.state),
        }
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }
}

impl PoseSource for KeyboardSource {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn start(&mut self) {
        let mut state = lock(&self.state);
        state.running = true;
        state.last_read = Instant::now();
        info!(source = self.name(), "pose source started");
    }

    fn stop(&mut self) {
        let mut state = lock(&self.state);
        state.running = false;
        state.pressed.clear();
        info!(source = self.name(), "pose source stopped");
    }

    fn recenter(&mut self) {
        self.controller().recenter();
    }

    fn get_latest_pose(&self) -> Pose {
        let now = Instant::now();
        let mut state = lock(&self.state);
        let dt = now.saturating_duration_since(state.last_read).as_secs_f64();
        state.last_read = now;

        if state.running {
            let axis = |neg: DirectionKey, pos: DirectionKey| {
                let mut v = 0.0;
                if state.pressed.contains(&neg) {
                    v -= 1.0;
                }
                if state.pressed.contains(&pos) {
                    v += 1.0;
                }
                v
            };
            let dx = axis(DirectionKey::Left, DirectionKey::Right);
            let dy = axis(DirectionKey::Down, DirectionKey::Up);

            let step = self.config.speed_m_s * dt;
            let b = self.config.bound_xy_m;
            state.x = (state.x + dx * step).clamp(-b, b);
            state.y = (state.y + dy * step).clamp(-b, b);
        }

        let timestamp_ms = now.saturating_duration_since(self.epoch).as_millis() as i64;
        Pose::at(
            timestamp_ms,
            Vector3::new(state.x, state.y, self.config.z_fixed_m),
        )
    }
}

fn lock(state: &Mutex<KeyboardState>) -> MutexGuard<'_, KeyboardState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
