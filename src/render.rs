//! Render hand-off types
//!
//! The renderer itself lives outside this crate. It receives a [`RenderState`]
//! with both matrices flattened row-major and the box geometry alongside.

use nalgebra::Matrix4;

use crate::pose::Pose;
use crate::state::Regime;

/// View and projection matrices for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub view: Matrix4<f64>,
    pub proj: Matrix4<f64>,
}

impl RenderTransform {
    pub fn view_row_major(&self) -> [f32; 16] {
        flatten_row_major(&self.view)
    }

    pub fn proj_row_major(&self) -> [f32; 16] {
        flatten_row_major(&self.proj)
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub view_matrix: [f32; 16],
    pub proj_matrix: [f32; 16],
    pub box_depth_m: f64,
    pub box_size_m: f64,
}

impl RenderState {
    pub fn new(transform: &RenderTransform, box_size_m: f64, box_depth_m: f64) -> Self {
        Self {
            view_matrix: transform.view_row_major(),
            proj_matrix: transform.proj_row_major(),
            box_depth_m,
            box_size_m,
        }
    }
}

/// One tick of the pipeline: the pose that was rendered and what was sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame {
    pub raw: Pose,
    pub pose: Pose,
    pub regime: Regime,
    pub state: RenderState,
}

/// Consumer of render frames
pub trait RenderSink {
    fn submit(&mut self, frame: &RenderFrame) -> anyhow::Result<()>;
}

/// Sink that keeps every frame in memory
#[derive(Debug, Default)]
pub struct FrameRecorder {
    pub frames: Vec<RenderFrame>,
}

impl RenderSink for FrameRecorder {
    fn submit(&mut self, frame: &RenderFrame) -> anyhow::Result<()> {
        self.frames.push(*frame);
        Ok(())
    }
}

/// Flatten to 16 floats, row by row.
pub fn flatten_row_major(m: &Matrix4<f64>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = m[(row, col)] as f32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_is_row_major() {
        let m = Matrix4::new_translation(&nalgebra::Vector3::new(1.0, 2.0, 3.0));
        let flat = flatten_row_major(&m);
        assert_eq!(flat[3], 1.0);
        assert_eq!(flat[7], 2.0);
        assert_eq!(flat[11], 3.0);
        assert_eq!(flat[12], 0.0);
        assert_eq!(flat[15], 1.0);
    }

    #[test]
    fn test_render_state_carries_box_geometry() {
        let transform = RenderTransform {
            view: Matrix4::identity(),
            proj: Matrix4::identity(),
        };
        let state = RenderState::new(&transform, 0.3, 0.5);
        assert_eq!(state.box_size_m, 0.3);
        assert_eq!(state.box_depth_m, 0.5);
        assert_eq!(state.view_matrix[0], 1.0);
        assert_eq!(state.view_matrix[1], 0.0);
    }
}
