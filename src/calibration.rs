//! Display calibration
//!
//! Turns a stabilized head pose into the view and projection matrices used to
//! render the box. The camera offset corrects for the sensor being mounted
//! away from the display reference frame.

use nalgebra::{Matrix4, Vector3};

use crate::error::{ensure_finite, ensure_positive, ConfigError};
use crate::pose::Pose;
use crate::render::RenderTransform;

/// Physical size and pixel resolution of the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub width_m: f64,
    pub height_m: f64,
    pub resolution_w: u32,
    pub resolution_h: u32,
}

impl DisplayGeometry {
    pub fn new(
        width_m: f64,
        height_m: f64,
        resolution_w: u32,
        resolution_h: u32,
    ) -> Result<Self, ConfigError> {
        let geometry = Self {
            width_m,
            height_m,
            resolution_w,
            resolution_h,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("width_m", self.width_m)?;
        ensure_positive("height_m", self.height_m)?;
        if self.resolution_w == 0 || self.resolution_h == 0 {
            return Err(ConfigError::DegenerateAspect {
                width: self.resolution_w,
                height: self.resolution_h,
            });
        }
        Ok(())
    }

    /// Pixel aspect ratio, width over height
    pub fn aspect(&self) -> Result<f64, ConfigError> {
        if self.resolution_h == 0 {
            return Err(ConfigError::DegenerateAspect {
                width: self.resolution_w,
                height: self.resolution_h,
            });
        }
        Ok(self.resolution_w as f64 / self.resolution_h as f64)
    }
}

/// Fixed sensor-to-display correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOffset {
    /// Translation [m]
    pub translation_m: Vector3<f64>,
    /// Yaw, pitch, roll [deg]
    pub rotation_ypr_deg: Vector3<f64>,
}

impl CalibrationOffset {
    pub fn new(
        translation_m: Vector3<f64>,
        rotation_ypr_deg: Vector3<f64>,
    ) -> Result<Self, ConfigError> {
        let offset = Self {
            translation_m,
            rotation_ypr_deg,
        };
        offset.validate()?;
        Ok(offset)
    }

    /// Build from `[tx, ty, tz, yaw, pitch, roll]`
    pub fn from_array(values: [f64; 6]) -> Result<Self, ConfigError> {
        let [tx, ty, tz, yaw, pitch, roll] = values;
        Self::new(Vector3::new(tx, ty, tz), Vector3::new(yaw, pitch, roll))
    }

    pub fn zero() -> Self {
        Self {
            translation_m: Vector3::zeros(),
            rotation_ypr_deg: Vector3::zeros(),
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        let t = &self.translation_m;
        let r = &self.rotation_ypr_deg;
        [t.x, t.y, t.z, r.x, r.y, r.z]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_finite("camera_offset.tx", self.translation_m.x)?;
        ensure_finite("camera_offset.ty", self.translation_m.y)?;
        ensure_finite("camera_offset.tz", self.translation_m.z)?;
        ensure_finite("camera_offset.yaw", self.rotation_ypr_deg.x)?;
        ensure_finite("camera_offset.pitch", self.rotation_ypr_deg.y)?;
        ensure_finite("camera_offset.roll", self.rotation_ypr_deg.z)?;
        Ok(())
    }
}

impl Default for CalibrationOffset {
    fn default() -> Self {
        Self::zero()
    }
}

/// Perspective frustum settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub fov_deg: f64,
    pub near_m: f64,
    pub far_m: f64,
}

impl ProjectionParams {
    pub fn new(fov_deg: f64, near_m: f64, far_m: f64) -> Result<Self, ConfigError> {
        let params = Self {
            fov_deg,
            near_m,
            far_m,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fov_deg > 0.0 && self.fov_deg < 180.0) {
            return Err(ConfigError::out_of_range(
                "fov_deg",
                "in (0, 180)",
                self.fov_deg,
            ));
        }
        let clip_ok = self.near_m.is_finite()
            && self.far_m.is_finite()
            && self.near_m > 0.0
            && self.far_m > self.near_m;
        if !clip_ok {
            return Err(ConfigError::ClipPlanes {
                near: self.near_m,
                far: self.far_m,
            });
        }
        Ok(())
    }
}

/// Derives camera matrices from a pose and the static display setup
#[derive(Debug, Clone, PartialEq)]
pub struct Calibrator {
    geometry: DisplayGeometry,
    offset: CalibrationOffset,
}

impl Calibrator {
    pub fn new(geometry: DisplayGeometry, offset: CalibrationOffset) -> Result<Self, ConfigError> {
        geometry.validate()?;
        offset.validate()?;
        Ok(Self { geometry, offset })
    }

    pub fn geometry(&self) -> &DisplayGeometry {
        &self.geometry
    }

    pub fn offset(&self) -> &CalibrationOffset {
        &self.offset
    }

    /// Replace the display geometry; the old one is kept on error.
    pub fn set_display_geometry(&mut self, geometry: DisplayGeometry) -> Result<(), ConfigError> {
        geometry.validate()?;
        self.geometry = geometry;
        Ok(())
    }

    /// Replace the camera offset; the old one is kept on error.
    pub fn set_camera_offset(&mut self, offset: CalibrationOffset) -> Result<(), ConfigError> {
        offset.validate()?;
        self.offset = offset;
        Ok(())
    }

    /// World-to-camera matrix, composed as `Rz * Rx * Ry * T`.
    pub fn compute_view(&self, pose: &Pose) -> Matrix4<f64> {
        let eye = pose.position_m + self.offset.translation_m;
        let ypr = (pose.yaw_pitch_roll_deg + self.offset.rotation_ypr_deg).map(f64::to_radians);

        let t = Matrix4::new_translation(&-eye);
        let ry = rotation_y(ypr.x);
        let rx = rotation_x(ypr.y);
        let rz = rotation_z(ypr.z);

        rz * rx * ry * t
    }

    /// Symmetric perspective projection, OpenGL clip-space convention.
    pub fn compute_proj(&self, fov_deg: f64, near_m: f64, far_m: f64) -> Result<Matrix4<f64>, ConfigError> {
        ProjectionParams::new(fov_deg, near_m, far_m)?;
        let aspect = self.geometry.aspect()?;
        let f = 1.0 / (fov_deg.to_radians() / 2.0).tan();
        let depth = near_m - far_m;

        #[rustfmt::skip]
        let m = Matrix4::new(
            f / aspect, 0.0, 0.0,                      0.0,
            0.0,        f,   0.0,                      0.0,
            0.0,        0.0, (far_m + near_m) / depth, 2.0 * far_m * near_m / depth,
            0.0,        0.0, -1.0,                     0.0,
        );
        // Finite but extreme planes can still overflow the depth terms.
        if !m.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::ClipPlanes {
                near: near_m,
                far: far_m,
            });
        }
        Ok(m)
    }

    /// View and projection for one frame
    pub fn compute_render_transform(
        &self,
        pose: &Pose,
        projection: &ProjectionParams,
    ) -> Result<RenderTransform, ConfigError> {
        let proj = self.compute_proj(projection.fov_deg, projection.near_m, projection.far_m)?;
        Ok(RenderTransform {
            view: self.compute_view(pose),
            proj,
        })
    }
}

#[rustfmt::skip]
fn rotation_y(angle: f64) -> Matrix4<f64> {
    let (s, c) = angle.sin_cos();
    Matrix4::new(
        c,   0.0, s,   0.0,
        0.0, 1.0, 0.0, 0.0,
        -s,  0.0, c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[rustfmt::skip]
fn rotation_x(angle: f64) -> Matrix4<f64> {
    let (s, c) = angle.sin_cos();
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, c,   -s,  0.0,
        0.0, s,   c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[rustfmt::skip]
fn rotation_z(angle: f64) -> Matrix4<f64> {
    let (s, c) = angle.sin_cos();
    Matrix4::new(
        c,   -s,  0.0, 0.0,
        s,   c,   0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}
