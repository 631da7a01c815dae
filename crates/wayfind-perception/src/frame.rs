//! Per-frame sensor inputs: depth samples, intrinsics and camera pose.

use serde::{Deserialize, Serialize};

use crate::geometry::{DeviceOrientation, Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// CameraIntrinsics
// ────────────────────────────────────────────────────────────────────────────

/// Pinhole intrinsics for an image of `width × height` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Rescale intrinsics reported for the colour image onto an image of
    /// `width × height` (typically the much smaller depth map).
    ///
    /// Returns `self` unchanged when either resolution is zero.
    pub fn scaled_to(&self, width: u32, height: u32) -> Self {
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return *self;
        }
        let sx = width as f32 / self.width as f32;
        let sy = height as f32 / self.height as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
            width,
            height,
        }
    }

    /// Back-project pixel `(px, py)` at depth `z` into camera space.
    ///
    /// Image rows grow downwards, camera `+y` points up.
    pub fn unproject(&self, px: f32, py: f32, z: f32) -> Vec3 {
        Vec3::new(
            (px - self.cx) * z / self.fx,
            -(py - self.cy) * z / self.fy,
            z,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DepthFrame
// ────────────────────────────────────────────────────────────────────────────

/// A depth image with its per-pixel confidence map, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Depth in metres; `0` or negative means no return.
    pub depth: Vec<f32>,
    /// Sensor confidence per pixel in `0..=confidence_max`.  May be empty
    /// or shorter than `depth` when the sensor dropped the buffer.
    pub confidence: Vec<u8>,
    pub confidence_max: u8,
}

impl DepthFrame {
    pub fn new(
        width: u32,
        height: u32,
        depth: Vec<f32>,
        confidence: Vec<u8>,
        confidence_max: u8,
    ) -> Self {
        Self {
            width,
            height,
            depth,
            confidence,
            confidence_max,
        }
    }

    /// Depth at linear pixel index `i`, `0.0` when the buffer is short.
    pub fn depth_at(&self, i: usize) -> f32 {
        self.depth.get(i).copied().unwrap_or(0.0)
    }

    /// Normalised confidence (`confidence / confidence_max`) at `i`.
    ///
    /// A missing or short confidence buffer reads as zero confidence.
    pub fn confidence_at(&self, i: usize) -> f32 {
        if self.confidence_max == 0 {
            return 0.0;
        }
        match self.confidence.get(i) {
            Some(&c) => c as f32 / self.confidence_max as f32,
            None => 0.0,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CameraPose
// ────────────────────────────────────────────────────────────────────────────

/// Camera pose as reported by the external tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Camera position in world space.
    pub position: Vec3,
    /// Heading around world `+Y` in degrees; 0 faces `+Z`.
    pub yaw_deg: f32,
    pub local_to_world: Transform3D,
    #[serde(default)]
    pub orientation: DeviceOrientation,
}

impl CameraPose {
    /// Pose whose position is the transform's translation.
    pub fn new(local_to_world: Transform3D, yaw_deg: f32) -> Self {
        Self {
            position: local_to_world.translation,
            yaw_deg,
            local_to_world,
            orientation: DeviceOrientation::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: DeviceOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Camera-to-world transform including the device-orientation correction.
    pub fn effective_transform(&self) -> Transform3D {
        self.local_to_world.compose(self.orientation.correction())
    }

    /// True when the tracker has no usable fix for this frame.
    pub fn is_degenerate(&self) -> bool {
        self.local_to_world.is_degenerate() || !self.position.is_finite() || !self.yaw_deg.is_finite()
    }
}
