//! Simulated depth sensor for headless runs and CI without a handset.
//!
//! [`SimDepthSensor`] renders a [`Scene`] through a pinhole camera carried
//! by a user walking along their heading at a constant speed.  Pixels whose
//! surface lies beyond `max_range` (or that see nothing) get zero
//! confidence, like a real time-of-flight sensor.
//!
//! # Example
//!
//! ```rust
//! use wayfind_hal::scene::Scene;
//! use wayfind_hal::sensor::DepthSensor;
//! use wayfind_hal::sim::SimDepthSensor;
//!
//! let mut sensor = SimDepthSensor::new(Scene::pillar())
//!     .with_resolution(32, 24)
//!     .with_walk_speed(0.1);
//!
//! let frame = sensor.capture().expect("sim capture must succeed");
//! assert_eq!(frame.depth.pixel_count(), 32 * 24);
//! ```

use tracing::trace;
use wayfind_perception::frame::{CameraIntrinsics, CameraPose, DepthFrame};
use wayfind_perception::geometry::{Quaternion, Transform3D, Vec3};
use wayfind_types::SenseError;

use crate::scene::Scene;
use crate::sensor::{DepthSensor, SensorFrame};

/// Confidence scale used by the simulated sensor (low / medium / high).
pub const SIM_CONFIDENCE_MAX: u8 = 2;

/// A pinhole depth camera walking through a [`Scene`].
///
/// The camera starts at `(0, eye_height, 0)` facing `+Z` unless moved
/// with [`with_start`][Self::with_start].  Field of view is 90° across the
/// image width.
#[derive(Debug, Clone)]
pub struct SimDepthSensor {
    id: String,
    scene: Scene,
    width: u32,
    height: u32,
    position: Vec3,
    yaw_deg: f32,
    walk_speed: f32,
    max_range: f32,
    degenerate_every: Option<u64>,
    frames: u64,
}

impl SimDepthSensor {
    /// Create a sensor with a 64×48 image, 1.5 m eye height, 5 m range and
    /// a standing user.
    pub fn new(scene: Scene) -> Self {
        Self {
            id: "sim_depth".to_string(),
            scene,
            width: 64,
            height: 48,
            position: Vec3::new(0.0, 1.5, 0.0),
            yaw_deg: 0.0,
            walk_speed: 0.0,
            max_range: 5.0,
            degenerate_every: None,
            frames: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Metres advanced along the heading after every frame.
    pub fn with_walk_speed(mut self, metres_per_frame: f32) -> Self {
        self.walk_speed = metres_per_frame;
        self
    }

    pub fn with_max_range(mut self, metres: f32) -> Self {
        self.max_range = metres;
        self
    }

    pub fn with_start(mut self, position: Vec3, yaw_deg: f32) -> Self {
        self.position = position;
        self.yaw_deg = yaw_deg;
        self
    }

    /// Report an identity pose on every `n`-th frame, as a tracker does
    /// while it has lost its fix.  `0` disables this.
    pub fn with_degenerate_every(mut self, n: u64) -> Self {
        self.degenerate_every = (n > 0).then_some(n);
        self
    }

    /// Intrinsics for the current resolution (90° horizontal field of view).
    pub fn intrinsics(&self) -> CameraIntrinsics {
        let focal = self.width as f32 / 2.0;
        CameraIntrinsics::new(
            focal,
            focal,
            self.width as f32 / 2.0,
            self.height as f32 / 2.0,
            self.width,
            self.height,
        )
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    fn render(&self, intrinsics: &CameraIntrinsics, camera_to_world: &Transform3D) -> DepthFrame {
        let pixels = self.pixel_count();
        let mut depth = Vec::with_capacity(pixels);
        let mut confidence = Vec::with_capacity(pixels);
        for py in 0..self.height {
            for px in 0..self.width {
                // Unit camera-space depth, so the ray parameter is the depth.
                let ray = camera_to_world.apply_vector(intrinsics.unproject(px as f32, py as f32, 1.0));
                match self.scene.raycast(self.position, ray) {
                    Some(z) if z <= self.max_range => {
                        depth.push(z);
                        confidence.push(SIM_CONFIDENCE_MAX);
                    }
                    Some(z) => {
                        depth.push(z);
                        confidence.push(0);
                    }
                    None => {
                        depth.push(0.0);
                        confidence.push(0);
                    }
                }
            }
        }
        DepthFrame::new(self.width, self.height, depth, confidence, SIM_CONFIDENCE_MAX)
    }

    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn advance(&mut self) {
        let (sin, cos) = self.yaw_deg.to_radians().sin_cos();
        self.position = self
            .position
            .add(Vec3::new(sin, 0.0, cos).scale(self.walk_speed));
    }
}

impl DepthSensor for SimDepthSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<SensorFrame, SenseError> {
        if self.width == 0 || self.height == 0 {
            return Err(SenseError::SensorFault {
                sensor: self.id.clone(),
                details: "zero-sized depth image".to_string(),
            });
        }
        self.frames += 1;

        let intrinsics = self.intrinsics();
        let camera_to_world = Transform3D::new(self.position, Quaternion::from_yaw_deg(self.yaw_deg));
        let depth = self.render(&intrinsics, &camera_to_world);

        let lost_fix = self
            .degenerate_every
            .is_some_and(|n| self.frames % n == 0);
        let pose = if lost_fix {
            CameraPose::new(Transform3D::identity(), 0.0)
        } else {
            CameraPose::new(camera_to_world, self.yaw_deg)
        };
        trace!(frame = self.frames, lost_fix, x = self.position.x, z = self.position.z, "sim frame");

        self.advance();
        Ok(SensorFrame {
            depth,
            intrinsics,
            pose,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
