//! Rigid-body geometry shared by every stage of the obstacle pipeline.
//!
//! World space is Y-up: `x`/`z` span the walking plane and `y` is height.
//! Camera space follows the depth camera: `+x` right, `+y` up, `+z` along
//! the optical axis.  A [`Transform3D`] maps camera space into world space.
//!
//! # Example
//!
//! ```rust
//! use wayfind_perception::geometry::{Quaternion, Transform3D, Vec3};
//!
//! // Camera 1.5 m above the origin, turned 90° to the right.
//! let pose = Transform3D::new(Vec3::new(0.0, 1.5, 0.0), Quaternion::from_yaw_deg(90.0));
//!
//! // One metre along the optical axis lands on world +X.
//! let p = pose.apply_point(Vec3::new(0.0, 0.0, 1.0));
//! assert!((p.x - 1.0).abs() < 1e-5);
//! assert!((p.y - 1.5).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};

const DEGENERATE_EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector or point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Distance between `self` and `other` projected onto the XZ plane.
    pub fn horizontal_distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the unit vector `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Heading rotation around world `+Y`; positive yaw turns `+Z` towards `+X`.
    pub fn from_yaw_deg(yaw_deg: f32) -> Self {
        Self::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw_deg.to_radians())
    }

    /// Roll around the camera's optical axis (`+Z`).
    pub fn from_roll_deg(roll_deg: f32) -> Self {
        Self::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), roll_deg.to_radians())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn norm_squared(self) -> f32 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from its translation and rotation parts.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// A pure rotation.
    pub fn from_rotation(rotation: Quaternion) -> Self {
        Self::new(Vec3::zero(), rotation)
    }

    /// Compose two transforms: `other` is applied first, then `self`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// Map a point from the source frame into the target frame.
    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    /// Map a direction (no translation).
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v)
    }

    /// True for the transforms a pose tracker reports while it has no fix:
    /// the exact identity, a zero (or non-finite) rotation.
    pub fn is_degenerate(&self) -> bool {
        let norm = self.rotation.norm_squared();
        if !norm.is_finite() || norm < DEGENERATE_EPSILON || !self.translation.is_finite() {
            return true;
        }
        let identity = Quaternion::identity();
        self.translation.length() < DEGENERATE_EPSILON
            && (self.rotation.w - identity.w).abs() < DEGENERATE_EPSILON
            && self.rotation.x.abs() < DEGENERATE_EPSILON
            && self.rotation.y.abs() < DEGENERATE_EPSILON
            && self.rotation.z.abs() < DEGENERATE_EPSILON
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Device orientation
// ────────────────────────────────────────────────────────────────────────────

/// How the handset is held relative to the depth sensor's native
/// (landscape-right) image orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    #[default]
    LandscapeRight,
    Portrait,
    LandscapeLeft,
    PortraitUpsideDown,
}

impl DeviceOrientation {
    /// Roll that takes image-aligned camera space to device space.
    pub fn roll_deg(self) -> f32 {
        match self {
            DeviceOrientation::LandscapeRight => 0.0,
            DeviceOrientation::Portrait => 90.0,
            DeviceOrientation::LandscapeLeft => 180.0,
            DeviceOrientation::PortraitUpsideDown => 270.0,
        }
    }

    /// Correction applied before the camera's local-to-world transform.
    pub fn correction(self) -> Transform3D {
        Transform3D::from_rotation(Quaternion::from_roll_deg(self.roll_deg()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HorizontalFrame
// ────────────────────────────────────────────────────────────────────────────

/// A point expressed in the user's walking frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkingOffset {
    /// Metres ahead of the user (negative is behind).
    pub forward: f32,
    /// Metres to the user's right (negative is left).
    pub lateral: f32,
    /// Metres above the camera (negative is below).
    pub height: f32,
}

/// The user's gravity-aligned walking frame: origin at the camera, forward
/// along the camera yaw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalFrame {
    pub origin: Vec3,
    sin_yaw: f32,
    cos_yaw: f32,
}

impl HorizontalFrame {
    pub fn new(origin: Vec3, yaw_deg: f32) -> Self {
        let (sin_yaw, cos_yaw) = yaw_deg.to_radians().sin_cos();
        Self {
            origin,
            sin_yaw,
            cos_yaw,
        }
    }

    /// Express the world point `p` in this frame.
    pub fn project(&self, p: Vec3) -> WalkingOffset {
        let rel = p.sub(self.origin);
        WalkingOffset {
            forward: rel.x * self.sin_yaw + rel.z * self.cos_yaw,
            lateral: rel.x * self.cos_yaw - rel.z * self.sin_yaw,
            height: rel.y,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
