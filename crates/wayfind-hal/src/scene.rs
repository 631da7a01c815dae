//! Box-and-floor world rendered by the simulated depth sensor.
//!
//! | Type | Role |
//! |------|------|
//! | [`Aabb`]  | An axis-aligned box obstacle.                     |
//! | [`Scene`] | A floor plane plus any number of boxes; raycast. |
//!
//! # Example
//!
//! ```rust
//! use wayfind_hal::scene::Scene;
//! use wayfind_perception::geometry::Vec3;
//!
//! let scene = Scene::preset("pillar").unwrap();
//! // Looking straight ahead from head height hits the pillar 1.75 m away.
//! let t = scene.raycast(Vec3::new(0.0, 1.5, 0.0), Vec3::new(0.0, 0.0, 1.0)).unwrap();
//! assert!((t - 1.75).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};
use wayfind_perception::geometry::Vec3;

/// Names accepted by [`Scene::preset`].
pub const PRESETS: &[&str] = &["open", "pillar", "corridor"];

const RAY_EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The constructor normalises the corners so that `min ≤ max` per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Return the centre point of the box.
    pub fn centre(&self) -> Vec3 {
        self.min.add(self.max).scale(0.5)
    }

    /// Return `true` if `p` lies inside or on the boundary of this box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Slab test: distance along `dir` to the first entry into the box.
    ///
    /// `None` when the ray misses or starts inside the box.
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        for (o, d, lo, hi) in [
            (origin.x, dir.x, self.min.x, self.max.x),
            (origin.y, dir.y, self.min.y, self.max.y),
            (origin.z, dir.z, self.min.z, self.max.z),
        ] {
            if d.abs() < RAY_EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (a, b) = ((lo - o) / d, (hi - o) / d);
            t_near = t_near.max(a.min(b));
            t_far = t_far.min(a.max(b));
        }
        (t_near <= t_far && t_near > RAY_EPSILON).then_some(t_near)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene
// ────────────────────────────────────────────────────────────────────────────

/// A horizontal floor at `floor_y` plus box obstacles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub floor_y: f32,
    pub boxes: Vec<Aabb>,
}

impl Scene {
    /// Empty floor at height 0.
    pub fn open() -> Self {
        Self::default()
    }

    /// A 0.5 m square pillar whose front face is 1.75 m ahead of the origin.
    pub fn pillar() -> Self {
        Self::open().with_box(Aabb::new(Vec3::new(-0.25, 0.0, 1.75), Vec3::new(0.25, 2.5, 2.25)))
    }

    /// A 2 m wide corridor along +Z with a waist-high box partly blocking it
    /// 3 m ahead.
    pub fn corridor() -> Self {
        Self::open()
            .with_box(Aabb::new(Vec3::new(-1.2, 0.0, -1.0), Vec3::new(-1.0, 2.5, 12.0)))
            .with_box(Aabb::new(Vec3::new(1.0, 0.0, -1.0), Vec3::new(1.2, 2.5, 12.0)))
            .with_box(Aabb::new(Vec3::new(-0.6, 0.0, 3.0), Vec3::new(0.4, 1.2, 3.4)))
    }

    /// Look up one of [`PRESETS`] by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "open" => Some(Self::open()),
            "pillar" => Some(Self::pillar()),
            "corridor" => Some(Self::corridor()),
            _ => None,
        }
    }

    pub fn with_box(mut self, aabb: Aabb) -> Self {
        self.boxes.push(aabb);
        self
    }

    /// Distance along `dir` to the nearest surface, if any.
    pub fn raycast(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let floor = (dir.y < -RAY_EPSILON)
            .then(|| (self.floor_y - origin.y) / dir.y)
            .filter(|t| *t > RAY_EPSILON);
        self.boxes
            .iter()
            .filter_map(|b| b.intersect(origin, dir))
            .chain(floor)
            .min_by(f32::total_cmp)
    }

    /// True if `p` is inside any box.
    pub fn is_occupied(&self, p: Vec3) -> bool {
        self.boxes.iter().any(|b| b.contains_point(p))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
