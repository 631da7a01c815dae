//! View-frustum decay of stale voxels.
//!
//! The frustum is four half-spaces through the camera centre, one per edge
//! of the depth image.  Each frame the [`FrustumCuller`]:
//!
//! 1. removes any voxel further than `max_distance` from the camera on the
//!    XZ plane, whatever the view direction;
//! 2. for voxels outside all four planes, removes those already at count 0
//!    and zeroes the rest, which gives a single missed observation one frame
//!    of grace before deletion.
//!
//! The map is never mutated while it is being scanned.

use tracing::debug;

use crate::frame::{CameraIntrinsics, CameraPose};
use crate::geometry::Vec3;
use crate::voxel_grid::{VoxelGrid, VoxelKey};

const MIN_NORMAL_LENGTH: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Plane
// ────────────────────────────────────────────────────────────────────────────

/// A plane `normal · p + offset = 0` with a unit normal pointing into the
/// frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    /// Plane through `point` with the (not necessarily unit) `normal`.
    ///
    /// Returns `None` for a zero-length normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Option<Self> {
        let len = normal.length();
        if !len.is_finite() || len < MIN_NORMAL_LENGTH {
            return None;
        }
        let normal = normal.scale(1.0 / len);
        Some(Self {
            normal,
            offset: -normal.dot(point),
        })
    }

    /// Positive on the inner side of the plane.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.offset
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frustum
// ────────────────────────────────────────────────────────────────────────────

/// The four side planes of the current camera view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub apex: Vec3,
    pub planes: [Plane; 4],
}

impl Frustum {
    /// Build the frustum from the four back-projected image corners.
    ///
    /// Returns `None` when the image or pose is too degenerate to span a
    /// volume (zero-sized image, collapsed rays).
    pub fn from_camera(intrinsics: &CameraIntrinsics, pose: &CameraPose) -> Option<Self> {
        let w = intrinsics.width as f32;
        let h = intrinsics.height as f32;
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        let to_world = pose.effective_transform();
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let rays = corners.map(|(px, py)| to_world.apply_vector(intrinsics.unproject(px, py, 1.0)));
        let axis = rays.iter().fold(Vec3::zero(), |acc, r| acc.add(*r));

        let apex = pose.position;
        let mut planes = [Plane {
            normal: Vec3::zero(),
            offset: 0.0,
        }; 4];
        for i in 0..4 {
            let mut normal = rays[i].cross(rays[(i + 1) % 4]);
            if normal.dot(axis) < 0.0 {
                normal = normal.scale(-1.0);
            }
            planes[i] = Plane::from_point_normal(apex, normal)?;
        }
        Some(Self { apex, planes })
    }

    /// True when `p` is on the inner side of every plane.
    pub fn contains(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// True when `p` is on the outer side of every plane, i.e. well out of
    /// the camera's view.
    pub fn outside_all(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) < 0.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrustumCuller
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one [`FrustumCuller::cull`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    pub removed: usize,
    pub zeroed: usize,
}

/// Per-frame pruning of the voxel map.
#[derive(Debug, Clone)]
pub struct FrustumCuller {
    max_distance: f32,
}

impl FrustumCuller {
    /// `max_distance` is the horizontal radius kept around the camera,
    /// usually `search_radius + 1`.
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Prune `grid` around `camera`.  Without a frustum only the distance
    /// bound is applied.
    pub fn cull(&self, grid: &mut VoxelGrid, frustum: Option<&Frustum>, camera: Vec3) -> CullStats {
        let mut to_remove: Vec<VoxelKey> = Vec::new();
        let mut to_zero: Vec<VoxelKey> = Vec::new();

        for (key, count) in grid.iter() {
            let centre = grid.centre_of(key);
            if centre.horizontal_distance(camera) > self.max_distance {
                to_remove.push(key);
            } else if let Some(frustum) = frustum
                && frustum.outside_all(centre)
            {
                if count == 0 {
                    to_remove.push(key);
                } else {
                    to_zero.push(key);
                }
            }
        }

        for key in &to_remove {
            grid.remove(*key);
        }
        for key in &to_zero {
            grid.zero(*key);
        }

        let stats = CullStats {
            removed: to_remove.len(),
            zeroed: to_zero.len(),
        };
        if stats.removed > 0 || stats.zeroed > 0 {
            debug!(removed = stats.removed, zeroed = stats.zeroed, "voxels culled");
        }
        stats
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Quaternion, Transform3D};

    fn camera(yaw_deg: f32) -> (CameraIntrinsics, CameraPose) {
        // 90° horizontal field of view.
        let k = CameraIntrinsics::new(32.0, 32.0, 32.0, 24.0, 64, 48);
        let pose = CameraPose::new(
            Transform3D::new(Vec3::new(0.0, 1.5, 0.0), Quaternion::from_yaw_deg(yaw_deg)),
            yaw_deg,
        );
        (k, pose)
    }

    #[test]
    fn frustum_contains_point_ahead() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        assert!(f.contains(Vec3::new(0.0, 1.5, 3.0)));
        assert!(!f.outside_all(Vec3::new(0.0, 1.5, 3.0)));
    }

    #[test]
    fn point_behind_is_outside_all_planes() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        assert!(f.outside_all(Vec3::new(0.0, 1.5, -3.0)));
    }

    #[test]
    fn point_beside_is_outside_one_plane_only() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        let beside = Vec3::new(5.0, 1.5, 1.0);
        assert!(!f.contains(beside));
        assert!(!f.outside_all(beside));
    }

    #[test]
    fn frustum_follows_yaw() {
        let (k, pose) = camera(90.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        assert!(f.contains(Vec3::new(3.0, 1.5, 0.0)));
        assert!(f.outside_all(Vec3::new(-3.0, 1.5, 0.0)));
    }

    #[test]
    fn zero_sized_image_has_no_frustum() {
        let (_, pose) = camera(0.0);
        let k = CameraIntrinsics::new(1.0, 1.0, 0.0, 0.0, 0, 0);
        assert!(Frustum::from_camera(&k, &pose).is_none());
    }

    #[test]
    fn far_voxels_are_removed_regardless_of_view() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        let mut grid = VoxelGrid::new(0.1);
        grid.insert(Vec3::new(0.0, 1.5, 7.5)); // ahead, beyond 7 m
        grid.insert(Vec3::new(-6.0, 0.0, -4.0)); // behind, beyond 7 m
        grid.insert(Vec3::new(0.0, 1.5, 3.0)); // ahead, in range

        let stats = FrustumCuller::new(7.0).cull(&mut grid, Some(&f), pose.position);
        assert_eq!(stats.removed, 2);
        for (key, _) in grid.iter() {
            assert!(grid.centre_of(key).horizontal_distance(pose.position) <= 7.0);
        }
    }

    #[test]
    fn unseen_voxel_gets_one_frame_of_grace() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        let culler = FrustumCuller::new(7.0);
        let mut grid = VoxelGrid::new(0.1);
        let behind = Vec3::new(0.0, 1.5, -2.0);
        grid.insert(behind);
        grid.insert(behind);

        let first = culler.cull(&mut grid, Some(&f), pose.position);
        assert_eq!(first, CullStats { removed: 0, zeroed: 1 });
        assert_eq!(grid.count(grid.key_for(behind)), 0);
        assert_eq!(grid.len(), 1);

        let second = culler.cull(&mut grid, Some(&f), pose.position);
        assert_eq!(second, CullStats { removed: 1, zeroed: 0 });
        assert!(grid.is_empty());
    }

    #[test]
    fn visible_voxels_are_untouched() {
        let (k, pose) = camera(0.0);
        let f = Frustum::from_camera(&k, &pose).unwrap();
        let mut grid = VoxelGrid::new(0.1);
        let ahead = Vec3::new(0.5, 1.0, 2.0);
        grid.insert(ahead);
        let stats = FrustumCuller::new(7.0).cull(&mut grid, Some(&f), pose.position);
        assert_eq!(stats, CullStats::default());
        assert_eq!(grid.count(grid.key_for(ahead)), 1);
    }

    #[test]
    fn without_frustum_only_distance_applies() {
        let mut grid = VoxelGrid::new(0.1);
        grid.insert(Vec3::new(0.0, 0.0, -2.0));
        grid.insert(Vec3::new(0.0, 0.0, 9.0));
        let stats = FrustumCuller::new(7.0).cull(&mut grid, None, Vec3::zero());
        assert_eq!(stats, CullStats { removed: 1, zeroed: 0 });
        assert_eq!(grid.len(), 1);
    }
}
