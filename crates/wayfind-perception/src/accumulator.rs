//! Projects depth samples into world space and counts them in the voxel map.

use tracing::debug;

use crate::frame::{CameraIntrinsics, CameraPose, DepthFrame};
use crate::voxel_grid::VoxelGrid;

/// Outcome of one [`PointAccumulator::accumulate`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulateStats {
    /// Samples inserted into the voxel map.
    pub inserted: usize,
    /// Samples skipped for low confidence or missing depth.
    pub rejected: usize,
    /// True when the whole frame was dropped because of the camera pose.
    pub pose_rejected: bool,
}

/// Turns a depth frame into voxel observations.
#[derive(Debug, Clone)]
pub struct PointAccumulator {
    min_confidence: f32,
    stride: usize,
}

impl PointAccumulator {
    /// `min_confidence` is compared against `confidence / confidence_max`;
    /// `stride` samples every n-th pixel in both directions.
    pub fn new(min_confidence: f32, stride: usize) -> Self {
        Self {
            min_confidence,
            stride: stride.max(1),
        }
    }

    /// Insert every usable sample of `frame` into `grid`.
    ///
    /// A sample is usable when its normalised confidence is at least
    /// `min_confidence` and its depth is positive.  A degenerate pose drops
    /// the whole frame so that the accumulated map is never corrupted.
    pub fn accumulate(
        &self,
        grid: &mut VoxelGrid,
        frame: &DepthFrame,
        intrinsics: &CameraIntrinsics,
        pose: &CameraPose,
    ) -> AccumulateStats {
        let mut stats = AccumulateStats::default();
        if pose.is_degenerate() {
            debug!("degenerate camera pose; frame not accumulated");
            stats.pose_rejected = true;
            return stats;
        }

        let to_world = pose.effective_transform();
        let width = frame.width as usize;
        for py in (0..frame.height as usize).step_by(self.stride) {
            for px in (0..width).step_by(self.stride) {
                let i = py * width + px;
                let z = frame.depth_at(i);
                let usable =
                    z.is_finite() && z > 0.0 && frame.confidence_at(i) >= self.min_confidence;
                if !usable {
                    stats.rejected += 1;
                    continue;
                }
                let local = intrinsics.unproject(px as f32, py as f32, z);
                grid.insert(to_world.apply_point(local));
                stats.inserted += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DeviceOrientation, Quaternion, Transform3D, Vec3};
    use crate::voxel_grid::VoxelKey;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(2.0, 2.0, 1.0, 1.0, 2, 2)
    }

    fn pose_at(position: Vec3) -> CameraPose {
        CameraPose::new(Transform3D::new(position, Quaternion::identity()), 0.0)
    }

    #[test]
    fn confident_sample_lands_in_world_voxel() {
        let mut grid = VoxelGrid::new(0.1);
        // Only the pixel at the principal point (1, 1) has depth.
        let frame = DepthFrame::new(2, 2, vec![0.0, 0.0, 0.0, 2.0], vec![2, 2, 2, 2], 2);
        let stats = PointAccumulator::new(0.1, 1).accumulate(
            &mut grid,
            &frame,
            &intrinsics(),
            &pose_at(Vec3::new(0.0, 1.5, 0.0)),
        );
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.rejected, 3);
        let key = VoxelKey::quantize(Vec3::new(0.0, 1.5, 2.0), 0.1);
        assert_eq!(grid.count(key), 1);
    }

    #[test]
    fn repeated_frames_increment_counts() {
        let mut grid = VoxelGrid::new(0.1);
        let frame = DepthFrame::new(2, 2, vec![0.0, 0.0, 0.0, 1.0], vec![0, 0, 0, 2], 2);
        let acc = PointAccumulator::new(0.1, 1);
        let pose = pose_at(Vec3::new(0.0, 1.0, 0.0));
        for _ in 0..3 {
            acc.accumulate(&mut grid, &frame, &intrinsics(), &pose);
        }
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.iter().next().map(|(_, c)| c), Some(3));
    }

    #[test]
    fn low_confidence_and_missing_depth_are_skipped() {
        let mut grid = VoxelGrid::new(0.1);
        let frame = DepthFrame::new(2, 2, vec![1.0, -1.0, 0.0, f32::NAN], vec![0, 2, 2, 2], 20);
        let stats = PointAccumulator::new(0.1, 1).accumulate(
            &mut grid,
            &frame,
            &intrinsics(),
            &pose_at(Vec3::new(0.0, 1.0, 0.0)),
        );
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.rejected, 4);
        assert!(grid.is_empty());
    }

    #[test]
    fn missing_confidence_buffer_skips_everything() {
        let mut grid = VoxelGrid::new(0.1);
        let frame = DepthFrame::new(2, 2, vec![1.0; 4], Vec::new(), 2);
        PointAccumulator::new(0.1, 1).accumulate(
            &mut grid,
            &frame,
            &intrinsics(),
            &pose_at(Vec3::new(0.0, 1.0, 0.0)),
        );
        assert!(grid.is_empty());
    }

    #[test]
    fn degenerate_pose_leaves_map_untouched() {
        let mut grid = VoxelGrid::new(0.1);
        grid.insert(Vec3::new(1.0, 1.0, 1.0));
        let frame = DepthFrame::new(2, 2, vec![1.0; 4], vec![2; 4], 2);
        let stats = PointAccumulator::new(0.1, 1).accumulate(
            &mut grid,
            &frame,
            &intrinsics(),
            &CameraPose::new(Transform3D::identity(), 0.0),
        );
        assert!(stats.pose_rejected);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn yawed_camera_projects_along_heading() {
        let mut grid = VoxelGrid::new(0.1);
        let frame = DepthFrame::new(2, 2, vec![0.0, 0.0, 0.0, 3.0], vec![2; 4], 2);
        let pose = CameraPose::new(
            Transform3D::new(Vec3::new(0.0, 1.2, 0.0), Quaternion::from_yaw_deg(90.0)),
            90.0,
        );
        PointAccumulator::new(0.1, 1).accumulate(&mut grid, &frame, &intrinsics(), &pose);
        assert_eq!(grid.count(VoxelKey::quantize(Vec3::new(3.0, 1.2, 0.0), 0.1)), 1);
    }

    #[test]
    fn portrait_orientation_is_applied() {
        let mut grid = VoxelGrid::new(0.1);
        // Pixel (0, 1): one pixel left of the principal point at 2 m.
        let frame = DepthFrame::new(2, 2, vec![0.0, 0.0, 2.0, 0.0], vec![2; 4], 2);
        let pose = pose_at(Vec3::new(0.0, 1.0, 0.0)).with_orientation(DeviceOrientation::Portrait);
        PointAccumulator::new(0.1, 1).accumulate(&mut grid, &frame, &intrinsics(), &pose);
        // Camera-space (-1, 0, 2) rolled 90° becomes (0, -1, 2).
        assert_eq!(grid.count(VoxelKey::quantize(Vec3::new(0.0, 0.0, 2.0), 0.1)), 1);
    }

    #[test]
    fn stride_subsamples_pixels() {
        let mut grid = VoxelGrid::new(0.1);
        let frame = DepthFrame::new(4, 4, vec![1.0; 16], vec![2; 16], 2);
        let k = CameraIntrinsics::new(4.0, 4.0, 2.0, 2.0, 4, 4);
        let stats = PointAccumulator::new(0.1, 2).accumulate(
            &mut grid,
            &frame,
            &k,
            &pose_at(Vec3::new(0.0, 1.0, 0.0)),
        );
        assert_eq!(stats.inserted, 4);
    }
}
