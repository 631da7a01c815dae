//! Running floor-height estimate from low voxels right under the camera.

use tracing::trace;

use crate::geometry::Vec3;
use crate::voxel_grid::VoxelGrid;

/// Maintains the floor height relative to the camera.
///
/// Evidence is every voxel below the camera within `radius` metres on the
/// XZ plane, weighted by its observation count.  Once the weighted count
/// reaches `min_samples` the estimate becomes
/// `min(default_ground, mean_height + padding)`, so it never rises above
/// `default_ground`.
#[derive(Debug, Clone)]
pub struct GroundEstimator {
    ground: f32,
    default_ground: f32,
    padding: f32,
    radius: f32,
    min_samples: u32,
}

impl GroundEstimator {
    pub fn new(default_ground: f32, padding: f32, radius: f32, min_samples: u32) -> Self {
        Self {
            ground: default_ground,
            default_ground,
            padding,
            radius,
            min_samples,
        }
    }

    /// Current floor height relative to the camera (metres).
    pub fn ground(&self) -> f32 {
        self.ground
    }

    /// Fold the evidence currently in `grid` into the estimate.
    ///
    /// Returns the new estimate when there was enough evidence, `None`
    /// otherwise (the previous value is kept).
    pub fn update(&mut self, grid: &VoxelGrid, camera: Vec3) -> Option<f32> {
        let mut weighted_height = 0.0f64;
        let mut samples = 0u64;
        for (centre, count) in grid.occupied() {
            let height = centre.y - camera.y;
            if height >= 0.0 || centre.horizontal_distance(camera) > self.radius {
                continue;
            }
            weighted_height += height as f64 * count as f64;
            samples += count as u64;
        }

        if samples < self.min_samples as u64 || samples == 0 {
            return None;
        }
        let mean = (weighted_height / samples as f64) as f32;
        self.ground = self.default_ground.min(mean + self.padding);
        trace!(ground = self.ground, samples, "ground estimate updated");
        Some(self.ground)
    }

    pub fn reset(&mut self) {
        self.ground = self.default_ground;
    }
}
