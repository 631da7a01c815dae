//! Forward safety-box scan over the voxel map.

use wayfind_types::{Direction, NO_OBSTACLE_DISTANCE};

use crate::geometry::HorizontalFrame;
use crate::voxel_grid::VoxelGrid;

/// Open height interval `(lower, upper)` relative to the camera in which a
/// voxel can obstruct the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalBand {
    pub lower: f32,
    pub upper: f32,
}

impl VerticalBand {
    /// Band from the floor estimate up to the user's height.
    pub fn above_ground(ground: f32, person_height: f32) -> Self {
        Self {
            lower: ground,
            upper: ground + person_height,
        }
    }

    pub fn contains(&self, height: f32) -> bool {
        height > self.lower && height < self.upper
    }
}

/// Result of one safety-box scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Distance to the nearest accepted voxel, [`NO_OBSTACLE_DISTANCE`] if none.
    pub closest_m: f32,
    pub blocking_count: usize,
    pub direction: Direction,
}

impl Detection {
    /// True when the free-direction search has to run for this frame.
    pub fn triggers_search(&self) -> bool {
        self.direction.is_blocked()
    }
}

/// Scans the voxel map for points in the box straight ahead of the user.
///
/// A voxel is accepted when its count is at least 1, its height lies in
/// the [`VerticalBand`], it is between 0 and `distance` metres ahead and
/// within `person_radius` metres to either side.
#[derive(Debug, Clone)]
pub struct ObstacleDetector {
    distance: f32,
    person_radius: f32,
    threshold: usize,
}

impl ObstacleDetector {
    pub fn new(distance: f32, person_radius: f32, threshold: usize) -> Self {
        Self {
            distance,
            person_radius,
            threshold,
        }
    }

    pub fn set_person_radius(&mut self, person_radius: f32) {
        self.person_radius = person_radius;
    }

    pub fn detect(&self, grid: &VoxelGrid, frame: &HorizontalFrame, band: VerticalBand) -> Detection {
        let mut min_sq = f32::INFINITY;
        let mut blocking_count = 0usize;

        for (centre, _) in grid.occupied() {
            let offset = frame.project(centre);
            if !band.contains(offset.height) {
                continue;
            }
            let ahead = offset.forward > 0.0 && offset.forward < self.distance;
            let beside = offset.lateral > -self.person_radius && offset.lateral < self.person_radius;
            if !(ahead && beside) {
                continue;
            }
            min_sq = min_sq.min(offset.forward * offset.forward + offset.lateral * offset.lateral);
            blocking_count += 1;
        }

        let closest_m = if blocking_count == 0 {
            NO_OBSTACLE_DISTANCE
        } else {
            min_sq.sqrt()
        };
        // The engine only distinguishes "blocked" from "clear"; the left/right
        // choice is refined by the heading search.
        let direction = if blocking_count >= self.threshold {
            Direction::Left
        } else {
            Direction::Clear
        };
        Detection {
            closest_m,
            blocking_count,
            direction,
        }
    }
}
