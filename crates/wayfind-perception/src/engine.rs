//! The obstacle engine: one context object holding all per-session state.
//!
//! A tick runs strictly in order: accumulate → cull → ground → detect →
//! search.  The caller owns the engine and hands it each frame; nothing is
//! shared between ticks except through the engine itself.

use tracing::{debug, instrument};
use wayfind_types::{FrameReport, SenseError, Tunables};

use crate::accumulator::PointAccumulator;
use crate::detector::{ObstacleDetector, VerticalBand};
use crate::frame::{CameraIntrinsics, CameraPose, DepthFrame};
use crate::frustum::{Frustum, FrustumCuller};
use crate::geometry::HorizontalFrame;
use crate::ground::GroundEstimator;
use crate::search::{FreeDirectionSearch, SearchOutcome};
use crate::voxel_grid::VoxelGrid;

/// Owns the voxel map, ground estimate and search scratch space for one
/// walking session.
#[derive(Debug)]
pub struct ObstacleEngine {
    tunables: Tunables,
    voxels: VoxelGrid,
    accumulator: PointAccumulator,
    culler: FrustumCuller,
    ground: GroundEstimator,
    detector: ObstacleDetector,
    search: FreeDirectionSearch,
    last_report: FrameReport,
    last_search: Option<SearchOutcome>,
    frames: u64,
}

impl ObstacleEngine {
    /// # Errors
    ///
    /// Returns [`SenseError::InvalidTunable`] if `tunables` fails validation.
    pub fn new(tunables: Tunables) -> Result<Self, SenseError> {
        tunables.validate()?;
        Ok(Self {
            voxels: VoxelGrid::new(tunables.node_size),
            accumulator: PointAccumulator::new(tunables.min_confidence, tunables.sample_stride),
            culler: FrustumCuller::new(tunables.search_radius + 1.0),
            ground: GroundEstimator::new(
                tunables.default_ground,
                tunables.ground_padding,
                tunables.ground_radius,
                tunables.min_ground_samples,
            ),
            detector: ObstacleDetector::new(
                tunables.distance_to_obstacle,
                tunables.person_radius,
                tunables.blocking_threshold,
            ),
            search: FreeDirectionSearch::new(
                tunables.search_width(),
                tunables.node_size,
                tunables.person_radius_cells(),
            ),
            last_report: FrameReport::initial(tunables.default_ground),
            last_search: None,
            frames: 0,
            tunables,
        })
    }

    /// Run one full tick for a new depth frame.
    ///
    /// A degenerate pose skips the whole tick: the map is left untouched and
    /// the previous report is repeated with `skipped` set.
    #[instrument(skip_all, fields(frame = self.frames + 1, voxels = self.voxels.len()))]
    pub fn process(
        &mut self,
        frame: &DepthFrame,
        intrinsics: &CameraIntrinsics,
        pose: &CameraPose,
    ) -> FrameReport {
        self.frames += 1;
        if pose.is_degenerate() {
            debug!("degenerate camera pose; frame skipped");
            self.last_report = FrameReport {
                frame: self.frames,
                skipped: true,
                ..self.last_report
            };
            return self.last_report;
        }

        let accumulated = self.accumulator.accumulate(&mut self.voxels, frame, intrinsics, pose);
        let frustum = Frustum::from_camera(intrinsics, pose);
        let culled = self.culler.cull(&mut self.voxels, frustum.as_ref(), pose.position);
        self.ground.update(&self.voxels, pose.position);
        let report = self.evaluate(pose);

        debug!(
            inserted = accumulated.inserted,
            rejected = accumulated.rejected,
            removed = culled.removed,
            zeroed = culled.zeroed,
            voxels = self.voxels.len(),
            direction = %report.direction,
            closest_m = report.closest_m,
            heading_deg = report.heading_deg,
            "tick complete"
        );

        // A radius change made during this tick takes effect from the next one.
        self.search.refresh_offsets(self.tunables.person_radius_cells());
        report
    }

    /// Detect and, if blocked, search against the current map without
    /// ingesting new samples.
    pub fn evaluate(&mut self, pose: &CameraPose) -> FrameReport {
        let ground_m = self.ground.ground();
        let band = VerticalBand::above_ground(ground_m, self.tunables.person_height);
        let walking = HorizontalFrame::new(pose.position, pose.yaw_deg);

        let detection = self.detector.detect(&self.voxels, &walking, band);
        self.last_search = if detection.triggers_search() {
            Some(self.search.run(&self.voxels, &walking, band))
        } else {
            None
        };

        self.last_report = FrameReport {
            frame: self.frames,
            direction: detection.direction,
            closest_m: detection.closest_m,
            heading_deg: self.last_search.map_or(0.0, |s| s.heading_deg),
            ground_m,
            blocking_count: detection.blocking_count,
            skipped: false,
        };
        self.last_report
    }

    /// Change the body radius used by the detector and the inflation disk.
    ///
    /// The disk is rebuilt at the end of the next tick; until then searches
    /// run without inflation.
    ///
    /// # Errors
    ///
    /// Returns [`SenseError::InvalidTunable`] for a negative or non-finite
    /// radius.
    pub fn set_person_radius(&mut self, person_radius: f32) -> Result<(), SenseError> {
        if !person_radius.is_finite() || person_radius < 0.0 {
            return Err(SenseError::InvalidTunable {
                name: "person_radius".to_string(),
                reason: format!("must be a non-negative finite number, got {person_radius}"),
            });
        }
        self.tunables.person_radius = person_radius;
        self.detector.set_person_radius(person_radius);
        self.search.invalidate_offsets();
        Ok(())
    }

    /// Drop all session state.  Called when the walking session ends.
    pub fn reset(&mut self) {
        self.voxels.clear();
        self.ground.reset();
        self.last_report = FrameReport::initial(self.tunables.default_ground);
        self.last_search = None;
        self.frames = 0;
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn voxels(&self) -> &VoxelGrid {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut VoxelGrid {
        &mut self.voxels
    }

    pub fn ground(&self) -> f32 {
        self.ground.ground()
    }

    pub fn last_report(&self) -> FrameReport {
        self.last_report
    }

    /// Diagnostics of the most recent search, if the last frame ran one.
    pub fn last_search(&self) -> Option<SearchOutcome> {
        self.last_search
    }

    /// Ticks processed since construction or the last [`reset`](Self::reset).
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Quaternion, Transform3D, Vec3};
    use wayfind_types::{Direction, NO_OBSTACLE_DISTANCE};

    const CAMERA: Vec3 = Vec3 {
        x: 0.0,
        y: 1.5,
        z: 0.0,
    };

    fn engine() -> ObstacleEngine {
        ObstacleEngine::new(Tunables::default()).unwrap()
    }

    fn pose() -> CameraPose {
        CameraPose::new(Transform3D::new(CAMERA, Quaternion::from_yaw_deg(0.0)), 0.0)
    }

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(32.0, 32.0, 32.0, 24.0, 64, 48)
    }

    fn uniform_frame(depth: f32) -> DepthFrame {
        DepthFrame::new(64, 48, vec![depth; 64 * 48], vec![2; 64 * 48], 2)
    }

    #[test]
    fn invalid_tunables_are_rejected() {
        let tunables = Tunables {
            node_size: -1.0,
            ..Tunables::default()
        };
        assert!(ObstacleEngine::new(tunables).is_err());
    }

    #[test]
    fn empty_world_is_clear() {
        let mut e = engine();
        let report = e.process(&uniform_frame(0.0), &intrinsics(), &pose());
        assert_eq!(report.direction, Direction::Clear);
        assert_eq!(report.closest_m, NO_OBSTACLE_DISTANCE);
        assert_eq!(report.heading_deg, 0.0);
        assert_eq!(report.ground_m, -0.5);
        assert_eq!(report.frame, 1);
        assert!(e.last_search().is_none());
    }

    #[test]
    fn single_point_stays_clear_two_points_search() {
        let mut e = engine();
        e.voxels_mut().insert(Vec3::new(0.0, 1.5, 1.5));
        let one = e.evaluate(&pose());
        assert_eq!(one.blocking_count, 1);
        assert_eq!(one.direction, Direction::Clear);
        assert!(e.last_search().is_none());

        e.voxels_mut().insert(Vec3::new(0.1, 1.4, 2.0));
        let two = e.evaluate(&pose());
        assert_eq!(two.blocking_count, 2);
        assert_eq!(two.direction, Direction::Left);
        assert!(e.last_search().is_some());
    }

    #[test]
    fn cluster_ahead_recommends_a_turn() {
        let mut e = engine();
        for lateral in [-0.2f32, -0.1, 0.0, 0.1, 0.2] {
            e.voxels_mut().insert(Vec3::new(lateral, 1.5, 1.0));
        }
        let report = e.evaluate(&pose());
        assert!(report.blocking_count >= 2);
        assert_eq!(report.direction, Direction::Left);
        assert!((report.closest_m - 1.0).abs() < 0.05, "closest {}", report.closest_m);
        assert!(report.heading_deg.abs() > 1.0, "heading {}", report.heading_deg);
        assert!(e.last_search().is_some_and(|s| s.validated()));
    }

    #[test]
    fn wall_in_view_is_detected_end_to_end() {
        let mut e = engine();
        let report = e.process(&uniform_frame(1.5), &intrinsics(), &pose());
        assert_eq!(report.direction, Direction::Left);
        assert!((report.closest_m - 1.5).abs() < 0.1, "closest {}", report.closest_m);
        assert!(report.heading_deg.abs() > 1.0, "heading {}", report.heading_deg);
        assert!(!e.voxels().is_empty());
    }

    #[test]
    fn degenerate_pose_skips_frame_and_keeps_map() {
        let mut e = engine();
        e.process(&uniform_frame(1.5), &intrinsics(), &pose());
        let voxels_before = e.voxels().len();
        let before = e.last_report();

        let degenerate = CameraPose::new(Transform3D::identity(), 0.0);
        let report = e.process(&uniform_frame(0.5), &intrinsics(), &degenerate);
        assert!(report.skipped);
        assert_eq!(report.frame, 2);
        assert_eq!(report.direction, before.direction);
        assert_eq!(report.closest_m, before.closest_m);
        assert_eq!(e.voxels().len(), voxels_before);
    }

    #[test]
    fn radius_change_skips_inflation_for_one_tick() {
        let mut e = engine();
        for lateral in [-0.1f32, 0.0, 0.1] {
            e.voxels_mut().insert(Vec3::new(lateral, 1.5, 1.0));
        }
        e.set_person_radius(0.4).unwrap();
        assert_eq!(e.tunables().person_radius, 0.4);

        let frame = uniform_frame(0.0);
        e.process(&frame, &intrinsics(), &pose());
        assert!(e.last_search().is_some_and(|s| !s.inflated));

        e.process(&frame, &intrinsics(), &pose());
        assert!(e.last_search().is_some_and(|s| s.inflated));
    }

    #[test]
    fn negative_radius_is_rejected() {
        let mut e = engine();
        assert!(e.set_person_radius(-0.1).is_err());
        assert!(e.set_person_radius(f32::NAN).is_err());
        assert_eq!(e.tunables().person_radius, 0.3);
    }

    #[test]
    fn culling_bounds_the_map() {
        let mut e = engine();
        e.voxels_mut().insert(Vec3::new(0.0, 1.5, 20.0));
        e.voxels_mut().insert(Vec3::new(-9.0, 0.0, 0.0));
        e.process(&uniform_frame(0.0), &intrinsics(), &pose());
        for (key, _) in e.voxels().iter() {
            let centre = e.voxels().centre_of(key);
            assert!(centre.horizontal_distance(CAMERA) <= 7.0);
        }
        assert!(e.voxels().is_empty());
    }

    #[test]
    fn ground_follows_floor_evidence() {
        let mut e = engine();
        for _ in 0..6 {
            e.voxels_mut().insert(Vec3::new(0.1, 1.5 - 0.55, 0.1));
        }
        let report = e.process(&uniform_frame(0.0), &intrinsics(), &pose());
        assert_eq!(report.ground_m, -0.5);

        for _ in 0..20 {
            e.voxels_mut().insert(Vec3::new(0.0, 0.0, 0.0));
        }
        let report = e.process(&uniform_frame(0.0), &intrinsics(), &pose());
        assert!(report.ground_m < -0.5);
    }

    #[test]
    fn reset_clears_session_state() {
        let mut e = engine();
        e.process(&uniform_frame(1.5), &intrinsics(), &pose());
        e.reset();
        assert!(e.voxels().is_empty());
        assert_eq!(e.frames(), 0);
        assert_eq!(e.ground(), -0.5);
        assert_eq!(e.last_report(), FrameReport::initial(-0.5));
    }
}
