//! `wayfind-perception` – the obstacle-avoidance spatial engine.
//!
//! Turns a stream of depth samples and camera poses into a persistent voxel
//! map, an "obstacle ahead" signal and a recommended walking heading.
//!
//! # Modules
//!
//! - [`geometry`] – [`Vec3`][geometry::Vec3], [`Quaternion`][geometry::Quaternion],
//!   [`Transform3D`][geometry::Transform3D] and the user's walking frame.
//! - [`frame`] – depth frames, camera intrinsics and camera poses as handed
//!   over by the tracker.
//! - [`voxel_grid`] – [`VoxelGrid`][voxel_grid::VoxelGrid]: sparse map of
//!   observation counts keyed by integer voxel coordinates.
//! - [`accumulator`] – back-projects depth samples into the voxel map.
//! - [`frustum`] – decays and prunes voxels that left the camera's view.
//! - [`ground`] – running floor-height estimate.
//! - [`detector`] – forward safety-box scan.
//! - [`search`] – inflated occupancy grid, forward-biased search with
//!   backtracking and straight-line validation.
//! - [`engine`] – [`ObstacleEngine`][engine::ObstacleEngine]: runs the stages
//!   above once per frame.
//!
//! # Example
//!
//! ```rust
//! use wayfind_perception::engine::ObstacleEngine;
//! use wayfind_perception::geometry::{Quaternion, Transform3D, Vec3};
//! use wayfind_perception::frame::CameraPose;
//! use wayfind_types::{Direction, Tunables};
//!
//! let mut engine = ObstacleEngine::new(Tunables::default()).unwrap();
//! engine.voxels_mut().insert(Vec3::new(0.0, 1.5, 1.2));
//! engine.voxels_mut().insert(Vec3::new(0.1, 1.3, 1.6));
//!
//! let pose = CameraPose::new(
//!     Transform3D::new(Vec3::new(0.0, 1.5, 0.0), Quaternion::identity()),
//!     0.0,
//! );
//! let report = engine.evaluate(&pose);
//! assert_eq!(report.direction, Direction::Left);
//! assert!((report.closest_m - 1.2).abs() < 1e-3);
//! ```

pub mod accumulator;
pub mod detector;
pub mod engine;
pub mod frame;
pub mod frustum;
pub mod geometry;
pub mod ground;
pub mod search;
pub mod voxel_grid;
