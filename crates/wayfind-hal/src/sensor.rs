//! Generic `DepthSensor` trait and the frame bundle it produces.

use wayfind_perception::frame::{CameraIntrinsics, CameraPose, DepthFrame};
use wayfind_types::SenseError;

/// Everything the obstacle engine needs for one tick, sampled together.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub depth: DepthFrame,
    /// Intrinsics already scaled to the depth resolution.
    pub intrinsics: CameraIntrinsics,
    pub pose: CameraPose,
}

/// A depth camera paired with a pose tracker.
///
/// Drivers hand out complete frames; the runtime never sees partial data.
pub trait DepthSensor: Send {
    /// Stable identifier for this sensor, e.g. `"lidar_depth"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`SenseError::SensorFault`] if no frame can be produced
    /// (e.g. the session was interrupted or the buffer is unavailable).
    fn capture(&mut self) -> Result<SensorFrame, SenseError>;
}
