use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Distance reported when nothing blocks the path ahead (metres).
pub const NO_OBSTACLE_DISTANCE: f32 = 999.0;

/// Widest search grid (in cells) that [`Tunables::validate`] accepts.
pub const MAX_SEARCH_WIDTH: usize = 1001;

/// Coarse "obstacle ahead" signal produced once per frame.
///
/// The engine only ever emits [`Direction::Clear`] or [`Direction::Left`];
/// `Right` is part of the shared vocabulary so that consumers can
/// disambiguate on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Nothing in the forward safety box.
    #[default]
    Clear,
    Left,
    Right,
}

impl Direction {
    /// True for every variant except [`Direction::Clear`].
    pub fn is_blocked(self) -> bool {
        self != Direction::Clear
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Clear => write!(f, "clear"),
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Per-frame output of the obstacle engine, polled by the audio cue
/// scheduler and the navigation module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Monotonic frame counter assigned by the engine.
    pub frame: u64,
    pub direction: Direction,
    /// Distance to the closest point in the safety box, or
    /// [`NO_OBSTACLE_DISTANCE`].
    pub closest_m: f32,
    /// Recommended walking heading in degrees; 0 is straight ahead and
    /// positive values turn right.
    pub heading_deg: f32,
    /// Floor height relative to the camera (metres, negative is below).
    pub ground_m: f32,
    /// Number of voxels that fell inside the safety box.
    pub blocking_count: usize,
    /// True when the frame was rejected (e.g. degenerate camera pose) and
    /// the fields repeat the previous frame's values.
    pub skipped: bool,
}

impl FrameReport {
    /// The report emitted before any frame has been processed.
    pub fn initial(ground_m: f32) -> Self {
        Self {
            frame: 0,
            direction: Direction::Clear,
            closest_m: NO_OBSTACLE_DISTANCE,
            heading_deg: 0.0,
            ground_m,
            blocking_count: 0,
            skipped: false,
        }
    }
}

/// Static tunables of the obstacle engine.
///
/// Every field has a serde default so that a partial `[engine]` table in a
/// config file fills in the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    /// Edge length of a voxel and of a search-grid cell (metres).
    #[serde(default = "default_node_size")]
    pub node_size: f32,
    /// Half-width of the local search grid (metres).
    #[serde(default = "default_search_radius")]
    pub search_radius: f32,
    /// Depth of the forward safety box (metres).
    #[serde(default = "default_distance_to_obstacle")]
    pub distance_to_obstacle: f32,
    /// Half-width of the user's body (metres).
    #[serde(default = "default_person_radius")]
    pub person_radius: f32,
    /// Height of the vertical obstacle band above the floor (metres).
    #[serde(default = "default_person_height")]
    pub person_height: f32,
    #[serde(default = "default_ground_padding")]
    pub ground_padding: f32,
    /// Horizontal radius around the camera used for floor evidence (metres).
    #[serde(default = "default_ground_radius")]
    pub ground_radius: f32,
    /// Highest floor estimate the ground estimator may produce (metres).
    #[serde(default = "default_ground")]
    pub default_ground: f32,
    /// Weighted observation count needed before the floor is updated.
    #[serde(default = "default_min_ground_samples")]
    pub min_ground_samples: u32,
    /// Minimum `confidence / confidence_max` for a depth sample.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Safety-box points needed to raise the obstacle signal.
    #[serde(default = "default_blocking_threshold")]
    pub blocking_threshold: usize,
    /// Pixel stride used when sampling the depth image.
    #[serde(default = "default_sample_stride")]
    pub sample_stride: usize,
}

fn default_node_size() -> f32 {
    0.1
}
fn default_search_radius() -> f32 {
    6.0
}
fn default_distance_to_obstacle() -> f32 {
    2.5
}
fn default_person_radius() -> f32 {
    0.3
}
fn default_person_height() -> f32 {
    1.8 - 0.35
}
fn default_ground_padding() -> f32 {
    0.35
}
fn default_ground_radius() -> f32 {
    0.25
}
fn default_ground() -> f32 {
    -0.5
}
fn default_min_ground_samples() -> u32 {
    5
}
fn default_min_confidence() -> f32 {
    0.1
}
fn default_blocking_threshold() -> usize {
    2
}
fn default_sample_stride() -> usize {
    1
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            node_size: default_node_size(),
            search_radius: default_search_radius(),
            distance_to_obstacle: default_distance_to_obstacle(),
            person_radius: default_person_radius(),
            person_height: default_person_height(),
            ground_padding: default_ground_padding(),
            ground_radius: default_ground_radius(),
            default_ground: default_ground(),
            min_ground_samples: default_min_ground_samples(),
            min_confidence: default_min_confidence(),
            blocking_threshold: default_blocking_threshold(),
            sample_stride: default_sample_stride(),
        }
    }
}

impl Tunables {
    /// Width of the square search grid: `1 + 2 * floor(search_radius / node_size)`.
    pub fn search_width(&self) -> usize {
        1 + 2 * (self.search_radius / self.node_size).floor() as usize
    }

    /// Body radius expressed in search-grid cells.
    pub fn person_radius_cells(&self) -> f32 {
        self.person_radius / self.node_size
    }

    /// Check that every tunable is usable by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SenseError::InvalidTunable`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SenseError> {
        let positive = [
            ("node_size", self.node_size),
            ("search_radius", self.search_radius),
            ("distance_to_obstacle", self.distance_to_obstacle),
            ("person_height", self.person_height),
            ("ground_radius", self.ground_radius),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SenseError::InvalidTunable {
                    name: name.to_string(),
                    reason: format!("must be a positive finite number, got {value}"),
                });
            }
        }
        let non_negative = [
            ("person_radius", self.person_radius),
            ("ground_padding", self.ground_padding),
            ("min_confidence", self.min_confidence),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SenseError::InvalidTunable {
                    name: name.to_string(),
                    reason: format!("must be a non-negative finite number, got {value}"),
                });
            }
        }
        if !self.default_ground.is_finite() {
            return Err(SenseError::InvalidTunable {
                name: "default_ground".to_string(),
                reason: "must be finite".to_string(),
            });
        }
        if self.search_radius < self.node_size {
            return Err(SenseError::InvalidTunable {
                name: "search_radius".to_string(),
                reason: "must be at least one node_size".to_string(),
            });
        }
        if (self.search_radius / self.node_size).floor() as usize > MAX_SEARCH_WIDTH / 2 {
            return Err(SenseError::InvalidTunable {
                name: "search_radius".to_string(),
                reason: format!(
                    "search grid would be {} cells wide; the limit is {MAX_SEARCH_WIDTH}",
                    self.search_width()
                ),
            });
        }
        if self.blocking_threshold == 0 {
            return Err(SenseError::InvalidTunable {
                name: "blocking_threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sample_stride == 0 {
            return Err(SenseError::InvalidTunable {
                name: "sample_stride".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Unified event wrapper for the guidance event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "wayfind-runtime::session"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// One processed frame.
    Guidance(FrameReport),
    /// The obstacle signal switched; navigation suppresses route guidance
    /// while `to` is not [`Direction::Clear`].
    DirectionChanged { from: Direction, to: Direction },
    FrameSkipped { frame: u64, reason: String },
    BudgetOverrun {
        frame: u64,
        elapsed_ms: f64,
        budget_ms: f64,
    },
    SensorFault { sensor: String, message: String },
}

/// Error type spanning configuration, sensor and routing failures.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum SenseError {
    #[error("Invalid tunable {name}: {reason}")]
    InvalidTunable { name: String, reason: String },

    #[error("Sensor Fault on {sensor}: {details}")]
    SensorFault { sensor: String, details: String },

    #[error("Event Bus Error: {0}")]
    Channel(String),
}
