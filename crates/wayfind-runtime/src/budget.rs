//! [`FrameBudget`] – soft real-time monitor for the frame loop.
//!
//! Every tick reports how long it took.  A tick that exceeds the budget is
//! counted as an overrun but is never interrupted: the search always runs to
//! completion inside its frame.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wayfind_runtime::budget::FrameBudget;
//!
//! let mut budget = FrameBudget::from_millis(33);
//! assert!(!budget.record(Duration::from_millis(12)));
//! assert!(budget.record(Duration::from_millis(40)));
//! assert_eq!(budget.overruns(), 1);
//! assert_eq!(budget.worst(), Duration::from_millis(40));
//! ```

use std::time::Duration;

/// Default budget: one frame at ~30 fps.
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(33);

/// Tracks frame durations against a fixed budget.
#[derive(Debug, Clone)]
pub struct FrameBudget {
    budget: Duration,
    frames: u64,
    overruns: u64,
    worst: Duration,
    total: Duration,
}

impl FrameBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            frames: 0,
            overruns: 0,
            worst: Duration::ZERO,
            total: Duration::ZERO,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Record one frame; returns `true` when it overran the budget.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.frames += 1;
        self.total += elapsed;
        self.worst = self.worst.max(elapsed);
        let overrun = elapsed > self.budget;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn worst(&self) -> Duration {
        self.worst
    }

    /// Mean frame time, zero before the first frame.
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.frames) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.frames as f64),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.budget);
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BUDGET)
    }
}
