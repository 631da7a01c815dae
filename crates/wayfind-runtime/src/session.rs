//! [`Session`] – the frame loop that drives the obstacle engine.
//!
//! One tick:
//!
//! 1. **Capture** – pull a complete frame from the [`DepthSensor`].  A
//!    sensor fault skips the tick and raises a `SensorFault` alert.
//! 2. **Process** – run the [`ObstacleEngine`] over the frame.
//! 3. **Publish** – the report goes to [`Topic::Guidance`], direction
//!    changes to [`Topic::Navigation`], skipped frames and budget overruns
//!    to [`Topic::SystemAlerts`].
//!
//! The engine state lives exactly as long as the session: [`Session::finish`]
//! (called at the end of [`Session::run`]) resets it.
//!
//! [`Topic::Guidance`]: wayfind_middleware::Topic::Guidance
//! [`Topic::Navigation`]: wayfind_middleware::Topic::Navigation
//! [`Topic::SystemAlerts`]: wayfind_middleware::Topic::SystemAlerts

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wayfind_hal::sensor::DepthSensor;
use wayfind_middleware::EventBus;
use wayfind_perception::engine::ObstacleEngine;
use wayfind_types::{Direction, Event, EventPayload, FrameReport, SenseError, Tunables};

use crate::budget::FrameBudget;

const SOURCE: &str = "wayfind-runtime::session";

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    /// Frames handed to the engine (including skipped ones).
    pub frames: u64,
    /// Frames the engine rejected because of a degenerate pose.
    pub skipped: u64,
    pub sensor_faults: u64,
    /// Frames that reported an obstacle ahead.
    pub blocked_frames: u64,
    pub direction_changes: u64,
    pub budget_overruns: u64,
    pub worst_frame_ms: f64,
    pub mean_frame_ms: f64,
}

/// Owns a sensor and an engine and runs them at a fixed rate.
pub struct Session<S: DepthSensor> {
    sensor: S,
    engine: ObstacleEngine,
    bus: EventBus,
    budget: FrameBudget,
    stats: SessionStats,
    direction: Direction,
}

impl<S: DepthSensor> Session<S> {
    /// # Errors
    ///
    /// Returns [`SenseError::InvalidTunable`] if the engine rejects `tunables`.
    pub fn new(sensor: S, tunables: Tunables, bus: EventBus, budget: FrameBudget) -> Result<Self, SenseError> {
        Ok(Self {
            sensor,
            engine: ObstacleEngine::new(tunables)?,
            bus,
            budget,
            stats: SessionStats::default(),
            direction: Direction::Clear,
        })
    }

    pub fn engine(&self) -> &ObstacleEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ObstacleEngine {
        &mut self.engine
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// A handle to the bus this session publishes on.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn budget(&self) -> &FrameBudget {
        &self.budget
    }

    /// Capture and process one frame.
    ///
    /// Returns `None` when the sensor could not deliver a frame.
    pub fn tick(&mut self) -> Option<FrameReport> {
        let started = Instant::now();
        let frame = match self.sensor.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(sensor = self.sensor.id(), error = %e, "capture failed; frame skipped");
                self.stats.sensor_faults += 1;
                self.emit(EventPayload::SensorFault {
                    sensor: self.sensor.id().to_string(),
                    message: e.to_string(),
                });
                return None;
            }
        };

        let report = self.engine.process(&frame.depth, &frame.intrinsics, &frame.pose);
        let elapsed = started.elapsed();
        self.stats.frames += 1;

        if report.skipped {
            self.stats.skipped += 1;
            self.emit(EventPayload::FrameSkipped {
                frame: report.frame,
                reason: "degenerate camera pose".to_string(),
            });
        } else if report.direction.is_blocked() {
            self.stats.blocked_frames += 1;
        }

        self.emit(EventPayload::Guidance(report));

        if report.direction != self.direction {
            debug!(from = %self.direction, to = %report.direction, "direction changed");
            self.emit(EventPayload::DirectionChanged {
                from: self.direction,
                to: report.direction,
            });
            self.direction = report.direction;
            self.stats.direction_changes += 1;
        }

        if self.budget.record(elapsed) {
            debug!(frame = report.frame, elapsed_ms = as_ms(elapsed), "frame over budget");
            self.emit(EventPayload::BudgetOverrun {
                frame: report.frame,
                elapsed_ms: as_ms(elapsed),
                budget_ms: as_ms(self.budget.budget()),
            });
        }
        Some(report)
    }

    /// Tick every `period` until `max_frames` ticks have run (if given) or
    /// `shutdown` is raised, then [`finish`](Self::finish) the session.
    pub async fn run(&mut self, max_frames: Option<u64>, period: Duration, shutdown: Arc<AtomicBool>) -> SessionStats {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(sensor = self.sensor.id(), period_ms = as_ms(period), ?max_frames, "session started");

        let mut ticks = 0u64;
        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested");
                break;
            }
            if max_frames.is_some_and(|max| ticks >= max) {
                break;
            }
            interval.tick().await;
            self.tick();
            ticks += 1;
        }
        self.finish()
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            budget_overruns: self.budget.overruns(),
            worst_frame_ms: as_ms(self.budget.worst()),
            mean_frame_ms: as_ms(self.budget.mean()),
            ..self.stats.clone()
        }
    }

    /// End the session: return the final counters and drop all engine state.
    pub fn finish(&mut self) -> SessionStats {
        let stats = self.stats();
        info!(
            frames = stats.frames,
            skipped = stats.skipped,
            sensor_faults = stats.sensor_faults,
            overruns = stats.budget_overruns,
            mean_frame_ms = stats.mean_frame_ms,
            "session finished"
        );
        self.engine.reset();
        self.budget.reset();
        self.stats = SessionStats::default();
        self.direction = Direction::Clear;
        stats
    }

    fn emit(&self, payload: EventPayload) {
        // No subscriber on a topic is normal; nothing to do.
        let _ = self.bus.publish(Event::new(SOURCE, payload));
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfind_hal::scene::Scene;
    use wayfind_hal::sensor::SensorFrame;
    use wayfind_hal::sim::SimDepthSensor;
    use wayfind_middleware::Topic;

    struct BrokenSensor;

    impl DepthSensor for BrokenSensor {
        fn id(&self) -> &str {
            "broken_depth"
        }

        fn capture(&mut self) -> Result<SensorFrame, SenseError> {
            Err(SenseError::SensorFault {
                sensor: "broken_depth".to_string(),
                details: "no frame".to_string(),
            })
        }
    }

    fn session(sensor: SimDepthSensor) -> Session<SimDepthSensor> {
        Session::new(sensor, Tunables::default(), EventBus::default(), FrameBudget::default()).unwrap()
    }

    #[test]
    fn invalid_tunables_fail_construction() {
        let tunables = Tunables {
            sample_stride: 0,
            ..Tunables::default()
        };
        let result = Session::new(
            SimDepthSensor::new(Scene::open()),
            tunables,
            EventBus::default(),
            FrameBudget::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn pillar_ahead_blocks_and_notifies_navigation() {
        let mut s = session(SimDepthSensor::new(Scene::pillar()));
        let mut nav = s.bus().subscribe_to(Topic::Navigation);

        let report = s.tick().expect("sim sensor always captures");
        assert_eq!(report.direction, Direction::Left);
        assert!(report.closest_m < 2.5);

        let event = nav.try_next().expect("direction change published");
        assert!(matches!(
            event.payload,
            EventPayload::DirectionChanged {
                from: Direction::Clear,
                to: Direction::Left
            }
        ));
        assert_eq!(s.stats().direction_changes, 1);
        assert_eq!(s.stats().blocked_frames, 1);
    }

    #[test]
    fn open_floor_stays_clear() {
        let mut s = session(SimDepthSensor::new(Scene::open()));
        for _ in 0..3 {
            let report = s.tick().unwrap();
            assert_eq!(report.direction, Direction::Clear);
            assert_eq!(report.heading_deg, 0.0);
        }
        assert_eq!(s.stats().direction_changes, 0);
    }

    #[test]
    fn degenerate_frames_raise_alerts() {
        let mut s = session(SimDepthSensor::new(Scene::open()).with_degenerate_every(2));
        let mut alerts = s.bus().subscribe_to(Topic::SystemAlerts);
        s.tick();
        let skipped = s.tick().unwrap();
        assert!(skipped.skipped);
        assert_eq!(s.stats().skipped, 1);
        let event = alerts.try_next().expect("skip alert published");
        assert!(matches!(event.payload, EventPayload::FrameSkipped { frame: 2, .. }));
    }

    #[test]
    fn sensor_fault_skips_tick() {
        let mut s = Session::new(BrokenSensor, Tunables::default(), EventBus::default(), FrameBudget::default())
            .unwrap();
        let mut alerts = s.bus().subscribe_to(Topic::SystemAlerts);
        assert!(s.tick().is_none());
        assert_eq!(s.stats().sensor_faults, 1);
        assert_eq!(s.stats().frames, 0);
        let event = alerts.try_next().expect("fault alert published");
        assert!(matches!(event.payload, EventPayload::SensorFault { ref sensor, .. } if sensor == "broken_depth"));
    }

    #[test]
    fn zero_budget_counts_every_frame_as_overrun() {
        let mut s = Session::new(
            SimDepthSensor::new(Scene::open()),
            Tunables::default(),
            EventBus::default(),
            FrameBudget::new(Duration::ZERO),
        )
        .unwrap();
        s.tick();
        s.tick();
        assert_eq!(s.stats().budget_overruns, 2);
    }

    #[tokio::test]
    async fn run_walks_the_corridor_and_resets() {
        let sensor = SimDepthSensor::new(Scene::corridor()).with_walk_speed(0.1);
        let mut s = session(sensor);
        let mut guidance = s.bus().subscribe_to(Topic::Guidance);

        let stats = s
            .run(Some(8), Duration::from_millis(1), Arc::new(AtomicBool::new(false)))
            .await;
        assert_eq!(stats.frames, 8);
        assert!(stats.mean_frame_ms > 0.0);

        let mut reports = 0;
        while let Some(event) = guidance.try_next() {
            assert!(matches!(event.payload, EventPayload::Guidance(_)));
            reports += 1;
        }
        assert_eq!(reports, 8);

        // Session end drops the map.
        assert!(s.engine().voxels().is_empty());
        assert_eq!(s.engine().frames(), 0);
    }

    #[tokio::test]
    async fn raised_shutdown_flag_stops_before_first_frame() {
        let mut s = session(SimDepthSensor::new(Scene::open()));
        let stats = s
            .run(None, Duration::from_millis(1), Arc::new(AtomicBool::new(true)))
            .await;
        assert_eq!(stats.frames, 0);
    }

    #[tokio::test]
    async fn shutdown_from_another_task() {
        let mut s = session(SimDepthSensor::new(Scene::open()).with_resolution(16, 12));
        let flag = Arc::new(AtomicBool::new(false));
        let remote = Arc::clone(&flag);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.store(true, Ordering::SeqCst);
        });
        let stats = s.run(None, Duration::from_millis(2), flag).await;
        assert!(stats.frames > 0);
    }

    #[test]
    fn stats_serialize_for_reports() {
        let json = serde_json::to_string(&SessionStats::default()).unwrap();
        assert!(json.contains("\"budget_overruns\":0"));
    }
}
