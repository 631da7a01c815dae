//! `wayfind-runtime` – the frame loop around the obstacle engine.
//!
//! # Modules
//!
//! - [`session`] – [`Session`][session::Session]: pulls frames from a
//!   [`DepthSensor`][wayfind_hal::sensor::DepthSensor], runs the
//!   [`ObstacleEngine`][wayfind_perception::engine::ObstacleEngine] and
//!   publishes reports and alerts on the
//!   [`EventBus`][wayfind_middleware::EventBus].  Engine state is dropped
//!   when the session finishes.
//! - [`budget`] – [`FrameBudget`][budget::FrameBudget]: counts frames that
//!   ran past their time budget without interrupting them.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod budget;
pub mod session;
pub mod telemetry;

pub use budget::FrameBudget;
pub use session::{Session, SessionStats};
pub use telemetry::{TracerProviderGuard, init_tracing};
