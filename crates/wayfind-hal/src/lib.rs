//! `wayfind-hal` – depth-sensor abstraction.
//!
//! The obstacle engine never talks to a camera directly.  Drivers implement
//! [`DepthSensor`][sensor::DepthSensor] and hand over complete frames: depth,
//! confidence, intrinsics and the tracked camera pose.
//!
//! # Modules
//!
//! - [`sensor`] – the [`DepthSensor`][sensor::DepthSensor] trait and
//!   [`SensorFrame`][sensor::SensorFrame].
//! - [`scene`] – box-and-floor worlds with ray casting.
//! - [`sim`] – [`SimDepthSensor`][sim::SimDepthSensor]: renders a scene for
//!   headless runs and tests.

pub mod scene;
pub mod sensor;
pub mod sim;
