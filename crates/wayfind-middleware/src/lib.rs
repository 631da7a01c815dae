//! `wayfind-middleware` – routes per-frame guidance to its consumers.
//!
//! The obstacle engine does not know who listens.  The audio cue scheduler,
//! the navigation module and any diagnostics sink subscribe to the topic
//! they care about.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
