//! Post-commit event delivery.
//!
//! Workflow events are published only after the change that produced them has
//! been committed; observers never see an event for a rolled-back change.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};
