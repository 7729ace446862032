//! # Event Publisher
//!
//! Thin wrapper over a `tokio::sync::broadcast` channel. Publishing with no
//! subscribers is not an error.
//!
//! ```rust
//! use lims_workflow::events::EventPublisher;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut receiver = publisher.subscribe();
//!
//! publisher.publish("workflow.note", json!({"workflow_id": 1}));
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.name, "workflow.note");
//! # });
//! ```

use serde_json::Value;
use tokio::sync::broadcast;

use crate::state_machine::WorkflowEvent;

/// Broadcast publisher for workflow lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    /// Publish a committed workflow event under its canonical name
    pub fn publish_workflow_event(&self, event: &WorkflowEvent) -> Result<(), PublishError> {
        let context = serde_json::to_value(event)?;
        tracing::debug!(
            event = event.event_name(),
            workflow_id = event.workflow_id(),
            "Publishing workflow event"
        );
        self.publish(event.event_name(), context);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
