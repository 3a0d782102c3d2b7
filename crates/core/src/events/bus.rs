use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::DocumentEvent;

/// In-process event bus backed by `tokio::broadcast`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DocumentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(
        &self,
        event: DocumentEvent,
    ) -> Result<usize, broadcast::error::SendError<DocumentEvent>> {
        self.sender.send(event)
    }

    /// Publish without caring whether anyone listens. Notification is
    /// fire-and-forget: a missing subscriber never fails the caller.
    pub fn notify(&self, event: DocumentEvent) {
        let document_id = event.document_id();
        if let Err(e) = self.publish(event) {
            tracing::debug!(%document_id, error = %e, "no subscriber for document event");
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
