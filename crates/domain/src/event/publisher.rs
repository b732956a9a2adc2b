use async_trait::async_trait;

use crate::DomainEvent;

/// Failure reported by a notification sink
pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound sink for dome notifications
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;

    /// Publish in order; every event is attempted and the first failure is
    /// returned
    async fn publish_batch(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        let mut first_error = None;
        for event in events {
            if let Err(e) = self.publish(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
