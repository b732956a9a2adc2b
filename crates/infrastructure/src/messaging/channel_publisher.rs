use async_trait::async_trait;
use domain::DomainEvent;
use domain::event::{EventPublisher, PublishError};
use tokio::sync::broadcast;

/// Hands events to in-process subscribers (host UI, tests)
#[derive(Clone)]
pub struct ChannelEventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl ChannelEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
        Ok(())
    }
}
