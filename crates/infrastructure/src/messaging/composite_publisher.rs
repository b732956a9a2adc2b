use std::sync::Arc;

use async_trait::async_trait;
use domain::DomainEvent;
use domain::event::{EventPublisher, PublishError};

/// Fans notifications out to every sink; a failing sink is logged and
/// skipped
pub struct CompositeEventPublisher {
    sinks: Vec<Arc<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    pub fn new(sinks: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventPublisher for CompositeEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.publish_batch(vec![event]).await
    }

    async fn publish_batch(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        for (index, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.publish_batch(events.clone()).await {
                tracing::error!(sink = index, events = events.len(), error = %e, "Sink rejected notifications");
            }
        }
        Ok(())
    }
}
