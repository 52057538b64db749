//! Publishes domain events to NATS when a connection is configured.

use crate::domain::events::DomainEvent;

#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
    prefix: String,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>, prefix: impl Into<String>) -> Self {
        Self { nats, prefix: prefix.into() }
    }

    /// A publisher that only logs.
    pub fn disabled() -> Self { Self::default() }

    pub fn subject(&self, event: &DomainEvent) -> String {
        if self.prefix.is_empty() { event.subject().to_string() } else { format!("{}.{}", self.prefix, event.subject()) }
    }

    /// Delivery is best effort; failures are logged and never fail the
    /// operation that raised the events.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = self.subject(&event);
            tracing::debug!(%subject, ?event, "domain event");
            let Some(nats) = &self.nats else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::warn!(%subject, error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = nats.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}
