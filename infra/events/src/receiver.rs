use std::future::Future;
use std::sync::Arc;
use tally_domain::event::{DomainEvent, Topic};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Ergonomic receiving on a delivery tap.
pub trait EventReceiverExt {
    /// Next delivered event, skipping over lag. `None` once the bus is shut down.
    fn next_event(&mut self) -> impl Future<Output = Option<Arc<DomainEvent>>> + Send;

    /// Next delivered event on `topic`.
    fn next_on(&mut self, topic: &Topic) -> impl Future<Output = Option<Arc<DomainEvent>>> + Send;
}

impl EventReceiverExt for broadcast::Receiver<Arc<DomainEvent>> {
    async fn next_event(&mut self) -> Option<Arc<DomainEvent>> {
        let mut skipped = 0u64;

        loop {
            match self.recv().await {
                Ok(event) => {
                    if skipped > 0 {
                        warn!(skipped, "Event tap lagged; continuing from the oldest retained event");
                    }
                    return Some(event);
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    skipped = skipped.saturating_add(n);
                    debug!(skipped = n, total_skipped = skipped, "Event tap lagged");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn next_on(&mut self, topic: &Topic) -> Option<Arc<DomainEvent>> {
        loop {
            let event = self.next_event().await?;
            if event.topic() == topic {
                return Some(event);
            }
        }
    }
}
