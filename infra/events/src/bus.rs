use crate::error::EventBusError;
use crate::handler::EventHandler;
use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tally_domain::event::{DomainEvent, Topic};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Buffer for the delivery tap. Observers that fall further behind skip ahead.
const DEFAULT_TAP_CAPACITY: usize = 128;

/// Delivers already-committed events to subscribers.
///
/// This is the only way events leave the process; business code never calls it directly.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// Runs every handler subscribed to the event's topic.
    ///
    /// Returns the number of handlers that ran. Fails if any handler failed; handlers that
    /// succeeded will see the event again on redelivery.
    async fn publish(&self, event: &DomainEvent) -> Result<usize, EventBusError>;
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Registration {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("handler", &self.handler.name())
            .finish()
    }
}

#[derive(Debug)]
struct EventBusInner {
    handlers: RwLock<FxHashMap<Topic, Vec<Registration>>>,
    tap: RwLock<Option<broadcast::Sender<Arc<DomainEvent>>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// A thread-safe, topic-keyed event bus.
///
/// Handlers are indexed by [`Topic`]. Cloning is cheap and shares the registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(DEFAULT_TAP_CAPACITY);
        Self {
            inner: Arc::new(EventBusInner {
                handlers: RwLock::new(FxHashMap::default()),
                tap: RwLock::new(Some(tap)),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers `handler` for `topic`. Handlers of one topic run in registration order.
    pub fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%topic, handler = handler.name(), "Handler subscribed");
        self.inner.handlers.write().entry(topic).or_default().push(Registration { id, handler });
        id
    }

    /// Registers one handler for several topics.
    pub fn subscribe_all(
        &self,
        topics: impl IntoIterator<Item = Topic>,
        handler: &Arc<dyn EventHandler>,
    ) -> Vec<SubscriptionId> {
        topics.into_iter().map(|topic| self.subscribe(topic, handler.clone())).collect()
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write();
        let mut removed = false;
        for registrations in handlers.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    #[must_use]
    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.inner.handlers.read().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one handler, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.inner.handlers.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Observes every event after all its handlers succeeded.
    ///
    /// # Errors
    /// [`EventBusError::Closed`] after [`EventBus::shutdown`].
    pub fn tap(&self) -> Result<broadcast::Receiver<Arc<DomainEvent>>, EventBusError> {
        self.inner.tap.read().as_ref().map(broadcast::Sender::subscribe).ok_or_else(|| {
            EventBusError::Closed { message: "tap is closed".into(), context: None }
        })
    }

    /// Stops accepting events, drops every handler and closes the tap.
    /// Returns the number of topics that had handlers.
    pub fn shutdown(&self) -> usize {
        self.inner.closed.store(true, Ordering::Release);
        let topics = {
            let mut handlers = self.inner.handlers.write();
            let count = handlers.len();
            handlers.clear();
            count
        };
        self.inner.tap.write().take();
        debug!(topics, "Event bus shut down");
        topics
    }

    fn registrations(&self, topic: &Topic) -> Vec<Registration> {
        self.inner.handlers.read().get(topic).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<usize, EventBusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(EventBusError::Closed {
                message: "event bus is shut down".into(),
                context: Some(event.topic().to_string().into()),
            });
        }

        let registrations = self.registrations(event.topic());
        if registrations.is_empty() {
            trace!(topic = %event.topic(), "Event has no subscribers");
        }

        let mut failures = Vec::new();
        for registration in &registrations {
            if let Err(err) = registration.handler.handle(event).await {
                warn!(
                    topic = %event.topic(),
                    event_id = event.event_id(),
                    handler = registration.handler.name(),
                    error = %err,
                    "Event handler failed"
                );
                failures.push(format!("{}: {err}", registration.handler.name()));
            }
        }

        if !failures.is_empty() {
            return Err(EventBusError::Handler {
                message: failures.join("; ").into(),
                context: Some(event.event_id().to_owned().into()),
            });
        }

        if let Some(tap) = self.inner.tap.read().as_ref() {
            let _ = tap.send(Arc::new(event.clone()));
        }
        trace!(topic = %event.topic(), handlers = registrations.len(), "Event dispatched");
        Ok(registrations.len())
    }
}
