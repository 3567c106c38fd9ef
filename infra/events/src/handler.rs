use crate::error::EventBusError;
use async_trait::async_trait;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tally_domain::event::DomainEvent;
use tracing::trace;

const DEFAULT_REMEMBERED: usize = 10_000;

/// A subscriber to one or more topics.
///
/// Delivery is at-least-once: a handler may see the same `event_id` more than once and must
/// produce the same effect each time. Wrap it in [`Idempotent`] when it cannot guarantee that.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventBusError>;
}

/// Deduplicates deliveries by `event_id`.
///
/// Remembers the ids of the last `capacity` successfully handled events; older ids are evicted
/// first. A failed delivery is not remembered, so its retry reaches the inner handler again.
/// While one delivery of an id is running, concurrent deliveries of the same id are skipped.
pub struct Idempotent<H> {
    inner: H,
    seen: Mutex<Seen>,
}

#[derive(Debug, Default)]
struct Seen {
    ids: FxHashSet<String>,
    order: VecDeque<String>,
    in_flight: FxHashSet<String>,
    capacity: usize,
}

impl Seen {
    /// Marks `id` as running unless it is already remembered or running.
    fn claim(&mut self, id: &str) -> bool {
        !self.ids.contains(id) && self.in_flight.insert(id.to_owned())
    }

    fn remember(&mut self, id: &str) {
        if !self.ids.insert(id.to_owned()) {
            return;
        }
        self.order.push_back(id.to_owned());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }
}

/// In-flight marker for one delivery; released on drop, remembered only after [`Claim::done`].
struct Claim<'a> {
    seen: &'a Mutex<Seen>,
    id: &'a str,
    handled: bool,
}

impl Claim<'_> {
    fn done(mut self) {
        self.handled = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut seen = self.seen.lock();
        seen.in_flight.remove(self.id);
        if self.handled {
            seen.remember(self.id);
        }
    }
}

impl<H: EventHandler> Idempotent<H> {
    pub fn new(inner: H) -> Self {
        Self::with_capacity(inner, DEFAULT_REMEMBERED)
    }

    pub fn with_capacity(inner: H, capacity: usize) -> Self {
        Self {
            inner,
            seen: Mutex::new(Seen { capacity: capacity.max(1), ..Seen::default() }),
        }
    }

    #[must_use]
    pub fn has_seen(&self, event_id: &str) -> bool {
        self.seen.lock().ids.contains(event_id)
    }

    fn claim<'a>(&'a self, event_id: &'a str) -> Option<Claim<'a>> {
        let claimed = self.seen.lock().claim(event_id);
        claimed.then(|| Claim { seen: &self.seen, id: event_id, handled: false })
    }
}

impl<H> fmt::Debug for Idempotent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Idempotent").field("remembered", &self.seen.lock().ids.len()).finish()
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for Idempotent<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        let Some(claim) = self.claim(event.event_id()) else {
            trace!(handler = self.name(), event_id = event.event_id(), "Duplicate delivery skipped");
            return Ok(());
        };
        self.inner.handle(event).await?;
        claim.done();
        Ok(())
    }
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnHandler<F, Fut> {
    name: String,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EventBusError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f, _fut: PhantomData }
    }
}

impl<F, Fut> fmt::Debug for FnHandler<F, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F, Fut>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EventBusError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        (self.f)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seen_set_evicts_oldest_first() {
        let mut seen = Seen { capacity: 2, ..Seen::default() };
        seen.remember("a");
        seen.remember("b");
        seen.remember("a");
        seen.remember("c");

        assert!(!seen.ids.contains("a"));
        assert!(seen.ids.contains("b"));
        assert!(seen.ids.contains("c"));
        assert_eq!(seen.order.len(), 2);
    }

    #[test]
    fn running_and_remembered_ids_cannot_be_claimed() {
        let mut seen = Seen { capacity: 4, ..Seen::default() };
        assert!(seen.claim("a"));
        assert!(!seen.claim("a"));

        seen.in_flight.remove("a");
        seen.remember("a");
        assert!(!seen.claim("a"));
        assert!(seen.claim("b"));
    }
}
