use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tally_domain::{CorrelationId, DomainEvent, Topic};
use tally_event_bus::*;

fn topic(raw: &str) -> Topic {
    Topic::new(raw).unwrap()
}

fn event(id: &str, raw_topic: &str) -> DomainEvent {
    DomainEvent::new(
        id.to_owned(),
        chrono::Utc::now(),
        CorrelationId::new("corr"),
        topic(raw_topic),
        serde_json::json!({ "id": id }),
    )
}

/// Fails the first `failures` deliveries, then counts successes.
#[derive(Debug, Default)]
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
    applied: AtomicUsize,
}

#[async_trait]
impl EventHandler for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), EventBusError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EventBusError::Handler { message: "not yet".into(), context: None });
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Shared(Arc<Flaky>);

#[async_trait]
impl EventHandler for Shared {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        self.0.handle(event).await
    }
}

#[tokio::test]
async fn handlers_only_see_their_topic() {
    let bus = EventBus::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    bus.subscribe(
        topic("example.created"),
        Arc::new(FnHandler::new("count-created", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })),
    );

    assert_eq!(bus.publish(&event("e1", "example.created")).await.unwrap(), 1);
    assert_eq!(bus.publish(&event("e2", "example.deleted")).await.unwrap(), 0);
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn any_failing_handler_fails_the_publish() {
    let bus = EventBus::new();
    let ok = Arc::new(Flaky::default());
    let bad = Arc::new(Flaky { failures: 1, ..Flaky::default() });
    bus.subscribe(topic("example.created"), Arc::new(Shared(ok.clone())));
    bus.subscribe(topic("example.created"), Arc::new(Shared(bad.clone())));

    let err = bus.publish(&event("e1", "example.created")).await.unwrap_err();
    assert!(matches!(err, EventBusError::Handler { .. }));
    assert_eq!(ok.applied.load(Ordering::SeqCst), 1, "healthy handlers still run");

    bus.publish(&event("e1", "example.created")).await.unwrap();
    assert_eq!(bad.applied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn idempotent_wrapper_applies_each_event_once() {
    let bus = EventBus::new();
    let inner = Arc::new(Flaky { failures: 2, ..Flaky::default() });
    bus.subscribe(topic("example.updated"), Arc::new(Idempotent::new(Shared(inner.clone()))));

    let e = event("e1", "example.updated");
    assert!(bus.publish(&e).await.is_err());
    assert!(bus.publish(&e).await.is_err());
    bus.publish(&e).await.unwrap();
    bus.publish(&e).await.unwrap();

    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    assert_eq!(inner.applied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tap_sees_only_successful_deliveries() {
    let bus = EventBus::new();
    bus.subscribe(topic("example.deleted"), Arc::new(Flaky { failures: 1, ..Flaky::default() }));
    let mut tap = bus.tap().unwrap();

    let _ = bus.publish(&event("e1", "example.deleted")).await;
    bus.publish(&event("e2", "example.created")).await.unwrap();
    bus.publish(&event("e1", "example.deleted")).await.unwrap();

    let first = tap.next_event().await.unwrap();
    assert_eq!(first.event_id(), "e2");
    let deleted = tap.next_on(&topic("example.deleted")).await.unwrap();
    assert_eq!(deleted.event_id(), "e1");
}

#[tokio::test]
async fn unsubscribe_and_shutdown() {
    let bus = EventBus::new();
    let handler: Arc<dyn EventHandler> = Arc::new(Flaky::default());
    let ids = bus.subscribe_all([topic("example.created"), topic("example.updated")], &handler);
    assert_eq!(bus.topics().len(), 2);

    assert!(bus.unsubscribe(ids[0]));
    assert!(!bus.unsubscribe(ids[0]));
    assert_eq!(bus.handler_count(&topic("example.created")), 0);

    let mut tap = bus.tap().unwrap();
    assert_eq!(bus.shutdown(), 1);
    assert!(tap.next_event().await.is_none());
    assert!(matches!(bus.tap(), Err(EventBusError::Closed { .. })));
    assert!(matches!(
        bus.publish(&event("e1", "example.updated")).await,
        Err(EventBusError::Closed { .. })
    ));
}

/// Holds every delivery open until released, counting how many reached it.
#[derive(Debug, Default)]
struct Gate {
    entered: AtomicUsize,
    open: tokio::sync::Notify,
}

struct Gated(Arc<Gate>);

#[async_trait]
impl EventHandler for Gated {
    fn name(&self) -> &str {
        "gate"
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), EventBusError> {
        self.0.entered.fetch_add(1, Ordering::SeqCst);
        self.0.open.notified().await;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_duplicates_reach_the_handler_once() {
    let gate = Arc::new(Gate::default());
    let handler = Arc::new(Idempotent::new(Gated(gate.clone())));
    let e = event("e1", "example.updated");

    let first = tokio::spawn({
        let (handler, e) = (handler.clone(), e.clone());
        async move { handler.handle(&e).await }
    });
    while gate.entered.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    handler.handle(&e).await.unwrap();
    assert!(!handler.has_seen("e1"), "duplicate returned while the first delivery was running");

    gate.open.notify_one();
    first.await.unwrap().unwrap();
    assert!(handler.has_seen("e1"));
    assert_eq!(gate.entered.load(Ordering::SeqCst), 1);
}
