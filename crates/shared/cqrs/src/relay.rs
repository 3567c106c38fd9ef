use crate::CqrsError;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use tally_database::Database;
use tally_domain::config::RelayConfig;
use tally_domain::outbox::{DispatchState, OutboxEntry};
use tally_event_bus::EventPublisher;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Outcome of one or more relay cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub claimed: usize,
    pub dispatched: usize,
    pub retried: usize,
    pub failed: usize,
}

impl RelayReport {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

impl AddAssign for RelayReport {
    fn add_assign(&mut self, rhs: Self) {
        self.claimed += rhs.claimed;
        self.dispatched += rhs.dispatched;
        self.retried += rhs.retried;
        self.failed += rhs.failed;
    }
}

struct RelayInner {
    db: Database,
    publisher: Arc<dyn EventPublisher>,
    config: RelayConfig,
}

impl fmt::Debug for RelayInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayInner").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Delivers committed outbox entries to the publisher, at least once.
///
/// Each cycle claims the oldest due entry of every topic under a lease, so several workers never
/// deliver the same entry at once and one topic's entries go out in `occurred_at` order. Failures
/// back off exponentially and end `Failed` once `max_attempts` is reached.
#[derive(Debug, Clone)]
pub struct OutboxRelay {
    inner: Arc<RelayInner>,
}

/// Running relay workers.
#[derive(Debug)]
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl RelayHandle {
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Signals every worker and waits for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "Relay worker ended abnormally");
            }
        }
        info!("Outbox relay stopped");
    }
}

fn chrono_delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn later(now: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl OutboxRelay {
    /// # Errors
    /// [`CqrsError::InvalidConfiguration`] if `batch_size` is zero; such a relay never claims anything.
    pub fn new(
        db: Database,
        publisher: Arc<dyn EventPublisher>,
        config: RelayConfig,
    ) -> Result<Self, CqrsError> {
        if config.batch_size == 0 {
            return Err(CqrsError::InvalidConfiguration {
                message: "Relay batch size must be greater than zero".into(),
                context: None,
            });
        }
        Ok(Self { inner: Arc::new(RelayInner { db, publisher, config }) })
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// One poll cycle: claim due entries and deliver each of them.
    pub async fn run_once(&self) -> RelayReport {
        let now = Utc::now();
        let claimed = self.inner.db.claim_outbox(
            now,
            self.inner.config.batch_size,
            chrono_delta(self.inner.config.lease()),
        );

        let mut report = RelayReport { claimed: claimed.len(), ..RelayReport::default() };
        for entry in claimed {
            self.deliver(entry, &mut report).await;
        }
        report
    }

    /// Runs cycles until nothing is due. Entries waiting out a backoff are left for later.
    pub async fn drain(&self) -> RelayReport {
        let mut total = RelayReport::default();
        loop {
            let report = self.run_once().await;
            if report.is_idle() {
                return total;
            }
            total += report;
        }
    }

    /// Starts `config.workers` background loops polling every `poll_interval`.
    #[must_use]
    pub fn spawn(&self) -> RelayHandle {
        let (shutdown, signal) = watch::channel(false);
        let count = self.inner.config.workers.max(1);
        let workers = (0..count)
            .map(|worker| {
                let relay = self.clone();
                let signal = signal.clone();
                tokio::spawn(relay.work(signal).instrument(info_span!("outbox_relay", worker)))
            })
            .collect();

        info!(workers = count, "Outbox relay started");
        RelayHandle { shutdown, workers }
    }

    async fn work(self, mut shutdown: watch::Receiver<bool>) {
        let poll = self.inner.config.poll_interval();
        loop {
            if *shutdown.borrow() {
                break;
            }
            if !self.run_once().await.is_idle() {
                continue;
            }
            tokio::select! {
                () = tokio::time::sleep(poll) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },
            }
        }
        debug!("Relay worker exiting");
    }

    async fn deliver(&self, entry: OutboxEntry, report: &mut RelayReport) {
        let event = entry.event();
        let span = info_span!(
            "deliver",
            sequence = entry.sequence(),
            topic = %event.topic(),
            event_id = event.event_id(),
            correlation_id = %event.correlation_id(),
            attempt = entry.attempts() + 1,
        );

        async {
            let db = &self.inner.db;
            match self.inner.publisher.publish(event).await {
                Ok(handlers) => match db.complete_outbox(entry.sequence(), Utc::now()) {
                    Ok(()) => {
                        report.dispatched += 1;
                        debug!(handlers, "Event dispatched");
                    },
                    Err(err) => warn!(error = %err, "Delivered but could not mark dispatched"),
                },
                Err(err) => {
                    let config = &self.inner.config;
                    let delay = chrono_delta(config.backoff(entry.attempts() + 1));
                    let retry_at = later(Utc::now(), delay);
                    match db.fail_outbox(entry.sequence(), &err.to_string(), retry_at, config.max_attempts) {
                        Ok(DispatchState::Failed) => {
                            report.failed += 1;
                            error!(error = %err, "Outbox entry failed permanently");
                        },
                        Ok(_) => {
                            report.retried += 1;
                            warn!(error = %err, retry_in_ms = delay.num_milliseconds(), "Delivery failed, will retry");
                        },
                        Err(store) => warn!(error = %store, "Could not record delivery failure"),
                    }
                },
            }
        }
        .instrument(span)
        .await;
    }
}
