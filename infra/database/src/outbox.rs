use crate::{Database, DatabaseError};
use chrono::{DateTime, Duration, Utc};
use fxhash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use tally_domain::outbox::{DispatchState, OutboxEntry};
use tracing::{debug, trace};

/// Committed outbox rows plus an ordering index over the dispatchable ones.
#[derive(Debug, Default)]
pub(crate) struct OutboxTable {
    entries: BTreeMap<u64, OutboxEntry>,
    /// `(occurred_at, sequence)` of every `Dispatchable` entry.
    order: BTreeSet<(DateTime<Utc>, u64)>,
    next_sequence: u64,
}

impl OutboxTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, mut entry: OutboxEntry) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        entry.assign_sequence(sequence);
        if entry.state() == DispatchState::Dispatchable {
            self.order.insert((entry.event().occurred_at(), sequence));
        }
        self.entries.insert(sequence, entry);
    }

    fn get_mut(&mut self, sequence: u64) -> Result<&mut OutboxEntry, DatabaseError> {
        self.entries.get_mut(&sequence).ok_or_else(|| DatabaseError::NotFound {
            message: format!("outbox entry {sequence}").into(),
            context: None,
        })
    }

    fn unindex(&mut self, sequence: u64) {
        if let Some(entry) = self.entries.get(&sequence) {
            self.order.remove(&(entry.event().occurred_at(), sequence));
        }
    }

    fn reindex(&mut self, sequence: u64) {
        if let Some(entry) = self.entries.get(&sequence)
            && entry.state() == DispatchState::Dispatchable
        {
            self.order.insert((entry.event().occurred_at(), sequence));
        }
    }
}

/// Number of committed outbox entries per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub dispatchable: usize,
    pub dispatched: usize,
    pub acknowledged: usize,
    pub failed: usize,
}

impl OutboxStats {
    /// Entries the relay still has to settle.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.dispatchable
    }
}

impl Database {
    /// Leases up to `batch` due entries, at most one per topic: the oldest unsettled entry of
    /// each topic. A topic whose head is backing off or leased yields nothing, which keeps
    /// per-topic delivery in `occurred_at` order.
    pub fn claim_outbox(&self, now: DateTime<Utc>, batch: usize, lease: Duration) -> Vec<OutboxEntry> {
        let mut committed = self.committed.write();
        let OutboxTable { entries, order, .. } = &mut committed.outbox;

        let mut heads: FxHashSet<String> = FxHashSet::default();
        let mut claimed = Vec::new();

        for &(_, sequence) in order.iter() {
            if claimed.len() >= batch {
                break;
            }
            let Some(entry) = entries.get_mut(&sequence) else { continue };
            if !heads.insert(entry.event().topic().as_str().to_owned()) {
                continue;
            }
            if entry.is_due(now) && entry.lease(now + lease).is_ok() {
                claimed.push(entry.clone());
            }
        }

        if !claimed.is_empty() {
            trace!(count = claimed.len(), "Claimed outbox entries");
        }
        claimed
    }

    /// Records a successful delivery.
    pub fn complete_outbox(&self, sequence: u64, now: DateTime<Utc>) -> Result<(), DatabaseError> {
        let mut committed = self.committed.write();
        let table = &mut committed.outbox;
        table.unindex(sequence);
        let result = table.get_mut(sequence)?.mark_dispatched(now);
        table.reindex(sequence);
        result?;
        Ok(())
    }

    /// Records a failed delivery; returns the resulting state (`Dispatchable` or `Failed`).
    pub fn fail_outbox(
        &self,
        sequence: u64,
        error: &str,
        retry_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<DispatchState, DatabaseError> {
        let mut committed = self.committed.write();
        let table = &mut committed.outbox;
        table.unindex(sequence);
        let result = table.get_mut(sequence)?.record_failure(error, retry_at, max_attempts);
        table.reindex(sequence);
        Ok(result?)
    }

    #[must_use]
    pub fn outbox_entry(&self, sequence: u64) -> Option<OutboxEntry> {
        self.committed.read().outbox.entries.get(&sequence).cloned()
    }

    /// Committed entries in sequence order, optionally restricted to one state.
    #[must_use]
    pub fn outbox_entries(&self, state: Option<DispatchState>) -> Vec<OutboxEntry> {
        self.committed
            .read()
            .outbox
            .entries
            .values()
            .filter(|entry| state.is_none_or(|s| entry.state() == s))
            .cloned()
            .collect()
    }

    /// Re-arms a failed entry with a fresh attempt budget.
    pub fn retry_failed(&self, sequence: u64) -> Result<(), DatabaseError> {
        let mut committed = self.committed.write();
        let table = &mut committed.outbox;
        table.get_mut(sequence)?.rearm()?;
        table.reindex(sequence);
        debug!(sequence, "Failed outbox entry re-armed");
        Ok(())
    }

    /// Marks a dispatched entry as acknowledged downstream.
    pub fn acknowledge(&self, sequence: u64) -> Result<(), DatabaseError> {
        let mut committed = self.committed.write();
        committed.outbox.get_mut(sequence)?.acknowledge()?;
        Ok(())
    }

    /// Drops acknowledged entries dispatched at or before `cutoff`. Returns how many were removed.
    pub fn collect_garbage(&self, cutoff: DateTime<Utc>) -> usize {
        let mut committed = self.committed.write();
        let before = committed.outbox.entries.len();
        committed.outbox.entries.retain(|_, entry| {
            !(entry.state() == DispatchState::Acknowledged
                && entry.dispatched_at().is_some_and(|at| at <= cutoff))
        });
        let removed = before - committed.outbox.entries.len();
        if removed > 0 {
            debug!(removed, "Collected acknowledged outbox entries");
        }
        removed
    }

    #[must_use]
    pub fn outbox_stats(&self) -> OutboxStats {
        let committed = self.committed.read();
        let mut stats = OutboxStats::default();
        for entry in committed.outbox.entries.values() {
            match entry.state() {
                DispatchState::Dispatchable => stats.dispatchable += 1,
                DispatchState::Dispatched => stats.dispatched += 1,
                DispatchState::Acknowledged => stats.acknowledged += 1,
                DispatchState::Failed => stats.failed += 1,
                DispatchState::Pending => {},
            }
        }
        stats
    }
}
