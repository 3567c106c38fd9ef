use crate::{Database, DatabaseError, Row};
use chrono::Utc;
use fxhash::FxHashMap;
use std::sync::atomic::Ordering;
use tally_domain::event::DomainEvent;
use tally_domain::outbox::OutboxEntry;
use tally_domain::record::WriteRecord;
use tracing::{debug, instrument, warn};

type RowKey = (String, String);

#[derive(Debug)]
enum Staged {
    Insert(Row),
    Update { expected: u64, row: Row },
    Delete { expected: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    RolledBack,
}

/// A storage session owned by exactly one request.
///
/// Staged writes are visible to this transaction only (read-your-writes). Dropping an open
/// transaction discards everything it staged.
#[derive(Debug)]
pub struct Transaction {
    db: Database,
    id: String,
    state: State,
    writes: FxHashMap<RowKey, Staged>,
    outbox: Vec<OutboxEntry>,
    intents: Vec<RowKey>,
}

impl Transaction {
    pub(crate) fn new(db: Database, id: String) -> Self {
        Self {
            db,
            id,
            state: State::Open,
            writes: FxHashMap::default(),
            outbox: Vec::new(),
            intents: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Outbox entries staged so far, still `Pending`.
    #[must_use]
    pub fn staged_outbox(&self) -> &[OutboxEntry] {
        &self.outbox
    }

    /// Number of staged row writes.
    #[must_use]
    pub fn staged_writes(&self) -> usize {
        self.writes.len()
    }

    /// Reads a row, preferring this transaction's staged state.
    #[must_use]
    pub fn get(&self, table: &str, id: &str) -> Option<Row> {
        match self.writes.get(&key(table, id)) {
            Some(Staged::Insert(row) | Staged::Update { row, .. }) => Some(row.clone()),
            Some(Staged::Delete { .. }) => None,
            None => self.db.get(table, id),
        }
    }

    #[must_use]
    pub fn exists(&self, table: &str, id: &str) -> bool {
        self.get(table, id).is_some()
    }

    /// Stages a new row at version 1.
    pub fn insert(
        &mut self,
        table: &str,
        id: &str,
        fields: serde_json::Value,
    ) -> Result<Row, DatabaseError> {
        self.ensure_open()?;
        let key = key(table, id);
        if self.writes.contains_key(&key) {
            return Err(already_exists(table, id));
        }

        let fresh = self.acquire_intent(&key)?;
        if self.db.committed.read().row(table, id).is_some() {
            if fresh {
                self.release_intent(&key);
            }
            return Err(already_exists(table, id));
        }

        let row = WriteRecord::fresh(id, fields, Utc::now());
        self.writes.insert(key, Staged::Insert(row.clone()));
        Ok(row)
    }

    /// Stages a conditional update: succeeds only if the row is still at `expected`.
    ///
    /// The returned row carries the version it will have once committed.
    pub fn update_if_version(
        &mut self,
        table: &str,
        id: &str,
        expected: u64,
        fields: serde_json::Value,
    ) -> Result<Row, DatabaseError> {
        self.ensure_open()?;
        let key = key(table, id);
        let now = Utc::now();

        if let Some(staged) = self.writes.get_mut(&key) {
            return match staged {
                Staged::Insert(row) | Staged::Update { row, .. } => {
                    if row.version != expected {
                        return Err(version_conflict(table, id, expected, row.version));
                    }
                    row.fields = fields;
                    row.updated_at = now;
                    Ok(row.clone())
                },
                Staged::Delete { .. } => Err(not_found(table, id)),
            };
        }

        let fresh = self.acquire_intent(&key)?;
        let current = self.db.get(table, id);
        let checked = match current {
            None => Err(not_found(table, id)),
            Some(row) if row.version != expected => {
                Err(version_conflict(table, id, expected, row.version))
            },
            Some(row) => Ok(row),
        };
        let current = match checked {
            Ok(row) => row,
            Err(err) => {
                if fresh {
                    self.release_intent(&key);
                }
                return Err(err);
            },
        };

        let mut row = current.bumped(now);
        row.fields = fields;
        self.writes.insert(key, Staged::Update { expected, row: row.clone() });
        Ok(row)
    }

    /// Stages removal of a row by id.
    pub fn delete(&mut self, table: &str, id: &str) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        let key = key(table, id);

        if let Some(staged) = self.writes.remove(&key) {
            return match staged {
                Staged::Insert(_) => Ok(()),
                Staged::Update { expected, .. } => {
                    self.writes.insert(key, Staged::Delete { expected });
                    Ok(())
                },
                Staged::Delete { expected } => {
                    self.writes.insert(key, Staged::Delete { expected });
                    Err(not_found(table, id))
                },
            };
        }

        let fresh = self.acquire_intent(&key)?;
        let Some(current) = self.db.get(table, id) else {
            if fresh {
                self.release_intent(&key);
            }
            return Err(not_found(table, id));
        };

        self.writes.insert(key, Staged::Delete { expected: current.version });
        Ok(())
    }

    /// Stages an outbox entry; it only becomes visible to the relay on commit.
    pub fn enqueue(&mut self, event: DomainEvent) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.outbox.push(OutboxEntry::pending(event, self.id.clone()));
        Ok(())
    }

    /// Applies staged writes and marks staged outbox entries dispatchable, atomically.
    ///
    /// Versions are re-validated under the commit lock. On any failure nothing is applied and
    /// the transaction is rolled back.
    #[instrument(skip(self), fields(tx = %self.id, writes = self.writes.len(), events = self.outbox.len()))]
    pub fn commit(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;

        let result = self.apply();
        self.release_all_intents();
        self.writes.clear();
        self.outbox.clear();

        match result {
            Ok(()) => {
                self.state = State::Committed;
                self.db.counters.committed.fetch_add(1, Ordering::Relaxed);
                debug!("Transaction committed");
                Ok(())
            },
            Err(err) => {
                self.state = State::RolledBack;
                self.db.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Commit failed, transaction rolled back");
                Err(err)
            },
        }
    }

    /// Discards staged writes and outbox entries.
    ///
    /// Returns `false` when there was nothing to roll back (already committed or rolled back).
    pub fn rollback(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.discard();
        debug!(tx = %self.id, "Transaction rolled back");
        true
    }

    fn apply(&mut self) -> Result<(), DatabaseError> {
        let mut outbox = std::mem::take(&mut self.outbox);
        for entry in &mut outbox {
            entry.mark_dispatchable()?;
        }

        let mut committed = self.db.committed.write();

        for ((table, id), staged) in &self.writes {
            let stored = committed.row(table, id).map(|row| row.version);
            match (staged, stored) {
                (Staged::Insert(_), Some(_)) => return Err(already_exists(table, id)),
                (Staged::Update { .. } | Staged::Delete { .. }, None) => {
                    return Err(not_found(table, id));
                },
                (Staged::Update { expected, .. } | Staged::Delete { expected }, Some(v))
                    if *expected != v =>
                {
                    return Err(version_conflict(table, id, *expected, v));
                },
                _ => {},
            }
        }

        let capacity = self.db.outbox_capacity();
        if committed.outbox.len() + outbox.len() > capacity {
            return Err(DatabaseError::OutboxFull {
                message: format!("capacity {capacity} reached").into(),
                context: Some(self.id.clone().into()),
            });
        }

        for ((table, id), staged) in self.writes.drain() {
            let rows = committed.tables.entry(table).or_default();
            match staged {
                Staged::Insert(row) | Staged::Update { row, .. } => {
                    rows.insert(id, row);
                },
                Staged::Delete { .. } => {
                    rows.remove(&id);
                },
            }
        }
        for entry in outbox {
            committed.outbox.push(entry);
        }

        Ok(())
    }

    fn discard(&mut self) {
        self.writes.clear();
        self.outbox.clear();
        self.release_all_intents();
        self.state = State::RolledBack;
        self.db.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.is_open() {
            return Ok(());
        }
        Err(DatabaseError::Closed {
            message: format!("transaction {} is no longer open", self.id).into(),
            context: None,
        })
    }

    /// Returns `true` if the intent was newly taken by this call.
    fn acquire_intent(&mut self, key: &RowKey) -> Result<bool, DatabaseError> {
        let mut intents = self.db.intents.lock();
        match intents.get(key) {
            Some(owner) if owner == &self.id => Ok(false),
            Some(owner) => Err(DatabaseError::WriteIntent {
                message: format!("{}:{} held by {owner}", key.0, key.1).into(),
                context: None,
            }),
            None => {
                intents.insert(key.clone(), self.id.clone());
                self.intents.push(key.clone());
                Ok(true)
            },
        }
    }

    fn release_intent(&mut self, key: &RowKey) {
        let mut intents = self.db.intents.lock();
        if intents.get(key).is_some_and(|owner| owner == &self.id) {
            intents.remove(key);
        }
        self.intents.retain(|held| held != key);
    }

    fn release_all_intents(&mut self) {
        let mut intents = self.db.intents.lock();
        for key in self.intents.drain(..) {
            if intents.get(&key).is_some_and(|owner| owner == &self.id) {
                intents.remove(&key);
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_open() {
            debug!(tx = %self.id, "Open transaction dropped, discarding staged changes");
            self.discard();
        }
    }
}

fn key(table: &str, id: &str) -> RowKey {
    (table.to_owned(), id.to_owned())
}

fn not_found(table: &str, id: &str) -> DatabaseError {
    DatabaseError::NotFound { message: format!("{table}:{id}").into(), context: None }
}

fn already_exists(table: &str, id: &str) -> DatabaseError {
    DatabaseError::AlreadyExists { message: format!("{table}:{id}").into(), context: None }
}

fn version_conflict(table: &str, id: &str, expected: u64, actual: u64) -> DatabaseError {
    DatabaseError::VersionConflict {
        message: format!("{table}:{id} expected version {expected}, found {actual}").into(),
        context: None,
    }
}
