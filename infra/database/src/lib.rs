//! # Database Infrastructure
//!
//! An in-process transactional store that stands in for a concrete storage driver.
//!
//! ## Key Features
//! - **Versioned write tables**: rows are [`WriteRecord`]s holding JSON fields; updates are
//!   conditional on the version the writer read.
//! - **Transactions**: writes and outbox entries are staged in a [`Transaction`] and become
//!   visible together on commit, or not at all.
//! - **Row write-intents**: the first transaction to stage a write on a row owns it until it
//!   finishes; concurrent writers are told to back off with a conflict.
//! - **Transactional outbox**: committed entries become `Dispatchable` and are claimed per topic,
//!   oldest first, under a lease.
//! - **Read views**: denormalized projections, written outside transactions.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use tally_database::{Database, DatabaseError};
//!
//! # fn main() -> Result<(), DatabaseError> {
//! let db = Database::builder().outbox_capacity(1_000).init()?;
//!
//! let mut tx = db.begin("tx-1");
//! tx.insert("example", "example:1", json!({ "name": "first" }))?;
//! tx.commit()?;
//!
//! assert_eq!(db.get("example", "example:1").map(|r| r.version), Some(1));
//! # Ok(())
//! # }
//! ```

mod error;
mod outbox;
mod transaction;
mod view;

pub use error::{DatabaseError, DatabaseErrorExt};
pub use outbox::OutboxStats;
pub use transaction::Transaction;

use fxhash::FxHashMap;
use outbox::OutboxTable;
use parking_lot::{Mutex, RwLock};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tally_domain::record::WriteRecord;
use tracing::info;

/// A stored write-model row with untyped fields.
pub type Row = WriteRecord<serde_json::Value>;

const DEFAULT_OUTBOX_CAPACITY: usize = 100_000;

/// Committed state guarded by a single lock so commits apply atomically.
#[derive(Debug, Default)]
pub(crate) struct Committed {
    pub(crate) tables: FxHashMap<String, FxHashMap<String, Row>>,
    pub(crate) outbox: OutboxTable,
}

impl Committed {
    pub(crate) fn row(&self, table: &str, id: &str) -> Option<&Row> {
        self.tables.get(table).and_then(|rows| rows.get(id))
    }
}

/// Counters for transaction lifecycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

impl DatabaseStats {
    /// Transactions that are neither committed nor rolled back.
    #[must_use]
    pub const fn open(&self) -> u64 {
        self.begun.saturating_sub(self.committed + self.rolled_back)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) begun: AtomicU64,
    pub(crate) committed: AtomicU64,
    pub(crate) rolled_back: AtomicU64,
}

/// Inner state of the [`Database`] wrapper.
#[derive(Debug)]
pub struct DatabaseInner {
    pub(crate) committed: RwLock<Committed>,
    /// `(table, id)` -> id of the transaction that staged a write on that row.
    pub(crate) intents: Mutex<FxHashMap<(String, String), String>>,
    pub(crate) views: RwLock<FxHashMap<String, FxHashMap<String, serde_json::Value>>>,
    pub(crate) counters: Counters,
    outbox_capacity: usize,
}

impl DatabaseInner {
    #[must_use]
    pub const fn outbox_capacity(&self) -> usize {
        self.outbox_capacity
    }
}

/// Thread-safe handle to the store. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Deref for Database {
    type Target = DatabaseInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Database {
    /// Creates a new [`DatabaseBuilder`].
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Opens a transaction. The id is attached to every outbox entry it stages.
    pub fn begin(&self, id: impl Into<String>) -> Transaction {
        self.counters.begun.fetch_add(1, Ordering::Relaxed);
        Transaction::new(self.clone(), id.into())
    }

    /// Reads a committed row, ignoring anything staged by open transactions.
    #[must_use]
    pub fn get(&self, table: &str, id: &str) -> Option<Row> {
        self.committed.read().row(table, id).cloned()
    }

    /// Number of committed rows in `table`.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.committed.read().tables.get(table).map_or(0, FxHashMap::len)
    }

    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            begun: self.counters.begun.load(Ordering::Relaxed),
            committed: self.counters.committed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// A fluent builder for the in-process store.
#[must_use = "builders do nothing unless you call .init()"]
#[derive(Debug)]
pub struct DatabaseBuilder {
    outbox_capacity: usize,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self { outbox_capacity: DEFAULT_OUTBOX_CAPACITY }
    }
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on outbox entries held at once, all states included.
    pub const fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// # Errors
    /// [`DatabaseError::Validation`] if the outbox capacity is zero.
    pub fn init(self) -> Result<Database, DatabaseError> {
        if self.outbox_capacity == 0 {
            return Err(DatabaseError::Validation {
                message: "Outbox capacity must be greater than zero".into(),
                context: None,
            });
        }

        info!(outbox_capacity = self.outbox_capacity, "In-process store initialized");

        Ok(Database {
            inner: Arc::new(DatabaseInner {
                committed: RwLock::new(Committed::default()),
                intents: Mutex::new(FxHashMap::default()),
                views: RwLock::new(FxHashMap::default()),
                counters: Counters::default(),
                outbox_capacity: self.outbox_capacity,
            }),
        })
    }
}
