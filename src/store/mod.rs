//! Shared document store abstraction.
//!
//! Sessions live in a remote multi-reader/multi-writer JSON tree. The
//! protocol only needs get/set, change subscriptions, an atomic
//! read-modify-write and an equality query, so that is all
//! [`SessionStore`] offers.

mod error;
mod memory;
mod path;

pub use error::{StoreError, StoreErrorKind};
pub use memory::{DEFAULT_TRANSACTION_RETRIES, MemoryStore};
pub use path::StorePath;

use serde_json::Value;
use tokio::sync::mpsc;

/// One observed version of the value at a subscribed path.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store revision that produced this version. Strictly increasing per
    /// subscription; a redelivered version carries the same revision.
    pub revision: u64,
    /// Value at the path, `None` when nothing is stored there.
    pub value: Option<Value>,
}

/// Stream of versions for one path, in commit order.
pub type Subscription = mpsc::UnboundedReceiver<Snapshot>;

/// What a transaction closure wants done with the value it was shown.
#[derive(Debug, Clone, PartialEq)]
pub enum TxDecision {
    /// Replace the value. `Value::Null` removes it.
    Commit(Value),
    /// Leave the value untouched.
    Abort,
}

/// Result of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome {
    /// The closure's value was written.
    Committed(Value),
    /// The closure aborted.
    Aborted,
}

impl TxOutcome {
    /// True if the transaction wrote a value.
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed(_))
    }
}

/// Transaction closure. May run several times, each time against a freshly
/// read value, so it must not have side effects beyond recording its last
/// decision.
pub type TxFn<'a> = dyn Fn(Option<&Value>) -> TxDecision + Send + Sync + 'a;

/// Child-field equality filter for [`SessionStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Field path relative to each child, e.g. `gameState`.
    pub field: StorePath,
    /// Value the field must equal.
    pub equals: Value,
}

impl QueryFilter {
    /// Filter on a direct child field.
    pub fn field_equals(field: &str, equals: impl Into<Value>) -> Self {
        Self {
            field: StorePath::root().child(field),
            equals: equals.into(),
        }
    }
}

/// Shared key-value document store.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Reads the value at a path.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Unconditionally overwrites the value at a path.
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Deletes the value at a path. Deleting a missing path is not an error.
    async fn remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Subscribes to a path. The current value is delivered first, then every
    /// committed change that affects the path.
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;

    /// Atomic read-modify-write. The closure is re-run against fresh state
    /// when a concurrent write wins.
    async fn transact(&self, path: &StorePath, update: &TxFn<'_>)
    -> Result<TxOutcome, StoreError>;

    /// Children of `collection` matching `filter`, at most `limit`, ordered
    /// by key.
    async fn query(
        &self,
        collection: &StorePath,
        filter: &QueryFilter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError>;
}
