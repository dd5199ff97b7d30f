//! In-process [`SessionStore`] backed by a JSON tree.
//!
//! Behaves like the hosted store the protocol was written against: paths
//! address nested objects, null and empty objects do not exist, and every
//! write fans out to subscribers of overlapping paths in commit order.
//! Transactions are optimistic; the closure runs without the lock and the
//! write only lands if the value it saw is still current.

use super::{
    QueryFilter, SessionStore, Snapshot, StoreError, StoreErrorKind, StorePath, Subscription,
    TxDecision, TxFn, TxOutcome,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Transaction attempts before giving up with [`StoreErrorKind::Contention`].
pub const DEFAULT_TRANSACTION_RETRIES: usize = 25;

#[derive(Debug)]
struct Subscriber {
    path: StorePath,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Debug)]
struct Inner {
    root: Value,
    revision: u64,
    subscribers: Vec<Subscriber>,
    offline: bool,
}

impl Inner {
    fn commit(&mut self, path: &StorePath, value: Value) -> u64 {
        if value.is_null() {
            remove_at(&mut self.root, path.segments());
        } else {
            insert_at(&mut self.root, path.segments(), value);
        }
        self.revision += 1;
        self.notify(path);
        self.revision
    }

    fn notify(&mut self, written: &StorePath) {
        let revision = self.revision;
        let root = &self.root;
        self.subscribers.retain(|sub| {
            if !sub.path.overlaps(written) {
                return !sub.sender.is_closed();
            }
            let snapshot = Snapshot {
                revision,
                value: lookup(root, &sub.path).cloned(),
            };
            sub.sender.send(snapshot).is_ok()
        });
    }
}

/// Shared in-memory store. Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    max_retries: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        Self::with_retries(DEFAULT_TRANSACTION_RETRIES)
    }

    /// Creates an empty store with a custom transaction retry budget.
    #[instrument]
    pub fn with_retries(max_retries: usize) -> Self {
        info!(max_retries, "Creating memory store");
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: Value::Null,
                revision: 0,
                subscribers: Vec::new(),
                offline: false,
            })),
            max_retries,
        }
    }

    /// Simulates losing the connection. While offline every operation fails
    /// with [`StoreErrorKind::Unavailable`].
    #[instrument(skip(self))]
    pub fn set_offline(&self, offline: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        info!(offline, "Switching store connectivity");
        inner.offline = offline;
        Ok(())
    }

    /// Latest committed revision.
    pub fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.revision)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::unavailable(format!("Store lock poisoned: {}", e)))
    }

    fn connected(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock()?;
        if inner.offline {
            return Err(StoreError::unavailable("Store is offline"));
        }
        Ok(inner)
    }

    fn read_value(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let inner = self.connected()?;
        Ok(lookup(&inner.root, path).cloned())
    }

    fn write_value(&self, path: &StorePath, value: Value) -> Result<u64, StoreError> {
        let mut inner = self.connected()?;
        Ok(inner.commit(path, normalize(value)))
    }

    fn run_transaction(
        &self,
        path: &StorePath,
        update: &TxFn<'_>,
    ) -> Result<TxOutcome, StoreError> {
        for attempt in 0..=self.max_retries {
            let seen = self.read_value(path)?;
            let next = match update(seen.as_ref()) {
                TxDecision::Commit(next) => normalize(next),
                TxDecision::Abort => {
                    debug!(%path, attempt, "Transaction aborted by closure");
                    return Ok(TxOutcome::Aborted);
                }
            };

            let mut inner = self.connected()?;
            if lookup(&inner.root, path) != seen.as_ref() {
                debug!(%path, attempt, "Transaction conflict, retrying");
                continue;
            }
            let revision = inner.commit(path, next.clone());
            debug!(%path, attempt, revision, "Transaction committed");
            return Ok(TxOutcome::Committed(next));
        }

        warn!(%path, retries = self.max_retries, "Transaction retries exhausted");
        Err(StoreError::new(
            StoreErrorKind::Contention,
            format!(
                "Transaction on '{}' lost {} times",
                path,
                self.max_retries + 1
            ),
        ))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    #[instrument(skip(self, path), fields(path = %path))]
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.read_value(path)
    }

    #[instrument(skip(self, path, value), fields(path = %path))]
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let revision = self.write_value(path, value)?;
        debug!(revision, "Value set");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path))]
    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        let revision = self.write_value(path, Value::Null)?;
        debug!(revision, "Value removed");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path))]
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.connected()?;
        let current = Snapshot {
            revision: inner.revision,
            value: lookup(&inner.root, path).cloned(),
        };
        // The receiver is still in hand, so this send cannot fail.
        let _ = sender.send(current);
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        debug!(subscribers = inner.subscribers.len(), "Subscribed");
        Ok(receiver)
    }

    #[instrument(skip(self, path, update), fields(path = %path))]
    async fn transact(
        &self,
        path: &StorePath,
        update: &TxFn<'_>,
    ) -> Result<TxOutcome, StoreError> {
        self.run_transaction(path, update)
    }

    #[instrument(skip(self, collection, filter), fields(collection = %collection, field = %filter.field))]
    async fn query(
        &self,
        collection: &StorePath,
        filter: &QueryFilter,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.connected()?;
        let Some(Value::Object(children)) = lookup(&inner.root, collection) else {
            debug!("Collection empty");
            return Ok(Vec::new());
        };
        let matches: Vec<(String, Value)> = children
            .iter()
            .filter(|(_, child)| lookup(child, &filter.field) == Some(&filter.equals))
            .take(limit)
            .map(|(key, child)| (key.clone(), child.clone()))
            .collect();
        debug!(count = matches.len(), "Query matched");
        Ok(matches)
    }
}

/// Null and empty objects count as absent.
fn is_vacant(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

/// Drops vacant members recursively; a value that ends up vacant becomes
/// null.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, normalize(child)))
                .filter(|(_, child)| !is_vacant(child))
                .collect();
            if kept.is_empty() {
                Value::Null
            } else {
                Value::Object(kept)
            }
        }
        other => other,
    }
}

fn lookup<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    if is_vacant(node) { None } else { Some(node) }
}

fn insert_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(head);
        return;
    }
    if let Some(child) = map.get_mut(head) {
        remove_at(child, rest);
        if is_vacant(child) {
            map.remove(head);
        }
    }
}
