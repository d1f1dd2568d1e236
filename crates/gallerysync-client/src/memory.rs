//! In-process [`DocumentStore`] backed by ordered maps.
//!
//! Every write pushes a fresh snapshot to each watcher of the touched
//! collection or document. Callbacks run after the internal lock is
//! released, so a watcher may cancel itself (or write) from its callback.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use gallerysync_core::normalize_timestamp;

use crate::error::StoreError;
use crate::store::{
    CollectionCallback, DocumentCallback, DocumentStore, OrderDirection, OrderSpec, RawDocument,
    StoreErrorCallback, StoreSubscription,
};

enum Watcher {
    Collection {
        path: String,
        order: OrderSpec,
        on_snapshot: CollectionCallback,
        on_error: StoreErrorCallback,
    },
    Document {
        collection: String,
        id: String,
        on_snapshot: DocumentCallback,
        on_error: StoreErrorCallback,
    },
}

impl Watcher {
    fn on_error(&self) -> &StoreErrorCallback {
        match self {
            Watcher::Collection { on_error, .. } | Watcher::Document { on_error, .. } => on_error,
        }
    }
}

/// A callback invocation collected under the lock and fired after it.
enum Push {
    Collection(CollectionCallback, Vec<RawDocument>),
    Document(DocumentCallback, Option<RawDocument>),
    Error(StoreErrorCallback, StoreError),
}

impl Push {
    fn fire(self) {
        match self {
            Push::Collection(callback, docs) => callback(docs),
            Push::Document(callback, doc) => callback(doc),
            Push::Error(callback, err) => callback(err),
        }
    }
}

struct MemoryState {
    collections: HashMap<String, BTreeMap<String, RawDocument>>,
    watchers: HashMap<u64, Watcher>,
    available: bool,
}

impl MemoryState {
    fn collection_snapshot(&self, path: &str, order: &OrderSpec) -> Vec<RawDocument> {
        let mut docs: Vec<RawDocument> = self
            .collections
            .get(path)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();

        docs.sort_by(|a, b| {
            let ordering = compare_field(a.get(&order.field), b.get(&order.field));
            match order.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            }
        });
        docs
    }

    fn document(&self, collection: &str, id: &str) -> Option<RawDocument> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Pushes for every watcher affected by a write to `collection/id`.
    fn pushes_for(&self, collection: &str, id: &str) -> Vec<Push> {
        self.watchers
            .values()
            .filter_map(|watcher| match watcher {
                Watcher::Collection {
                    path,
                    order,
                    on_snapshot,
                    ..
                } if path == collection => Some(Push::Collection(
                    Arc::clone(on_snapshot),
                    self.collection_snapshot(path, order),
                )),
                Watcher::Document {
                    collection: watched,
                    id: watched_id,
                    on_snapshot,
                    ..
                } if watched == collection && watched_id == id => Some(Push::Document(
                    Arc::clone(on_snapshot),
                    self.document(collection, id),
                )),
                _ => None,
            })
            .collect()
    }
}

/// Sort key of one field value.
enum SortKey {
    Missing,
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl SortKey {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => SortKey::Missing,
            Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or_default()),
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(time) => SortKey::Time(time.with_timezone(&Utc)),
                Err(_) => SortKey::Text(s.clone()),
            },
            Some(other) => normalize_timestamp(other)
                .map(SortKey::Time)
                .unwrap_or(SortKey::Missing),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Number(_) => 1,
            SortKey::Time(_) => 2,
            SortKey::Text(_) => 3,
        }
    }
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (SortKey::of(a), SortKey::of(b)) {
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(&y),
        (SortKey::Time(x), SortKey::Time(y)) => x.cmp(&y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(&y),
        (x, y) => x.rank().cmp(&y.rank()),
    }
}

fn split_document_path(path: &str) -> Result<(&str, &str), StoreError> {
    match path.split_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() && !id.contains('/') => {
            Ok((collection, id))
        }
        _ => Err(StoreError::Internal(format!(
            "invalid document path: {}",
            path
        ))),
    }
}

/// Document store held entirely in memory.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    next_watch_id: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                collections: HashMap::new(),
                watchers: HashMap::new(),
                available: true,
            })),
            next_watch_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Insert or replace a document and notify its watchers.
    pub fn put(&self, collection: &str, doc: RawDocument) {
        let id = doc.id.clone();
        let pushes = {
            let mut state = self.state.lock();
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), doc);
            state.pushes_for(collection, &id)
        };

        tracing::trace!(collection, id = %id, watchers = pushes.len(), "document written");
        pushes.into_iter().for_each(Push::fire);
    }

    /// Delete a document and notify its watchers. Returns true if it existed.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let pushes = {
            let mut state = self.state.lock();
            let removed = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some();
            if !removed {
                return false;
            }
            state.pushes_for(collection, id)
        };

        pushes.into_iter().for_each(Push::fire);
        true
    }

    /// Read one document.
    pub fn get(&self, collection: &str, id: &str) -> Option<RawDocument> {
        self.state.lock().document(collection, id)
    }

    /// Simulate losing or regaining the backend.
    ///
    /// Going unavailable fails every open watch and makes new opens fail
    /// until availability is restored.
    pub fn set_available(&self, available: bool) {
        let pushes: Vec<Push> = {
            let mut state = self.state.lock();
            if state.available == available {
                return;
            }
            state.available = available;
            if available {
                Vec::new()
            } else {
                state
                    .watchers
                    .drain()
                    .map(|(_, watcher)| {
                        Push::Error(
                            Arc::clone(watcher.on_error()),
                            StoreError::Unavailable("memory store offline".to_string()),
                        )
                    })
                    .collect()
            }
        };

        tracing::debug!(
            available,
            failed_watchers = pushes.len(),
            "memory store availability changed"
        );
        pushes.into_iter().for_each(Push::fire);
    }

    /// Whether opens currently succeed.
    pub fn is_available(&self) -> bool {
        self.state.lock().available
    }

    /// Number of open watches.
    pub fn watcher_count(&self) -> usize {
        self.state.lock().watchers.len()
    }

    /// Register `watcher`, returning its cancel handle and initial push.
    fn watch(&self, watcher: Watcher) -> Result<(StoreSubscription, Push), StoreError> {
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);

        let initial = {
            let mut state = self.state.lock();
            if !state.available {
                return Err(StoreError::Unavailable("memory store offline".to_string()));
            }
            let initial = match &watcher {
                Watcher::Collection {
                    path,
                    order,
                    on_snapshot,
                    ..
                } => Push::Collection(
                    Arc::clone(on_snapshot),
                    state.collection_snapshot(path, order),
                ),
                Watcher::Document {
                    collection,
                    id,
                    on_snapshot,
                    ..
                } => Push::Document(Arc::clone(on_snapshot), state.document(collection, id)),
            };
            state.watchers.insert(watch_id, watcher);
            initial
        };

        let state: Weak<Mutex<MemoryState>> = Arc::downgrade(&self.state);
        let subscription = StoreSubscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().watchers.remove(&watch_id);
            }
        });
        Ok((subscription, initial))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe_collection(
        &self,
        path: &str,
        order: OrderSpec,
        on_snapshot: CollectionCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError> {
        let (subscription, initial) = self.watch(Watcher::Collection {
            path: path.to_string(),
            order,
            on_snapshot,
            on_error,
        })?;
        initial.fire();
        Ok(subscription)
    }

    async fn subscribe_document(
        &self,
        path: &str,
        on_snapshot: DocumentCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError> {
        let (collection, id) = split_document_path(path)?;
        let (subscription, initial) = self.watch(Watcher::Document {
            collection: collection.to_string(),
            id: id.to_string(),
            on_snapshot,
            on_error,
        })?;
        initial.fire();
        Ok(subscription)
    }
}
