//! Shared fixtures for the listener manager integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use gallerysync_client::store::{CollectionCallback, DocumentCallback, StoreErrorCallback};
use gallerysync_client::{
    ConnectionStatus, DocumentStore, Error, ErrorCallback, ListenerManager, NetworkMonitor,
    OrderSpec, RawDocument, StoreError, StoreSubscription, SyncConfig,
};

/// One call to `subscribe_collection` / `subscribe_document`.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub path: String,
    pub order: Option<OrderSpec>,
    pub at: Instant,
    /// Handle index, `None` when the open was failed on purpose.
    pub handle: Option<usize>,
}

enum Sink {
    Collection(CollectionCallback),
    Document(DocumentCallback),
}

struct FakeWatch {
    path: String,
    sink: Sink,
    on_error: StoreErrorCallback,
    cancels: Arc<AtomicUsize>,
}

impl FakeWatch {
    fn is_live(&self) -> bool {
        self.cancels.load(Ordering::SeqCst) == 0
    }
}

#[derive(Default)]
struct FakeState {
    opens: Vec<OpenRecord>,
    watches: Vec<FakeWatch>,
    failing_opens: usize,
    gate: Option<Arc<Notify>>,
}

/// Scripted document store.
///
/// Opens never deliver on their own; the test pushes snapshots and errors
/// with the `emit_*` methods. Every handle counts its cancellations.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` opens with a transient error.
    pub fn fail_next_opens(&self, n: usize) {
        self.state.lock().failing_opens = n;
    }

    /// Make every later open wait until the returned gate is notified once per open.
    pub fn hold_opens(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().gate = Some(Arc::clone(&gate));
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.state.lock().opens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    /// How many times handle `index` was cancelled.
    pub fn cancel_count(&self, index: usize) -> usize {
        self.state.lock().watches[index].cancels.load(Ordering::SeqCst)
    }

    /// Live handles watching `path`.
    pub fn live_watches(&self, path: &str) -> usize {
        self.state
            .lock()
            .watches
            .iter()
            .filter(|watch| watch.path == path && watch.is_live())
            .count()
    }

    /// Push a collection snapshot to every live watch of `path`.
    pub fn emit_collection(&self, path: &str, docs: Vec<RawDocument>) {
        let callbacks: Vec<CollectionCallback> = self
            .state
            .lock()
            .watches
            .iter()
            .filter(|watch| watch.path == path && watch.is_live())
            .filter_map(|watch| match &watch.sink {
                Sink::Collection(callback) => Some(Arc::clone(callback)),
                Sink::Document(_) => None,
            })
            .collect();
        for callback in callbacks {
            callback(docs.clone());
        }
    }

    /// Push a collection snapshot to handle `index`, even if it was cancelled.
    pub fn emit_collection_to(&self, index: usize, docs: Vec<RawDocument>) {
        let callback = match &self.state.lock().watches[index].sink {
            Sink::Collection(callback) => Arc::clone(callback),
            Sink::Document(_) => panic!("handle {} watches a document", index),
        };
        callback(docs);
    }

    /// Push a document snapshot to every live watch of `path`.
    pub fn emit_document(&self, path: &str, doc: Option<RawDocument>) {
        let callbacks: Vec<DocumentCallback> = self
            .state
            .lock()
            .watches
            .iter()
            .filter(|watch| watch.path == path && watch.is_live())
            .filter_map(|watch| match &watch.sink {
                Sink::Document(callback) => Some(Arc::clone(callback)),
                Sink::Collection(_) => None,
            })
            .collect();
        for callback in callbacks {
            callback(doc.clone());
        }
    }

    /// Fail every live watch of `path`.
    pub fn emit_error(&self, path: &str, err: StoreError) {
        let callbacks: Vec<StoreErrorCallback> = self
            .state
            .lock()
            .watches
            .iter()
            .filter(|watch| watch.path == path && watch.is_live())
            .map(|watch| Arc::clone(&watch.on_error))
            .collect();
        for callback in callbacks {
            callback(err.clone());
        }
    }

    fn open(
        &self,
        path: &str,
        order: Option<OrderSpec>,
        sink: Sink,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError> {
        let mut state = self.state.lock();
        let at = Instant::now();

        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            state.opens.push(OpenRecord {
                path: path.to_string(),
                order,
                at,
                handle: None,
            });
            return Err(StoreError::Unavailable("scripted failure".to_string()));
        }

        let index = state.watches.len();
        let cancels = Arc::new(AtomicUsize::new(0));
        state.watches.push(FakeWatch {
            path: path.to_string(),
            sink,
            on_error,
            cancels: Arc::clone(&cancels),
        });
        state.opens.push(OpenRecord {
            path: path.to_string(),
            order,
            at,
            handle: Some(index),
        });

        Ok(StoreSubscription::new(move || {
            cancels.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn subscribe_collection(
        &self,
        path: &str,
        order: OrderSpec,
        on_snapshot: CollectionCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError> {
        self.pass_gate().await;
        self.open(path, Some(order), Sink::Collection(on_snapshot), on_error)
    }

    async fn subscribe_document(
        &self,
        path: &str,
        on_snapshot: DocumentCallback,
        on_error: StoreErrorCallback,
    ) -> Result<StoreSubscription, StoreError> {
        self.pass_gate().await;
        self.open(path, None, Sink::Document(on_snapshot), on_error)
    }
}

/// Manager over `store` with the sweeper disabled.
pub fn test_manager(store: &Arc<FakeStore>) -> (ListenerManager, NetworkMonitor) {
    let network = NetworkMonitor::new(true);
    let manager = ListenerManager::new(
        Arc::clone(store) as Arc<dyn DocumentStore>,
        network.clone(),
        SyncConfig::new().without_sweeper(),
    );
    (manager, network)
}

pub type Seen<T> = Arc<Mutex<Vec<T>>>;

/// Callback that appends every value it receives.
pub fn recorder<T: Send + 'static>() -> (Seen<T>, impl Fn(T) + Send + Sync + 'static) {
    let seen: Seen<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: T| sink.lock().push(value))
}

/// Error callback that appends every error it receives.
pub fn error_recorder() -> (Seen<Error>, Option<ErrorCallback>) {
    let (seen, callback) = recorder::<Error>();
    let callback: ErrorCallback = Arc::new(callback);
    (seen, Some(callback))
}

/// Status observer that appends every status it receives.
pub fn status_recorder(
    manager: &ListenerManager,
) -> (Seen<ConnectionStatus>, gallerysync_client::StatusSubscription) {
    let (seen, callback) = recorder::<ConnectionStatus>();
    let subscription = manager.on_connection_status_change(callback);
    (seen, subscription)
}

pub fn tag(id: &str, name: &str) -> RawDocument {
    RawDocument::new(id).with_field("name", name)
}

/// Let spawned tasks observe a state change.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
