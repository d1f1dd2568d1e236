//! Connection status and its observers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};

/// Aggregate connectivity of the sync layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// At least one feed has delivered since the last failure.
    Connected,
    /// Offline, failed, or retries exhausted.
    #[default]
    Disconnected,
    /// Waiting out a backoff delay before resuming feeds.
    Reconnecting,
}

impl ConnectionStatus {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct PublisherState {
    current: ConnectionStatus,
    observers: Vec<(u64, StatusCallback)>,
}

/// Single connection-status value plus the callbacks watching it.
///
/// New observers are replayed the current value before `subscribe` returns,
/// and every observer sees transitions in the order they were published.
pub struct StatusPublisher {
    state: Mutex<PublisherState>,
    /// Serializes deliveries. Reentrant so an observer may publish.
    delivery: ReentrantMutex<()>,
    next_observer_id: AtomicU64,
}

impl StatusPublisher {
    /// Create a publisher in the `Disconnected` state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PublisherState {
                current: ConnectionStatus::default(),
                observers: Vec::new(),
            }),
            delivery: ReentrantMutex::new(()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    /// Current status.
    pub fn current(&self) -> ConnectionStatus {
        self.state.lock().current
    }

    /// Publish `status`, notifying observers if it differs from the current one.
    ///
    /// Returns true when the value changed.
    pub fn set(&self, status: ConnectionStatus) -> bool {
        let _delivery = self.delivery.lock();

        let (previous, observers) = {
            let mut state = self.state.lock();
            if state.current == status {
                return false;
            }
            let previous = std::mem::replace(&mut state.current, status);
            let observers: Vec<StatusCallback> =
                state.observers.iter().map(|(_, cb)| Arc::clone(cb)).collect();
            (previous, observers)
        };

        tracing::info!(from = %previous, to = %status, "connection status changed");

        for observer in observers {
            observer(status);
        }
        true
    }

    /// Register `callback`, invoking it with the current status before returning.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> StatusSubscription
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let _delivery = self.delivery.lock();

        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let callback: StatusCallback = Arc::new(callback);

        let current = {
            let mut state = self.state.lock();
            state.observers.push((id, Arc::clone(&callback)));
            state.current
        };

        callback(current);

        StatusSubscription {
            publisher: Arc::downgrade(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Drop every observer.
    pub fn clear_observers(&self) {
        self.state.lock().observers.clear();
    }

    fn remove_observer(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(observer_id, _)| *observer_id != id);
        state.observers.len() != before
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared status publisher handle.
pub type SharedStatusPublisher = Arc<StatusPublisher>;

/// Registration handle returned by [`StatusPublisher::subscribe`].
///
/// Dropping the handle leaves the observer registered.
pub struct StatusSubscription {
    publisher: Weak<StatusPublisher>,
    id: u64,
    active: AtomicBool,
}

impl StatusSubscription {
    /// Remove exactly this observer. Calling again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.remove_observer(self.id);
        }
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
