//! Listener manager: deduplicated live feeds over a remote document store.
//!
//! Every `subscribe_to_*` call derives a listener id from its feed, replaces
//! any listener already registered under that id, serves the cached snapshot
//! first when caching is enabled, and then opens the store subscription.
//! Live snapshots refresh the cache, mark the connection `Connected`, and
//! feed the performance counters. Subscription errors mark it
//! `Disconnected` and arm the reconnect loop.
//!
//! # Reconnecting
//!
//! The manager keeps an opener for every registered listener. After a
//! subscription error while the host is online, or an offline to online
//! transition while disconnected, a background task waits out the backoff
//! delay and re-opens every listener. A re-open only counts once a listener
//! delivers a snapshot: until then the status stays `Reconnecting` and the
//! backoff keeps its attempt count, so a store that accepts subscriptions and
//! then fails them still backs off. After `max_attempts` consecutive failures
//! the status stays `Disconnected` until the host next comes online.
//! Listeners whose re-open failed stay registered and are retried on the
//! next pass.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use gallerysync_core::{
    CachedSnapshot, ConnectionStatus, ImageRecord, PerformanceMetrics, SharedPerformanceCounters,
    SharedTtlCache, StatusSubscription, TagGroupRecord, TagRecord,
};

use crate::backoff::{Backoff, BackoffStep};
use crate::config::{ReconnectPolicy, SyncConfig};
use crate::context::SyncContext;
use crate::error::{Error, StoreError};
use crate::feed::{FeedKind, FeedTarget, FeedValue};
use crate::network::NetworkMonitor;
use crate::registry::{Opener, SubscriptionRegistry};
use crate::store::{
    CollectionCallback, DocumentCallback, RawSnapshot, SharedDocumentStore, StoreErrorCallback,
    StoreSubscription,
};

/// Receives a feed's translated snapshots.
pub type UpdateCallback<V> = Arc<dyn Fn(V) + Send + Sync>;

/// Receives a feed's errors.
pub type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// Per-call subscription options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Serve and refresh the cached snapshot. Defaults to true.
    pub enable_cache: bool,
    /// Cache key; defaults to the feed's own key.
    pub cache_key: Option<String>,
    /// TTL for snapshots this listener caches; defaults to the cache's TTL.
    pub cache_ttl: Option<Duration>,
}

impl SubscribeOptions {
    /// Caching enabled under the feed's default key and TTL.
    pub fn new() -> Self {
        Self {
            enable_cache: true,
            cache_key: None,
            cache_ttl: None,
        }
    }

    /// Skip the cache entirely.
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    /// Cache under `key`.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Cache with `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// One registered consumer of a feed.
struct Listener<V> {
    id: String,
    feed: FeedKind,
    cache_key: String,
    options: SubscribeOptions,
    on_update: UpdateCallback<V>,
    on_error: Option<ErrorCallback>,
}

impl<V: FeedValue> Listener<V> {
    fn report(&self, err: Error) {
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
    }

    /// Handle a live snapshot pushed for `generation`.
    fn deliver(&self, inner: &ManagerInner, generation: u64, opened_at: Instant, raw: RawSnapshot) {
        if !inner.registry.is_current(&self.id, generation) {
            tracing::trace!(listener = %self.id, generation, "ignoring stale snapshot");
            return;
        }

        let value = match V::translate(raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(listener = %self.id, error = %err, "malformed snapshot");
                inner.context.counters.record_outcome(true, None);
                self.report(Error::from(err));
                return;
            }
        };

        if self.options.enable_cache {
            inner.context.cache.set(
                self.cache_key.clone(),
                value.clone().into_cached(),
                self.options.cache_ttl,
            );
        }
        if inner.network.is_online() {
            inner.context.status.set(ConnectionStatus::Connected);
        }
        inner
            .context
            .counters
            .record_outcome(false, Some(opened_at.elapsed()));
        inner.record_delivery(&self.id);

        (self.on_update)(value);
    }

    /// Handle a subscription failure for `generation`.
    fn fail(&self, inner: &Arc<ManagerInner>, generation: u64, err: StoreError) {
        if !inner.registry.is_current(&self.id, generation) {
            tracing::trace!(listener = %self.id, generation, "ignoring stale error");
            return;
        }

        tracing::warn!(listener = %self.id, feed = %self.feed, error = %err, "subscription error");
        inner.context.status.set(ConnectionStatus::Disconnected);
        inner.context.counters.record_outcome(true, None);
        self.report(Error::from_store(err.clone()));

        inner.record_error(&self.id, &err);
    }
}

/// Build the function that opens (and later re-opens) `listener`'s store subscription.
fn make_opener<V: FeedValue>(inner: Weak<ManagerInner>, listener: Arc<Listener<V>>) -> Opener {
    Arc::new(move |generation: u64| -> BoxFuture<'static, Result<StoreSubscription, StoreError>> {
        let inner = inner.clone();
        let listener = Arc::clone(&listener);

        async move {
            let Some(store) = inner.upgrade().map(|manager| Arc::clone(&manager.store)) else {
                return Ok(StoreSubscription::noop());
            };
            let opened_at = Instant::now();

            let on_error: StoreErrorCallback = {
                let inner = inner.clone();
                let listener = Arc::clone(&listener);
                Arc::new(move |err| {
                    if let Some(inner) = inner.upgrade() {
                        listener.fail(&inner, generation, err);
                    }
                })
            };

            tracing::debug!(listener = %listener.id, generation, "opening subscription");

            match listener.feed.target() {
                FeedTarget::Collection { path, order } => {
                    let on_snapshot: CollectionCallback = {
                        let inner = inner.clone();
                        let listener = Arc::clone(&listener);
                        Arc::new(move |docs| {
                            if let Some(inner) = inner.upgrade() {
                                listener.deliver(
                                    &inner,
                                    generation,
                                    opened_at,
                                    RawSnapshot::Collection(docs),
                                );
                            }
                        })
                    };
                    store
                        .subscribe_collection(path, order, on_snapshot, on_error)
                        .await
                }
                FeedTarget::Document { path } => {
                    let on_snapshot: DocumentCallback = {
                        let inner = inner.clone();
                        let listener = Arc::clone(&listener);
                        Arc::new(move |doc| {
                            if let Some(inner) = inner.upgrade() {
                                listener.deliver(
                                    &inner,
                                    generation,
                                    opened_at,
                                    RawSnapshot::Document(doc),
                                );
                            }
                        })
                    };
                    store.subscribe_document(&path, on_snapshot, on_error).await
                }
            }
        }
        .boxed()
    })
}

struct ManagerInner {
    store: SharedDocumentStore,
    context: SyncContext,
    registry: SubscriptionRegistry,
    network: NetworkMonitor,
    reconnect: Mutex<ReconnectState>,
    runtime: Handle,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// Reconnect passes in progress, background or caller-driven.
    reconnecting: Arc<AtomicUsize>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// How far the latest reconnect pass got.
#[derive(Debug, Default)]
enum ResumePhase {
    #[default]
    Idle,
    /// Listeners are being re-opened.
    Reopening {
        delivered: bool,
        error: Option<StoreError>,
    },
    /// Every listener re-opened, but the ones that failed have not delivered since.
    Unconfirmed,
}

/// Backoff and resume bookkeeping, always locked together.
struct ReconnectState {
    backoff: Backoff,
    phase: ResumePhase,
    /// Listeners whose latest outcome was a store error.
    failing: HashSet<String>,
}

impl ReconnectState {
    fn new(policy: ReconnectPolicy) -> Self {
        Self {
            backoff: Backoff::new(policy),
            phase: ResumePhase::Idle,
            failing: HashSet::new(),
        }
    }

    /// Start the next failure from the initial delay.
    fn reset(&mut self) {
        self.backoff.reset();
        self.phase = ResumePhase::Idle;
    }

    fn prune(&mut self, registry: &SubscriptionRegistry) {
        self.failing.retain(|id| registry.contains(id));
    }
}

/// Marks a reconnect pass as running until released or dropped, including on abort.
struct ReconnectingGuard {
    counter: Arc<AtomicUsize>,
    released: bool,
}

impl ReconnectingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self {
            counter: Arc::clone(counter),
            released: false,
        }
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.released, true) {
            self.counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for ReconnectingGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl ManagerInner {
    fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Acquire) > 0
    }

    /// Note a live snapshot from `id`.
    ///
    /// Once no listener is left failing the store counts as reachable and the
    /// backoff starts over. A running pass makes that call itself.
    fn record_delivery(&self, id: &str) {
        let mut state = self.reconnect.lock();
        state.failing.remove(id);
        if self.is_reconnecting() {
            if let ResumePhase::Reopening { delivered, .. } = &mut state.phase {
                *delivered = true;
            }
            return;
        }

        state.prune(&self.registry);
        if state.failing.is_empty() {
            state.reset();
        }
    }

    /// Note a store error from `id` and retry unless a running pass will.
    ///
    /// An error after an unconfirmed re-open is a failed attempt.
    fn record_error(self: &Arc<Self>, id: &str, err: &StoreError) {
        let step = {
            let mut state = self.reconnect.lock();
            state.failing.insert(id.to_string());
            if self.is_reconnecting() {
                if let ResumePhase::Reopening { error, .. } = &mut state.phase {
                    error.get_or_insert_with(|| err.clone());
                }
                return;
            }
            match std::mem::take(&mut state.phase) {
                ResumePhase::Unconfirmed => Some(state.backoff.record_failure()),
                _ => None,
            }
        };

        match step {
            Some(BackoffStep::Retry {
                attempts,
                next_delay,
            }) => {
                tracing::warn!(
                    listener = id,
                    attempts,
                    next_delay_ms = next_delay.as_millis() as u64,
                    "re-opened listener failed before delivering"
                );
            }
            Some(BackoffStep::Exhausted { attempts }) => {
                tracing::warn!(listener = id, attempts, "giving up reconnecting");
                return;
            }
            None => {}
        }
        self.arm_reconnect();
    }

    /// Start the reconnect loop after a subscription error, unless one is
    /// already running, the host is offline, or retries are exhausted.
    fn arm_reconnect(self: &Arc<Self>) {
        if !self.network.is_online() {
            tracing::debug!("host offline, reconnect deferred until online");
            return;
        }
        if self.reconnect.lock().backoff.is_exhausted() {
            tracing::debug!("reconnect attempts exhausted, waiting for online transition");
            return;
        }

        let mut task = self.reconnect_task.lock();
        if self.is_reconnecting() {
            return;
        }
        *task = Some(self.spawn_reconnect());
    }

    fn spawn_reconnect(self: &Arc<Self>) -> JoinHandle<()> {
        let pass = ReconnectingGuard::enter(&self.reconnecting);
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            if let Err(err) = inner.run_reconnect(pass).await {
                tracing::debug!(error = %err, "reconnect loop stopped");
            }
        })
    }

    fn abort_reconnect(&self) {
        if let Some(task) = self.reconnect_task.lock().take() {
            task.abort();
        }
    }

    /// Back off, then re-open every listener until it works or attempts run out.
    ///
    /// `pass` is released in the same critical section that settles the
    /// outcome, so an error racing the end of the pass is never lost.
    async fn run_reconnect(self: &Arc<Self>, mut pass: ReconnectingGuard) -> Result<usize, Error> {
        loop {
            let (attempts, delay, exhausted) = {
                let state = self.reconnect.lock();
                let backoff = &state.backoff;
                (backoff.attempts(), backoff.delay(), backoff.is_exhausted())
            };
            if exhausted {
                self.context.status.set(ConnectionStatus::Disconnected);
                return Err(Error::ExhaustedRetries { attempts });
            }
            if !self.network.is_online() {
                self.context.status.set(ConnectionStatus::Disconnected);
                return Err(Error::Offline);
            }

            self.context.status.set(ConnectionStatus::Reconnecting);
            tracing::info!(
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.network.wait_offline() => {
                    tracing::info!("host went offline during backoff");
                    self.context.status.set(ConnectionStatus::Disconnected);
                    return Err(Error::Offline);
                }
            }

            self.reconnect.lock().phase = ResumePhase::Reopening {
                delivered: false,
                error: None,
            };
            let outcome = self.resume_all().await;

            if !self.network.is_online() {
                tracing::info!("host went offline while re-opening listeners");
                self.reconnect.lock().phase = ResumePhase::Idle;
                self.context.status.set(ConnectionStatus::Disconnected);
                return Err(Error::Offline);
            }

            let settled = {
                let mut state = self.reconnect.lock();
                let (delivered, late_error) = match std::mem::take(&mut state.phase) {
                    ResumePhase::Reopening { delivered, error } => (delivered, error),
                    _ => (false, None),
                };
                match (outcome, late_error) {
                    (Ok(resumed), None) => {
                        state.prune(&self.registry);
                        let confirmed = state.failing.is_empty() && (resumed == 0 || delivered);
                        if confirmed {
                            state.reset();
                        } else {
                            state.phase = ResumePhase::Unconfirmed;
                        }
                        pass.release();
                        Ok((resumed, confirmed))
                    }
                    (Ok(_), Some(err)) => {
                        Err((Error::from_store(err), state.backoff.record_failure()))
                    }
                    (Err(err), _) => Err((err, state.backoff.record_failure())),
                }
            };

            match settled {
                Ok((resumed, false)) => {
                    tracing::info!(resumed, "listeners re-opened, waiting for a snapshot");
                    return Ok(resumed);
                }
                Ok((resumed, true)) => {
                    self.context.status.set(ConnectionStatus::Connected);
                    if !self.network.is_online() {
                        self.context.status.set(ConnectionStatus::Disconnected);
                        return Err(Error::Offline);
                    }
                    tracing::info!(resumed, "reconnected");
                    return Ok(resumed);
                }
                Err((
                    err,
                    BackoffStep::Retry {
                        attempts,
                        next_delay,
                    },
                )) => {
                    tracing::warn!(
                        attempts,
                        next_delay_ms = next_delay.as_millis() as u64,
                        error = %err,
                        "reconnect attempt failed"
                    );
                }
                Err((err, BackoffStep::Exhausted { attempts })) => {
                    tracing::warn!(attempts, error = %err, "giving up reconnecting");
                    self.context.status.set(ConnectionStatus::Disconnected);
                    return Err(Error::ExhaustedRetries { attempts });
                }
            }
        }
    }

    /// Re-open every registered listener.
    ///
    /// Every listener is attempted; the first failure is returned.
    async fn resume_all(&self) -> Result<usize, Error> {
        let mut resumed = 0;
        let mut first_error = None;

        for (id, opener) in self.registry.openers() {
            let Some(generation) = self.registry.renew(&id) else {
                continue;
            };
            match opener(generation).await {
                Ok(handle) => {
                    if self.registry.attach(&id, generation, handle) {
                        resumed += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(listener = %id, error = %err, "failed to resume listener");
                    first_error.get_or_insert(Error::from_store(err));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(resumed),
        }
    }

    fn handle_online(self: &Arc<Self>) {
        tracing::info!("host online");
        if self.context.status.current() != ConnectionStatus::Disconnected {
            return;
        }

        self.reconnect.lock().reset();
        let mut task = self.reconnect_task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = Some(self.spawn_reconnect());
    }

    fn handle_offline(&self) {
        tracing::info!("host offline");
        self.abort_reconnect();
        self.context.status.set(ConnectionStatus::Disconnected);
    }
}

fn spawn_network_watcher(
    inner: Weak<ManagerInner>,
    network: &NetworkMonitor,
    runtime: &Handle,
) -> JoinHandle<()> {
    let mut rx = network.subscribe();

    runtime.spawn(async move {
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if online {
                inner.handle_online();
            } else {
                inner.handle_offline();
            }
        }
    })
}

/// Orchestrates every live feed of the application.
///
/// Create one per application with [`ListenerManager::new`] and share it
/// behind an `Arc`. Dropping the manager stops its background tasks and
/// cancels every open store subscription.
pub struct ListenerManager {
    inner: Arc<ManagerInner>,
}

impl ListenerManager {
    /// Create a manager with a fresh [`SyncContext`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(store: SharedDocumentStore, network: NetworkMonitor, config: SyncConfig) -> Self {
        let context = SyncContext::new(&config);
        Self::with_context(store, network, context, config)
    }

    /// Create a manager over an existing context.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_context(
        store: SharedDocumentStore,
        network: NetworkMonitor,
        context: SyncContext,
        config: SyncConfig,
    ) -> Self {
        let runtime = Handle::current();

        let inner = Arc::new(ManagerInner {
            store,
            context,
            registry: SubscriptionRegistry::new(),
            network,
            reconnect: Mutex::new(ReconnectState::new(config.reconnect.clone())),
            runtime,
            reconnect_task: Mutex::new(None),
            reconnecting: Arc::new(AtomicUsize::new(0)),
            background: Mutex::new(Vec::new()),
        });

        let mut background = Vec::new();
        if let Some(interval) = config.sweep_interval {
            background.push(inner.context.cache.spawn_sweeper(interval));
        }
        background.push(spawn_network_watcher(
            Arc::downgrade(&inner),
            &inner.network,
            &inner.runtime,
        ));
        *inner.background.lock() = background;

        tracing::debug!(
            online = inner.network.is_online(),
            sweep_interval_ms = config.sweep_interval.map(|i| i.as_millis() as u64),
            "listener manager started"
        );

        Self { inner }
    }

    /// Watch every image, newest first.
    pub async fn subscribe_to_images<F>(
        &self,
        on_update: F,
        on_error: Option<ErrorCallback>,
        options: SubscribeOptions,
    ) -> Unsubscribe
    where
        F: Fn(Vec<ImageRecord>) + Send + Sync + 'static,
    {
        self.subscribe::<Vec<ImageRecord>>(FeedKind::Images, Arc::new(on_update), on_error, options)
            .await
    }

    /// Watch one image. A missing image is delivered as `None`.
    pub async fn subscribe_to_image<F>(
        &self,
        image_id: &str,
        on_update: F,
        on_error: Option<ErrorCallback>,
        options: SubscribeOptions,
    ) -> Unsubscribe
    where
        F: Fn(Option<ImageRecord>) + Send + Sync + 'static,
    {
        self.subscribe::<Option<ImageRecord>>(
            FeedKind::Image(image_id.to_string()),
            Arc::new(on_update),
            on_error,
            options,
        )
        .await
    }

    /// Watch every tag, by name.
    pub async fn subscribe_to_tags<F>(
        &self,
        on_update: F,
        on_error: Option<ErrorCallback>,
        options: SubscribeOptions,
    ) -> Unsubscribe
    where
        F: Fn(Vec<TagRecord>) + Send + Sync + 'static,
    {
        self.subscribe::<Vec<TagRecord>>(FeedKind::Tags, Arc::new(on_update), on_error, options)
            .await
    }

    /// Watch every tag group, by name.
    pub async fn subscribe_to_tag_groups<F>(
        &self,
        on_update: F,
        on_error: Option<ErrorCallback>,
        options: SubscribeOptions,
    ) -> Unsubscribe
    where
        F: Fn(Vec<TagGroupRecord>) + Send + Sync + 'static,
    {
        self.subscribe::<Vec<TagGroupRecord>>(
            FeedKind::TagGroups,
            Arc::new(on_update),
            on_error,
            options,
        )
        .await
    }

    async fn subscribe<V: FeedValue>(
        &self,
        feed: FeedKind,
        on_update: UpdateCallback<V>,
        on_error: Option<ErrorCallback>,
        options: SubscribeOptions,
    ) -> Unsubscribe {
        let inner = &self.inner;
        let id = feed.listener_id();
        let cache_key = options
            .cache_key
            .clone()
            .unwrap_or_else(|| feed.default_cache_key());

        let listener = Arc::new(Listener {
            id: id.clone(),
            feed,
            cache_key,
            options,
            on_update,
            on_error,
        });

        let opener = make_opener(Arc::downgrade(inner), Arc::clone(&listener));
        let (generation, replaced) = inner.registry.install(&id, Arc::clone(&opener));
        tracing::debug!(listener = %id, generation, replaced, "listener installed");

        let unsubscribe = Unsubscribe {
            inner: Arc::downgrade(inner),
            id: id.clone(),
            owner: generation,
            active: AtomicBool::new(true),
        };

        if listener.options.enable_cache {
            self.deliver_cached(&listener);
            if !inner.registry.is_current(&id, generation) {
                return unsubscribe;
            }
        }

        match opener(generation).await {
            Ok(handle) => {
                inner.registry.attach(&id, generation, handle);
            }
            Err(err) => listener.fail(inner, generation, err),
        }

        unsubscribe
    }

    fn deliver_cached<V: FeedValue>(&self, listener: &Listener<V>) {
        let context = &self.inner.context;
        let cached = context
            .cache
            .get(&listener.cache_key)
            .and_then(V::from_cached);

        match cached {
            Some(value) => {
                tracing::trace!(listener = %listener.id, key = %listener.cache_key, "cache hit");
                context.counters.record_cache_hit();
                (listener.on_update)(value);
            }
            None => {
                tracing::trace!(listener = %listener.id, key = %listener.cache_key, "cache miss");
                context.counters.record_cache_miss();
            }
        }
    }

    /// Register a connection-status observer.
    ///
    /// The observer is called with the current status before this returns.
    pub fn on_connection_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.inner.context.status.subscribe(callback)
    }

    /// Cancel the listener registered under `listener_id`.
    pub fn unsubscribe(&self, listener_id: &str) -> bool {
        let removed = self.inner.registry.remove(listener_id);
        if removed {
            tracing::debug!(listener = listener_id, "listener cancelled");
        }
        removed
    }

    /// Cancel every listener, returning how many were live.
    pub fn unsubscribe_all(&self) -> usize {
        let removed = self.inner.registry.clear();
        tracing::debug!(removed, "all listeners cancelled");
        removed
    }

    /// Tear down: stop reconnecting, cancel every listener, drop every status
    /// observer, and clear the cache. Counters are kept.
    pub fn destroy(&self) {
        self.inner.abort_reconnect();
        let removed = self.unsubscribe_all();
        {
            let mut state = self.inner.reconnect.lock();
            state.failing.clear();
            state.reset();
        }
        self.inner.context.status.clear_observers();
        self.inner.context.cache.clear();
        tracing::info!(removed, "listener manager destroyed");
    }

    /// Run the reconnect loop now and wait for its outcome.
    ///
    /// Resets the backoff first, replacing any loop already in flight.
    /// Returns the number of listeners re-opened, or [`Error::Offline`] if
    /// the host went offline before the pass finished. The status becomes
    /// `Connected` once a re-opened listener delivers.
    pub async fn reconnect(&self) -> Result<usize, Error> {
        let pass = {
            let mut task = self.inner.reconnect_task.lock();
            if let Some(previous) = task.take() {
                previous.abort();
            }
            self.inner.reconnect.lock().reset();
            ReconnectingGuard::enter(&self.inner.reconnecting)
        };
        self.inner.run_reconnect(pass).await
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.context.status.current()
    }

    /// Copy of the performance counters.
    pub fn metrics(&self) -> PerformanceMetrics {
        self.inner.context.counters.snapshot()
    }

    /// Shared performance counters.
    pub fn counters(&self) -> &SharedPerformanceCounters {
        &self.inner.context.counters
    }

    /// Shared snapshot cache.
    pub fn cache(&self) -> &SharedTtlCache<CachedSnapshot> {
        &self.inner.context.cache
    }

    /// Shared context.
    pub fn context(&self) -> &SyncContext {
        &self.inner.context
    }

    /// Host network signal this manager follows.
    pub fn network(&self) -> &NetworkMonitor {
        &self.inner.network
    }

    /// Whether the host reports itself online.
    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    /// Ids of every registered listener, sorted.
    pub fn active_listeners(&self) -> Vec<String> {
        self.inner.registry.ids()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Consecutive failed reconnect attempts.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect.lock().backoff.attempts()
    }

    /// Delay before the next reconnect attempt.
    pub fn reconnect_delay(&self) -> Duration {
        self.inner.reconnect.lock().backoff.delay()
    }
}

impl Drop for ListenerManager {
    fn drop(&mut self) {
        self.inner.abort_reconnect();
        for task in self.inner.background.lock().drain(..) {
            task.abort();
        }
        self.inner.registry.clear();
    }
}

/// Shared listener manager handle.
pub type SharedListenerManager = Arc<ListenerManager>;

/// Cancel handle returned by the `subscribe_to_*` methods.
///
/// Removes only the listener it was returned for: if a later call replaced
/// that listener, unsubscribing is a no-op. Safe to call more than once and
/// from inside the listener's own callbacks. Dropping the handle leaves the
/// listener registered.
pub struct Unsubscribe {
    inner: Weak<ManagerInner>,
    id: String,
    owner: u64,
    active: AtomicBool,
}

impl Unsubscribe {
    /// Cancel the listener. Returns true if this call removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let removed = inner.registry.remove_if_owner(&self.id, self.owner);
        if removed {
            tracing::debug!(listener = %self.id, "listener unsubscribed");
        }
        removed
    }

    /// Listener id this handle cancels.
    pub fn listener_id(&self) -> &str {
        &self.id
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("listener", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_options_default_enables_cache() {
        let options = SubscribeOptions::default();
        assert!(options.enable_cache);
        assert!(options.cache_key.is_none());
        assert!(options.cache_ttl.is_none());
    }

    #[test]
    fn test_subscribe_options_builder() {
        let options = SubscribeOptions::new()
            .with_cache_key("gallery-home")
            .with_cache_ttl(Duration::from_secs(30));
        assert_eq!(options.cache_key.as_deref(), Some("gallery-home"));
        assert_eq!(options.cache_ttl, Some(Duration::from_secs(30)));

        assert!(!SubscribeOptions::new().without_cache().enable_cache);
    }
}
