//! Scripted walk through the sync layer's lifecycle.
//!
//! Seeds an in-memory store, opens all four feeds, writes a new image, takes
//! the host offline and back, then makes the store unavailable for a while
//! so the reconnect loop has to recover the feeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use gallerysync_client::{
    ConnectionStatus, DocumentStore, Error, ErrorCallback, ListenerManager, MemoryStore,
    NetworkMonitor, PerformanceMetrics, RawDocument, SubscribeOptions, SyncConfig,
};

/// Outcome of a demo run.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub status: ConnectionStatus,
    pub listeners: Vec<String>,
    pub deliveries: usize,
    pub errors: usize,
    pub metrics: PerformanceMetrics,
    pub prometheus: String,
}

/// Fill `store` with a small catalogue.
pub fn seed(store: &MemoryStore) {
    store.put(
        "tagGroups",
        RawDocument::new("g-subject").with_field("name", "Subject"),
    );
    store.put(
        "tagGroups",
        RawDocument::new("g-style").with_field("name", "Style"),
    );
    store.put(
        "tags",
        RawDocument::new("t-portrait")
            .with_field("name", "portrait")
            .with_field("groupId", "g-subject")
            .with_field("color", "#f59e0b"),
    );
    store.put(
        "tags",
        RawDocument::new("t-watercolor")
            .with_field("name", "watercolor")
            .with_field("groupId", "g-style"),
    );
    store.put(
        "images",
        RawDocument::new("img-1")
            .with_field("title", "Harbor at dawn")
            .with_field("prompt", "a quiet harbor at dawn, watercolor")
            .with_field("tags", json!(["t-watercolor"]))
            .with_field("createdAt", json!({"seconds": 1_700_000_000, "nanoseconds": 0})),
    );
}

/// Resolve once the manager reports `target`, or fail after `limit`.
async fn wait_for_status(
    manager: &ListenerManager,
    target: ConnectionStatus,
    limit: Duration,
) -> bool {
    let (tx, mut rx) = watch::channel(manager.status());
    let subscription = manager.on_connection_status_change(move |status| {
        let _ = tx.send(status);
    });

    let reached = tokio::time::timeout(limit, rx.wait_for(|status| *status == target))
        .await
        .is_ok_and(|seen| seen.is_ok());

    subscription.unsubscribe();
    reached
}

/// Run the scripted lifecycle and report the final state.
pub async fn run(config: SyncConfig, offline_for: Duration, outage_for: Duration) -> DemoReport {
    let store = Arc::new(MemoryStore::new());
    seed(&store);

    let network = NetworkMonitor::new(true);
    let reconnect_delay = config.reconnect.initial_delay;
    let manager = ListenerManager::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        network.clone(),
        config,
    );

    let _status = manager.on_connection_status_change(|status| {
        tracing::info!(%status, "status observer");
    });

    let deliveries = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let on_error: ErrorCallback = {
        let errors = Arc::clone(&errors);
        Arc::new(move |err: Error| {
            errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, "feed error");
        })
    };

    let counted = |feed: &'static str| {
        let deliveries = Arc::clone(&deliveries);
        move |len: usize| {
            deliveries.fetch_add(1, Ordering::Relaxed);
            tracing::info!(feed, records = len, "feed update");
        }
    };

    let images = counted("images");
    let _images = manager
        .subscribe_to_images(
            move |records| images(records.len()),
            Some(Arc::clone(&on_error)),
            SubscribeOptions::default(),
        )
        .await;
    let image = counted("image");
    let _image = manager
        .subscribe_to_image(
            "img-2",
            move |record| image(usize::from(record.is_some())),
            Some(Arc::clone(&on_error)),
            SubscribeOptions::default(),
        )
        .await;
    let tags = counted("tags");
    let _tags = manager
        .subscribe_to_tags(
            move |records| tags(records.len()),
            Some(Arc::clone(&on_error)),
            SubscribeOptions::default(),
        )
        .await;
    let groups = counted("tagGroups");
    let _groups = manager
        .subscribe_to_tag_groups(
            move |records| groups(records.len()),
            Some(on_error),
            SubscribeOptions::default(),
        )
        .await;

    store.put(
        "images",
        RawDocument::new("img-2")
            .with_field("title", "Portrait study")
            .with_field("tags", json!(["t-portrait"]))
            .with_field("createdAt", "2024-03-01T12:00:00Z"),
    );

    tracing::info!(offline_ms = offline_for.as_millis() as u64, "taking host offline");
    network.set_online(false);
    tokio::time::sleep(offline_for).await;
    network.set_online(true);
    if !wait_for_status(&manager, ConnectionStatus::Connected, reconnect_delay * 4).await {
        tracing::warn!("feeds did not resume after the host came back");
    }

    tracing::info!(outage_ms = outage_for.as_millis() as u64, "store outage");
    store.set_available(false);
    tokio::time::sleep(outage_for).await;
    store.set_available(true);
    if !wait_for_status(&manager, ConnectionStatus::Connected, reconnect_delay * 8).await {
        tracing::warn!("feeds did not recover from the store outage");
    }

    let report = DemoReport {
        status: manager.status(),
        listeners: manager.active_listeners(),
        deliveries: deliveries.load(Ordering::Relaxed),
        errors: errors.load(Ordering::Relaxed),
        metrics: manager.metrics(),
        prometheus: manager.counters().to_prometheus(),
    };

    manager.destroy();
    report
}
