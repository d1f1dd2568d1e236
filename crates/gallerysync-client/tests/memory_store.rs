//! End-to-end tests of the listener manager over the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use gallerysync_client::{
    ConnectionStatus, DocumentStore, Error, ImageRecord, ListenerManager, MemoryStore,
    NetworkMonitor, RawDocument, SubscribeOptions, SyncConfig, TagGroupRecord, TagRecord,
};

use common::{error_recorder, recorder, tag};

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put(
        "images",
        RawDocument::new("older")
            .with_field("title", "first upload")
            .with_field("createdAt", json!({"_seconds": 1_600_000_000, "_nanoseconds": 0})),
    );
    store.put(
        "images",
        RawDocument::new("newer")
            .with_field("title", "second upload")
            .with_field("createdAt", json!({"seconds": 1_700_000_000, "nanoseconds": 500})),
    );
    store.put("tags", tag("t2", "portrait").with_field("groupId", "g1"));
    store.put("tags", tag("t1", "landscape"));
    store.put("tagGroups", tag("g1", "subject"));
    store
}

fn manager_over(store: &Arc<MemoryStore>) -> ListenerManager {
    ListenerManager::new(
        Arc::clone(store) as Arc<dyn DocumentStore>,
        NetworkMonitor::new(true),
        SyncConfig::new().without_sweeper(),
    )
}

#[tokio::test]
async fn test_all_feeds_deliver_ordered_records() {
    let store = seeded_store();
    let manager = manager_over(&store);

    let (images, on_images) = recorder::<Vec<ImageRecord>>();
    let (image, on_image) = recorder::<Option<ImageRecord>>();
    let (tags, on_tags) = recorder::<Vec<TagRecord>>();
    let (groups, on_groups) = recorder::<Vec<TagGroupRecord>>();

    let _images = manager
        .subscribe_to_images(on_images, None, SubscribeOptions::default())
        .await;
    let _image = manager
        .subscribe_to_image("newer", on_image, None, SubscribeOptions::default())
        .await;
    let _tags = manager
        .subscribe_to_tags(on_tags, None, SubscribeOptions::default())
        .await;
    let _groups = manager
        .subscribe_to_tag_groups(on_groups, None, SubscribeOptions::default())
        .await;

    assert_eq!(manager.status(), ConnectionStatus::Connected);
    assert_eq!(store.watcher_count(), 4);

    let image_ids: Vec<String> = images.lock()[0].iter().map(|i| i.id.clone()).collect();
    assert_eq!(image_ids, vec!["newer", "older"]);

    let newer = image.lock()[0].clone().unwrap();
    assert_eq!(
        newer.created_at,
        DateTime::<Utc>::from_timestamp(1_700_000_000, 500)
    );
    assert_eq!(newer.get("title"), Some(&json!("second upload")));

    let tags = tags.lock()[0].clone();
    assert_eq!(tags[0].name, "landscape");
    assert_eq!(tags[1].name, "portrait");
    assert_eq!(tags[1].group_id.as_deref(), Some("g1"));

    assert_eq!(groups.lock()[0][0].name, "subject");
}

#[tokio::test]
async fn test_writes_and_deletes_flow_through() {
    let store = seeded_store();
    let manager = manager_over(&store);

    let (image, on_image) = recorder::<Option<ImageRecord>>();
    let _image = manager
        .subscribe_to_image("older", on_image, None, SubscribeOptions::default())
        .await;

    store.put("images", RawDocument::new("older").with_field("title", "renamed"));
    store.delete("images", "older");

    let seen = image.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1].as_ref().unwrap().get("title"), Some(&json!("renamed")));
    assert!(seen[2].is_none());
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_recovers_without_losing_writes() {
    let store = seeded_store();
    let manager = manager_over(&store);

    let (tags, on_tags) = recorder::<Vec<TagRecord>>();
    let (errors, on_error) = error_recorder();
    let _tags = manager
        .subscribe_to_tags(on_tags, on_error, SubscribeOptions::default())
        .await;
    assert_eq!(manager.status(), ConnectionStatus::Connected);

    store.set_available(false);

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert!(matches!(errors.lock()[0], Error::TransientConnectivity(_)));

    // Written while nobody is watching.
    store.put("tags", tag("t3", "abstract"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.status(), ConnectionStatus::Reconnecting);
    store.set_available(true);

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(manager.status(), ConnectionStatus::Connected);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(store.watcher_count(), 1);

    let latest: Vec<String> = tags
        .lock()
        .last()
        .unwrap()
        .iter()
        .map(|tag| tag.name.clone())
        .collect();
    assert_eq!(latest, vec!["abstract", "landscape", "portrait"]);
}

#[tokio::test]
async fn test_malformed_document_reported_not_fatal() {
    let store = seeded_store();
    store.put(
        "images",
        RawDocument::new("bad").with_field("createdAt", json!({"seconds": "soon"})),
    );
    let manager = manager_over(&store);

    let (images, on_images) = recorder::<Vec<ImageRecord>>();
    let (errors, on_error) = error_recorder();
    let _images = manager
        .subscribe_to_images(on_images, on_error, SubscribeOptions::default())
        .await;

    assert!(images.lock().is_empty());
    assert!(matches!(errors.lock()[0], Error::MalformedSnapshot(_)));

    store.delete("images", "bad");

    assert_eq!(images.lock().len(), 1);
    assert_eq!(images.lock()[0].len(), 2);
    assert_eq!(store.watcher_count(), 1);
}
