//! The four logical feeds and how their snapshots are translated and cached.

use std::fmt;

use gallerysync_core::record::{translate_collection, FeedRecord};
use gallerysync_core::{CachedSnapshot, Error, ImageRecord, Result, TagGroupRecord, TagRecord};

use crate::store::{OrderSpec, RawSnapshot};

/// Collection holding images.
pub const IMAGES_COLLECTION: &str = "images";
/// Collection holding tags.
pub const TAGS_COLLECTION: &str = "tags";
/// Collection holding tag groups.
pub const TAG_GROUPS_COLLECTION: &str = "tagGroups";

/// Default cache key of the image collection feed.
pub const IMAGES_CACHE_KEY: &str = "images";
/// Default cache key of the tag collection feed.
pub const TAGS_CACHE_KEY: &str = "tags";
/// Default cache key of the tag-group collection feed.
pub const TAG_GROUPS_CACHE_KEY: &str = "tagGroups";

/// A logical subscription target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// All images, newest first.
    Images,
    /// One image by id.
    Image(String),
    /// All tags by name.
    Tags,
    /// All tag groups by name.
    TagGroups,
}

/// Where a feed's snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedTarget {
    Collection { path: &'static str, order: OrderSpec },
    Document { path: String },
}

impl FeedKind {
    /// Stable key used for dedup and cancellation.
    pub fn listener_id(&self) -> String {
        match self {
            FeedKind::Images => IMAGES_COLLECTION.to_string(),
            FeedKind::Image(id) => format!("image-{}", id),
            FeedKind::Tags => TAGS_COLLECTION.to_string(),
            FeedKind::TagGroups => TAG_GROUPS_COLLECTION.to_string(),
        }
    }

    /// Cache key used when the caller does not pass one.
    pub fn default_cache_key(&self) -> String {
        match self {
            FeedKind::Images => IMAGES_CACHE_KEY.to_string(),
            FeedKind::Image(id) => format!("image-{}", id),
            FeedKind::Tags => TAGS_CACHE_KEY.to_string(),
            FeedKind::TagGroups => TAG_GROUPS_CACHE_KEY.to_string(),
        }
    }

    /// Store path and ordering.
    pub fn target(&self) -> FeedTarget {
        match self {
            FeedKind::Images => FeedTarget::Collection {
                path: IMAGES_COLLECTION,
                order: OrderSpec::desc("createdAt"),
            },
            FeedKind::Image(id) => FeedTarget::Document {
                path: format!("{}/{}", IMAGES_COLLECTION, id),
            },
            FeedKind::Tags => FeedTarget::Collection {
                path: TAGS_COLLECTION,
                order: OrderSpec::asc("name"),
            },
            FeedKind::TagGroups => FeedTarget::Collection {
                path: TAG_GROUPS_COLLECTION,
                order: OrderSpec::asc("name"),
            },
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.listener_id())
    }
}

/// The value a feed hands to its consumer.
pub trait FeedValue: Clone + Send + Sync + 'static {
    /// Translate a raw push into this value.
    fn translate(raw: RawSnapshot) -> Result<Self>;

    /// Wrap for the shared cache.
    fn into_cached(self) -> CachedSnapshot;

    /// Unwrap from the shared cache; `None` if the entry belongs to another feed.
    fn from_cached(cached: CachedSnapshot) -> Option<Self>;
}

fn expect_collection<R: FeedRecord>(raw: RawSnapshot) -> Result<Vec<R>> {
    match raw {
        RawSnapshot::Collection(docs) => translate_collection(docs),
        RawSnapshot::Document(_) => Err(Error::malformed(
            R::FEED,
            "expected a collection snapshot, got a document",
        )),
    }
}

impl FeedValue for Vec<ImageRecord> {
    fn translate(raw: RawSnapshot) -> Result<Self> {
        expect_collection(raw)
    }

    fn into_cached(self) -> CachedSnapshot {
        CachedSnapshot::Images(self)
    }

    fn from_cached(cached: CachedSnapshot) -> Option<Self> {
        match cached {
            CachedSnapshot::Images(images) => Some(images),
            _ => None,
        }
    }
}

impl FeedValue for Option<ImageRecord> {
    fn translate(raw: RawSnapshot) -> Result<Self> {
        match raw {
            RawSnapshot::Document(doc) => doc.map(ImageRecord::from_document).transpose(),
            RawSnapshot::Collection(_) => Err(Error::malformed(
                ImageRecord::FEED,
                "expected a document snapshot, got a collection",
            )),
        }
    }

    fn into_cached(self) -> CachedSnapshot {
        CachedSnapshot::Image(self)
    }

    fn from_cached(cached: CachedSnapshot) -> Option<Self> {
        match cached {
            CachedSnapshot::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl FeedValue for Vec<TagRecord> {
    fn translate(raw: RawSnapshot) -> Result<Self> {
        expect_collection(raw)
    }

    fn into_cached(self) -> CachedSnapshot {
        CachedSnapshot::Tags(self)
    }

    fn from_cached(cached: CachedSnapshot) -> Option<Self> {
        match cached {
            CachedSnapshot::Tags(tags) => Some(tags),
            _ => None,
        }
    }
}

impl FeedValue for Vec<TagGroupRecord> {
    fn translate(raw: RawSnapshot) -> Result<Self> {
        expect_collection(raw)
    }

    fn into_cached(self) -> CachedSnapshot {
        CachedSnapshot::TagGroups(self)
    }

    fn from_cached(cached: CachedSnapshot) -> Option<Self> {
        match cached {
            CachedSnapshot::TagGroups(groups) => Some(groups),
            _ => None,
        }
    }
}
