//! Live subscriptions keyed by listener id.
//!
//! At most one slot exists per id. Every install or resume bumps the slot's
//! generation, and store callbacks carry the generation they were opened
//! for, so deliveries from a superseded subscription are ignored. The
//! generation assigned at install also becomes the slot's owner token,
//! which stays fixed across resumes and lets an unsubscribe handle remove
//! only the listener it was returned for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::error::StoreError;
use crate::store::StoreSubscription;

/// Re-opens a listener's store subscription for the given generation.
pub type Opener =
    Arc<dyn Fn(u64) -> BoxFuture<'static, Result<StoreSubscription, StoreError>> + Send + Sync>;

struct ListenerSlot {
    owner: u64,
    generation: u64,
    handle: Option<StoreSubscription>,
    opener: Opener,
}

/// Map from listener id to its live store subscription.
///
/// Store handles are always cancelled after the map guard is released.
pub struct SubscriptionRegistry {
    slots: DashMap<String, ListenerSlot>,
    next_generation: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Claim the slot for `id`, cancelling whatever held it before.
    ///
    /// Returns the new generation, which is also the owner token, and whether
    /// an older subscription was replaced.
    pub fn install(&self, id: &str, opener: Opener) -> (u64, bool) {
        let generation = self.next_generation();
        let slot = ListenerSlot {
            owner: generation,
            generation,
            handle: None,
            opener,
        };

        let previous = self.slots.insert(id.to_string(), slot);
        let replaced = previous.is_some();
        if let Some(previous) = previous {
            tracing::debug!(
                listener = id,
                old_generation = previous.generation,
                generation,
                "replacing existing listener"
            );
            drop(previous);
        }
        (generation, replaced)
    }

    /// Attach an opened store handle to the slot.
    ///
    /// If the slot was removed or superseded meanwhile, the handle is cancelled
    /// and false is returned.
    pub fn attach(&self, id: &str, generation: u64, handle: StoreSubscription) -> bool {
        let outcome = match self.slots.get_mut(id) {
            Some(mut slot) if slot.generation == generation => Ok(slot.handle.replace(handle)),
            _ => Err(handle),
        };
        match outcome {
            Ok(displaced) => {
                drop(displaced);
                true
            }
            Err(stale) => {
                tracing::debug!(listener = id, generation, "discarding stale subscription");
                stale.cancel();
                false
            }
        }
    }

    /// Start a new generation for `id`, cancelling its current handle.
    ///
    /// Returns `None` if the listener no longer exists.
    pub fn renew(&self, id: &str) -> Option<u64> {
        let generation = self.next_generation();
        let old = {
            let mut slot = self.slots.get_mut(id)?;
            slot.generation = generation;
            slot.handle.take()
        };
        drop(old);
        Some(generation)
    }

    /// Remove `id` regardless of generation. Returns true if it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.slots.remove(id).is_some()
    }

    /// Remove `id` only if it is still owned by `owner`.
    pub fn remove_if_owner(&self, id: &str, owner: u64) -> bool {
        self.slots
            .remove_if(id, |_, slot| slot.owner == owner)
            .is_some()
    }

    /// Remove every listener, returning how many there were.
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter(|id| self.slots.remove(id.as_str()).is_some()).count()
    }

    /// Whether `generation` is the live generation of `id`.
    pub fn is_current(&self, id: &str, generation: u64) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Whether a listener is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Openers of every listener, for resuming after a reconnect.
    pub fn openers(&self) -> Vec<(String, Opener)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.opener)))
            .collect()
    }

    /// Sorted listener ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;

    fn noop_opener() -> Opener {
        Arc::new(|_generation: u64| async { Ok::<_, StoreError>(StoreSubscription::noop()) }.boxed())
    }

    fn counted(cancels: &Arc<AtomicUsize>) -> StoreSubscription {
        let cancels = Arc::clone(cancels);
        StoreSubscription::new(move || {
            cancels.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_install_and_attach() {
        let registry = SubscriptionRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));
        let (generation, replaced) = registry.install("tags", noop_opener());

        assert!(!replaced);
        assert!(registry.contains("tags"));
        assert!(!registry.contains("images"));
        assert!(registry.is_current("tags", generation));

        assert!(registry.attach("tags", generation, counted(&cancels)));
        assert_eq!(cancels.load(Ordering::SeqCst), 0);

        assert!(registry.remove("tags"));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(!registry.contains("tags"));
    }

    #[test]
    fn test_install_cancels_previous_once() {
        let registry = SubscriptionRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        let (first, _) = registry.install("tags", noop_opener());
        registry.attach("tags", first, counted(&cancels));

        let (second, replaced) = registry.install("tags", noop_opener());

        assert!(replaced);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(!registry.is_current("tags", first));
        assert!(registry.is_current("tags", second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_attach_is_cancelled() {
        let registry = SubscriptionRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        let (first, _) = registry.install("images", noop_opener());
        registry.install("images", noop_opener());

        assert!(!registry.attach("images", first, counted(&cancels)));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(registry.contains("images"));
    }

    #[test]
    fn test_remove_if_owner_ignores_replaced_listener() {
        let registry = SubscriptionRegistry::new();
        let (first, _) = registry.install("tags", noop_opener());
        let (second, _) = registry.install("tags", noop_opener());

        assert!(!registry.remove_if_owner("tags", first));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove_if_owner("tags", second));
        assert!(!registry.remove_if_owner("tags", second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_owner_survives_renew() {
        let registry = SubscriptionRegistry::new();
        let (owner, _) = registry.install("images", noop_opener());

        let renewed = registry.renew("images").unwrap();

        assert!(!registry.is_current("images", owner));
        assert!(registry.is_current("images", renewed));
        assert!(registry.remove_if_owner("images", owner));
    }

    #[test]
    fn test_renew_cancels_handle_and_bumps_generation() {
        let registry = SubscriptionRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));
        let (first, _) = registry.install("tags", noop_opener());
        registry.attach("tags", first, counted(&cancels));

        let renewed = registry.renew("tags").unwrap();

        assert_ne!(renewed, first);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(registry.is_current("tags", renewed));
        assert!(registry.renew("missing").is_none());
    }

    #[test]
    fn test_clear_cancels_everything() {
        let registry = SubscriptionRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));
        for id in ["images", "tags"] {
            let (generation, _) = registry.install(id, noop_opener());
            registry.attach(id, generation, counted(&cancels));
        }

        assert_eq!(registry.ids(), vec!["images".to_string(), "tags".to_string()]);
        assert_eq!(registry.clear(), 2);
        assert_eq!(cancels.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }
}
