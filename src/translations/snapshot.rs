//! Current-snapshot holder for the translation store
//!
//! Readers clone the `Arc` of the published store and keep using it for the
//! whole request. A rebuild publishes a brand-new store with a single pointer
//! swap. Every rebuild is tagged with a generation so that a slow rebuild
//! finishing after a newer one is discarded instead of overwriting it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::store::TranslationStore;

/// Generation handed out when a rebuild starts.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RebuildTicket {
    generation: u64,
}

impl RebuildTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Published {
    generation: u64,
    store: Arc<TranslationStore>,
}

#[derive(Debug)]
pub struct StoreHandle {
    published: RwLock<Published>,
    next_generation: AtomicU64,
    background_rebuild: AtomicBool,
}

impl StoreHandle {
    pub fn new(initial: TranslationStore) -> Self {
        Self {
            published: RwLock::new(Published {
                generation: 0,
                store: Arc::new(initial),
            }),
            next_generation: AtomicU64::new(1),
            background_rebuild: AtomicBool::new(false),
        }
    }

    /// The currently published store.
    pub fn current(&self) -> Arc<TranslationStore> {
        self.published.read().store.clone()
    }

    /// Generation of the currently published store (0 before the first build).
    pub fn published_generation(&self) -> u64 {
        self.published.read().generation
    }

    pub fn begin_rebuild(&self) -> RebuildTicket {
        RebuildTicket {
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Publishes `store` unless a rebuild that started later already did.
    ///
    /// Returns whether the store became current.
    pub fn publish(&self, ticket: RebuildTicket, store: TranslationStore) -> bool {
        let mut published = self.published.write();
        if ticket.generation <= published.generation {
            debug!(
                "Discarding translation store from rebuild {} (generation {} already published)",
                ticket.generation, published.generation
            );
            return false;
        }
        published.generation = ticket.generation;
        published.store = Arc::new(store);
        true
    }

    /// Claims the single background-rebuild slot. Returns `false` if a
    /// background rebuild is already running.
    pub fn try_claim_background(&self) -> bool {
        self.background_rebuild
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_background(&self) {
        self.background_rebuild.store(false, Ordering::Release);
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new(TranslationStore::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translations::store::StoreBuilder;
    use serde_json::json;

    fn store_with(key: &str, value: &str) -> TranslationStore {
        let mut builder = StoreBuilder::new();
        builder.add_document(&json!({ key: value }));
        builder.finish()
    }

    #[test]
    fn test_publish_swaps_current_snapshot() {
        let handle = StoreHandle::default();
        let before = handle.current();
        assert!(before.is_empty());

        let ticket = handle.begin_rebuild();
        assert!(handle.publish(ticket, store_with("a", "1")));

        // Snapshots taken earlier are unaffected by the swap
        assert!(before.is_empty());
        assert_eq!(handle.current().get("a"), Some("1"));
        assert_eq!(handle.published_generation(), 1);
    }

    #[test]
    fn test_older_rebuild_cannot_overwrite_newer() {
        let handle = StoreHandle::default();
        let slow = handle.begin_rebuild();
        let fast = handle.begin_rebuild();
        assert!(slow < fast);

        assert!(handle.publish(fast, store_with("k", "fresh")));
        assert!(!handle.publish(slow, store_with("k", "stale")));
        assert_eq!(handle.current().get("k"), Some("fresh"));
    }

    #[test]
    fn test_background_slot_is_exclusive() {
        let handle = StoreHandle::default();
        assert!(handle.try_claim_background());
        assert!(!handle.try_claim_background());
        handle.release_background();
        assert!(handle.try_claim_background());
    }
}
