//! Pending confirmations
//!
//! Risky commands store the operation they would perform and only run it when
//! the same user confirms. Entries are keyed by user and command, and a newer
//! entry for the same key replaces the older one.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// A deferred operation waiting for its confirmation
#[derive(Debug, Clone)]
pub struct PendingConfirmation<T> {
    pub action: T,
    pub created_at: DateTime<Utc>,
}

impl<T> PendingConfirmation<T> {
    fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| self.created_at + ttl <= now)
    }
}

/// Shared registry of pending confirmations
#[derive(Debug, Clone)]
pub struct ConfirmationRegistry<T> {
    pending: Arc<DashMap<(u64, String), PendingConfirmation<T>>>,
    ttl: Option<Duration>,
}

impl<T> Default for ConfirmationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConfirmationRegistry<T> {
    /// A registry whose entries never expire
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl: None,
        }
    }

    /// A registry whose entries are ignored once older than `ttl`
    #[must_use]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            ..Self::new()
        }
    }

    /// Store `action` for the key, replacing anything already there
    pub fn push(&self, user_id: u64, classifier: impl Into<String>, action: T) {
        self.pending.insert(
            (user_id, classifier.into()),
            PendingConfirmation {
                action,
                created_at: Utc::now(),
            },
        );
    }

    #[must_use]
    pub fn exists(&self, user_id: u64, classifier: &str) -> bool {
        self.prune_expired(user_id, classifier);
        self.pending.contains_key(&(user_id, classifier.to_string()))
    }

    /// Remove and return the pending action in one step
    pub fn take(&self, user_id: u64, classifier: &str) -> Option<T> {
        let now = Utc::now();
        self.pending
            .remove(&(user_id, classifier.to_string()))
            .filter(|(_, pending)| !pending.is_expired(self.ttl, now))
            .map(|(_, pending)| pending.action)
    }

    /// Forget the key. Removing an absent key is a no-op.
    pub fn remove(&self, user_id: u64, classifier: &str) {
        self.pending.remove(&(user_id, classifier.to_string()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn prune_expired(&self, user_id: u64, classifier: &str) {
        if self.ttl.is_none() {
            return;
        }
        let now = Utc::now();
        self.pending
            .remove_if(&(user_id, classifier.to_string()), |_, pending| {
                pending.is_expired(self.ttl, now)
            });
    }
}

impl<T: Clone> ConfirmationRegistry<T> {
    /// The pending action, left in place. Callers remove it once acted on.
    #[must_use]
    pub fn get(&self, user_id: u64, classifier: &str) -> Option<T> {
        self.prune_expired(user_id, classifier);
        self.pending
            .get(&(user_id, classifier.to_string()))
            .map(|entry| entry.action.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRUNE: &str = "prune";

    #[test]
    fn test_push_overwrites() {
        let registry = ConfirmationRegistry::new();
        registry.push(1, PRUNE, "first");
        registry.push(1, PRUNE, "second");
        assert_eq!(registry.get(1, PRUNE), Some("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_does_not_remove() {
        let registry = ConfirmationRegistry::new();
        registry.push(1, PRUNE, 5_u8);
        assert_eq!(registry.get(1, PRUNE), Some(5));
        assert!(registry.exists(1, PRUNE));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConfirmationRegistry::new();
        registry.push(1, PRUNE, ());
        registry.remove(1, PRUNE);
        assert!(!registry.exists(1, PRUNE));
        registry.remove(1, PRUNE);
        registry.remove(2, "never-pushed");
    }

    #[test]
    fn test_keys_are_per_user_and_classifier() {
        let registry = ConfirmationRegistry::new();
        registry.push(1, PRUNE, 'a');
        registry.push(2, PRUNE, 'b');
        registry.push(1, "purge", 'c');
        assert_eq!(registry.get(1, PRUNE), Some('a'));
        assert_eq!(registry.get(2, PRUNE), Some('b'));
        assert_eq!(registry.get(1, "purge"), Some('c'));
    }

    #[test]
    fn test_take_is_single_use() {
        let registry = ConfirmationRegistry::new();
        registry.push(1, PRUNE, 7);
        assert_eq!(registry.take(1, PRUNE), Some(7));
        assert_eq!(registry.take(1, PRUNE), None);
    }

    #[test]
    fn test_expired_entries_are_absent() {
        let registry = ConfirmationRegistry::with_ttl(Some(Duration::zero()));
        registry.push(1, PRUNE, 1);
        assert!(!registry.exists(1, PRUNE));
        assert!(registry.is_empty());

        registry.push(1, PRUNE, 2);
        assert_eq!(registry.take(1, PRUNE), None);

        let lasting = ConfirmationRegistry::with_ttl(Some(Duration::minutes(1)));
        lasting.push(1, PRUNE, 3);
        assert_eq!(lasting.get(1, PRUNE), Some(3));
    }
}
