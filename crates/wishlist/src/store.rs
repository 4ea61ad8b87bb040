//! Owned state container for the active wish list
//!
//! The store is the only writer of [`SyncState`]. Every mutation happens under
//! one write lock, so readers never see new rolls paired with an old
//! timestamp or the reverse.
//!
//! Overlapping syncs are ordered with [`SyncToken`]s: a sync takes a token
//! when it starts and [`WishListStore::commit`] refuses it if a newer sync has
//! already committed, or if the list was replaced or cleared after the token
//! was issued.

use crate::model::{SyncState, WishListAndInfo};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Monotonic ticket identifying one sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncToken(u64);

impl SyncToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of trying to commit a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The store now holds the new list; `changed` is false when the content
    /// hash matches what was already loaded
    Committed { changed: bool },
    /// A newer sync, replace or clear won; nothing was written
    Superseded,
}

#[derive(Debug)]
struct StoreInner {
    state: SyncState,
    /// Tokens at or below this value can no longer commit
    floor: u64,
}

/// Process-wide holder of the active wish list
#[derive(Debug)]
pub struct WishListStore {
    inner: RwLock<StoreInner>,
    issued: AtomicU64,
}

impl WishListStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_state(SyncState::empty())
    }

    /// Create a store seeded with previously persisted state
    pub fn with_state(state: SyncState) -> Self {
        Self {
            inner: RwLock::new(StoreInner { state, floor: 0 }),
            issued: AtomicU64::new(0),
        }
    }

    /// Copy of the current state
    ///
    /// The wish list itself is shared behind an `Arc` and has no mutating
    /// API, so nothing done with the snapshot can reach the store.
    pub fn snapshot(&self) -> SyncState {
        self.read().state.clone()
    }

    /// The configured source string
    pub fn source(&self) -> String {
        self.read().state.source.clone()
    }

    /// Take a token for a sync that is about to start
    pub fn begin_sync(&self) -> SyncToken {
        SyncToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Commit a sync result unless something newer already landed
    pub fn commit<S: Into<String>>(
        &self,
        token: SyncToken,
        data: WishListAndInfo,
        source: S,
        now: DateTime<Utc>,
    ) -> CommitOutcome {
        // Hash outside the lock; large lists take a moment
        let hash = data.content_hash();
        let source = source.into();

        let mut inner = self.write();
        if token.0 <= inner.floor {
            debug!("Dropping sync {} (floor is {})", token, inner.floor);
            return CommitOutcome::Superseded;
        }

        let changed = inner.state.content_hash.as_deref() != Some(hash.as_str());
        inner.floor = token.0;
        inner.state = SyncState {
            source,
            last_updated: Some(now),
            current: Arc::new(data),
            content_hash: Some(hash),
        };

        CommitOutcome::Committed { changed }
    }

    /// Replace the active list unconditionally
    ///
    /// Any sync started before this call is superseded. Returns whether the
    /// content differs from what was loaded before.
    pub fn replace<S: Into<String>>(&self, data: WishListAndInfo, source: S, now: DateTime<Utc>) -> bool {
        let hash = data.content_hash();
        let source = source.into();

        let mut inner = self.write();
        let changed = inner.state.content_hash.as_deref() != Some(hash.as_str());
        inner.floor = inner.floor.max(self.issued.load(Ordering::SeqCst));
        inner.state = SyncState {
            source,
            last_updated: Some(now),
            current: Arc::new(data),
            content_hash: Some(hash),
        };
        changed
    }

    /// Drop the active list and its timestamp, keeping the source
    ///
    /// Any sync started before this call is superseded.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.floor = inner.floor.max(self.issued.load(Ordering::SeqCst));
        inner.state = SyncState {
            source: std::mem::take(&mut inner.state.source),
            ..SyncState::empty()
        };
    }

    /// Swap in state loaded from persistence
    pub fn restore(&self, state: SyncState) {
        self.write().state = state;
    }

    // A panic while holding the lock can't leave SyncState half-written
    // (every write is a single assignment), so poisoning is safe to ignore.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WishListStore {
    fn default() -> Self {
        Self::new()
    }
}
