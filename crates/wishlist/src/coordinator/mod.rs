//! Sync orchestration
//!
//! The call chain for both entry points:
//!
//! Caller (CLI / UI)
//! ↓
//! SyncCoordinator (this file)
//! ↓
//! source::check_source → WishListFetcher (URL flow only)
//! ↓
//! parser::parse_wish_list (blocking thread)
//! ↓
//! WishListStore::commit
//!
//! Every stage runs before the store is touched, so a failed sync leaves the
//! previously loaded wish list in place.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{SyncCallback, SyncEvent};
use crate::fetch::{HttpFetcher, WishListFetcher};
use crate::model::WishListAndInfo;
use crate::parser::parse_wish_list;
use crate::source::{check_source, is_admissible_source};
use crate::store::{CommitOutcome, SyncToken, WishListStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// Summary of a successful sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub token: SyncToken,
    pub source: String,
    pub roll_count: usize,
    pub title: Option<String>,
    /// False when the new list is identical to the one already loaded
    pub changed: bool,
    pub last_updated: DateTime<Utc>,
}

/// Validates, fetches, parses and commits wish lists
pub struct SyncCoordinator {
    store: Arc<WishListStore>,
    fetcher: Arc<dyn WishListFetcher>,
    clock: Arc<dyn Clock>,
    callback: Option<SyncCallback>,
    default_source: Option<String>,
}

impl SyncCoordinator {
    /// Create a coordinator with a custom fetcher and the system clock
    pub fn new(store: Arc<WishListStore>, fetcher: Arc<dyn WishListFetcher>) -> Self {
        Self {
            store,
            fetcher,
            clock: Arc::new(SystemClock),
            callback: None,
            default_source: None,
        }
    }

    /// Create a coordinator with the default HTTP fetcher and the
    /// configured default source
    pub fn from_config(store: Arc<WishListStore>, config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::new(store, Arc::new(fetcher)).with_default_source(&config.default_source))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receive a [`SyncEvent`] for every stage, including failures
    pub fn with_callback(mut self, callback: SyncCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Source [`sync_configured`](Self::sync_configured) falls back to when
    /// the store has no remote source of its own
    pub fn with_default_source<S: AsRef<str>>(mut self, source: S) -> Self {
        let source = source.as_ref().trim();
        self.default_source = (!source.is_empty()).then(|| source.to_string());
        self
    }

    pub fn store(&self) -> &Arc<WishListStore> {
        &self.store
    }

    /// Sync from a remote URL
    ///
    /// Rejected sources fail with `InvalidSource` before any fetch happens.
    pub async fn sync_from_url(&self, source: &str) -> Result<SyncReport> {
        let source = source.trim();
        let result = self
            .run_url_sync(source)
            .instrument(info_span!("wish_list_sync", source = %source))
            .await;
        self.settle(source, result)
    }

    /// Sync from text obtained out-of-band, e.g. a local file
    ///
    /// No validation or fetch; `source_label` is recorded as the source.
    pub async fn sync_from_text(&self, raw: &str, source_label: &str) -> Result<SyncReport> {
        let result = self
            .run_text_sync(raw.to_string(), source_label)
            .instrument(info_span!("wish_list_import", source = %source_label))
            .await;
        self.settle(source_label, result)
    }

    /// Re-sync from the source the store currently has configured
    ///
    /// When that source is not a remote URL (empty, or a local import label)
    /// the default source is used instead, if one was set.
    pub async fn sync_configured(&self) -> Result<SyncReport> {
        let saved = self.store.source();
        if is_admissible_source(&saved) {
            return self.sync_from_url(&saved).await;
        }

        match &self.default_source {
            Some(default) => {
                debug!("No remote source saved, using default {}", default);
                self.sync_from_url(default).await
            }
            None if saved.trim().is_empty() => {
                let error = SyncError::InvalidSource {
                    candidate: saved,
                    reason: "no wish list source is configured".to_string(),
                };
                self.settle("", Err(error))
            }
            None => self.sync_from_url(&saved).await,
        }
    }

    /// Re-sync from the configured source once the active list is older
    /// than `max_age`
    ///
    /// Returns `None` without fetching while the list is fresh. A loaded list
    /// imported from a local file has no remote to refresh from and is kept.
    pub async fn refresh_if_stale(&self, max_age: std::time::Duration) -> Result<Option<SyncReport>> {
        let state = self.store.snapshot();
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);

        if !state.is_stale(self.clock.now(), max_age) {
            debug!("Wish list from {} is fresh, skipping refresh", state.source);
            return Ok(None);
        }
        if state.is_loaded() && !is_admissible_source(&state.source) {
            debug!("Wish list was imported from {}, nothing to refresh", state.source);
            return Ok(None);
        }

        info!("Wish list is stale, refreshing");
        self.sync_configured().await.map(Some)
    }

    /// Clear the active list, keeping the configured source
    pub fn clear(&self) {
        self.store.clear();
        info!("Cleared active wish list");
        self.emit(SyncEvent::Cleared);
    }

    async fn run_url_sync(&self, source: &str) -> Result<SyncReport> {
        let url = check_source(source)?;
        let token = self.begin(source);

        let raw = self.fetcher.fetch(&url).await?;
        self.emit(SyncEvent::FetchComplete {
            source: source.to_string(),
            bytes: raw.len(),
        });

        let list = parse_in_background(raw).await?;
        self.commit(token, list, source)
    }

    async fn run_text_sync(&self, raw: String, source_label: &str) -> Result<SyncReport> {
        let token = self.begin(source_label);
        let list = parse_in_background(raw).await?;
        self.commit(token, list, source_label)
    }

    fn begin(&self, source: &str) -> SyncToken {
        let token = self.store.begin_sync();
        debug!("Starting sync {} from {}", token, source);
        self.emit(SyncEvent::SyncStarted {
            token: token.value(),
            source: source.to_string(),
        });
        token
    }

    fn commit(&self, token: SyncToken, list: WishListAndInfo, source: &str) -> Result<SyncReport> {
        let roll_count = list.len();
        let title = list.title.clone();
        self.emit(SyncEvent::Parsed {
            source: source.to_string(),
            rolls: roll_count,
        });

        let now = self.clock.now();
        match self.store.commit(token, list, source, now) {
            CommitOutcome::Committed { changed } => {
                info!(rolls = roll_count, changed, "Wish list sync {} committed", token);
                self.emit(SyncEvent::Committed {
                    token: token.value(),
                    source: source.to_string(),
                    rolls: roll_count,
                    changed,
                });
                Ok(SyncReport {
                    token,
                    source: source.to_string(),
                    roll_count,
                    title,
                    changed,
                    last_updated: now,
                })
            }
            CommitOutcome::Superseded => Err(SyncError::Superseded { token: token.value() }),
        }
    }

    /// Log and report failures; pass the result through
    fn settle(&self, source: &str, result: Result<SyncReport>) -> Result<SyncReport> {
        match &result {
            Ok(_) => {}
            Err(SyncError::Superseded { token }) => {
                debug!("Sync #{} from {} superseded, result dropped", token, source);
                self.emit(SyncEvent::Superseded {
                    token: *token,
                    source: source.to_string(),
                });
            }
            Err(error) => {
                warn!(category = error.category(), "Wish list sync from '{}' failed: {}", source, error.user_message());
                self.emit(SyncEvent::Failed {
                    source: source.to_string(),
                    error: error.user_message(),
                });
            }
        }
        result
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Parse on the blocking pool; community lists can be tens of MB
async fn parse_in_background(raw: String) -> Result<WishListAndInfo> {
    let parsed = tokio::task::spawn_blocking(move || parse_wish_list(&raw))
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?;
    Ok(parsed?)
}

#[cfg(test)]
mod tests;
