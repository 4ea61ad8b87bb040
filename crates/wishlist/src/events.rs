//! Sync events and notification sinks
//!
//! The coordinator emits a [`SyncEvent`] at every stage of a sync. Callers
//! that only care about a few events implement [`SyncNotifier`] and turn it
//! into a callback with [`IntoSyncCallback`].

use std::sync::Arc;

/// Callback invoked for each sync event
pub type SyncCallback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Events emitted during sync operations
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    SyncStarted {
        token: u64,
        source: String,
    },
    FetchComplete {
        source: String,
        bytes: usize,
    },
    Parsed {
        source: String,
        rolls: usize,
    },
    Committed {
        token: u64,
        source: String,
        rolls: usize,
        changed: bool,
    },
    Superseded {
        token: u64,
        source: String,
    },
    Cleared,
    Failed {
        source: String,
        error: String,
    },
}

/// Trait for event handling with more granular control
pub trait SyncNotifier: Send + Sync {
    fn on_sync_started(&self, _token: u64, _source: &str) {}
    fn on_fetch_complete(&self, _source: &str, _bytes: usize) {}
    fn on_parsed(&self, _source: &str, _rolls: usize) {}
    fn on_committed(&self, _source: &str, _rolls: usize, _changed: bool) {}
    fn on_superseded(&self, _token: u64, _source: &str) {}
    fn on_cleared(&self) {}
    fn on_failure(&self, _source: &str, _error: &str) {}
}

/// Extension trait to convert a SyncNotifier into a SyncCallback
pub trait IntoSyncCallback {
    fn into_callback(self) -> SyncCallback;
}

impl<T: SyncNotifier + 'static> IntoSyncCallback for T {
    fn into_callback(self) -> SyncCallback {
        Arc::new(move |event| match event {
            SyncEvent::SyncStarted { token, source } => {
                self.on_sync_started(token, &source);
            }
            SyncEvent::FetchComplete { source, bytes } => {
                self.on_fetch_complete(&source, bytes);
            }
            SyncEvent::Parsed { source, rolls } => {
                self.on_parsed(&source, rolls);
            }
            SyncEvent::Committed { source, rolls, changed, .. } => {
                self.on_committed(&source, rolls, changed);
            }
            SyncEvent::Superseded { token, source } => {
                self.on_superseded(token, &source);
            }
            SyncEvent::Cleared => self.on_cleared(),
            SyncEvent::Failed { source, error } => {
                self.on_failure(&source, &error);
            }
        })
    }
}

/// Prints sync outcomes to the terminal
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    pub verbose: bool,
}

impl ConsoleNotifier {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SyncNotifier for ConsoleNotifier {
    fn on_sync_started(&self, token: u64, source: &str) {
        if self.verbose {
            println!("📥 Sync #{} started: {}", token, source);
        }
    }

    fn on_fetch_complete(&self, source: &str, bytes: usize) {
        if self.verbose {
            println!("⏬ Fetched {} bytes from {}", bytes, source);
        }
    }

    fn on_parsed(&self, _source: &str, rolls: usize) {
        if self.verbose {
            println!("🔍 Parsed {} rolls", rolls);
        }
    }

    fn on_committed(&self, source: &str, rolls: usize, changed: bool) {
        if changed {
            println!("✅ Loaded {} wish list rolls from {}", rolls, source);
        } else {
            println!("✅ Wish list from {} is unchanged ({} rolls)", source, rolls);
        }
    }

    fn on_superseded(&self, token: u64, source: &str) {
        if self.verbose {
            println!("⏭️ Sync #{} from {} was superseded", token, source);
        }
    }

    fn on_cleared(&self) {
        println!("🗑️ Wish list cleared");
    }

    fn on_failure(&self, source: &str, error: &str) {
        eprintln!("❌ Wish list import from {} failed: {}", source, error);
    }
}

/// Notifier that does nothing, for quiet callers
#[derive(Debug, Default)]
pub struct NullNotifier;

impl SyncNotifier for NullNotifier {}
