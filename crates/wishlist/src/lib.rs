//! Wish List Sync Library
//!
//! This library keeps a community weapon-roll wish list in sync with its
//! source. It validates where a list may come from, fetches and parses the
//! plain-text format, and swaps the result into a shared store without ever
//! exposing a half-updated list.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wishlist::{SyncConfig, SyncCoordinator, SyncEvent, WishListStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> wishlist::Result<()> {
//! let config = SyncConfig::from_env()?;
//! let store = Arc::new(WishListStore::new());
//!
//! let coordinator = SyncCoordinator::from_config(store.clone(), &config)?
//!     .with_callback(Arc::new(|event: SyncEvent| {
//!         if let SyncEvent::Committed { rolls, changed, .. } = event {
//!             println!("Loaded {} rolls (changed: {})", rolls, changed);
//!         }
//!     }));
//!
//! let report = coordinator.sync_from_url(&config.default_source).await?;
//! println!("{:?} from {}", report.title, report.source);
//!
//! // Readers take cheap snapshots; a running sync never affects them
//! let state = store.snapshot();
//! println!("{} rolls, updated {:?}", state.current.len(), state.last_updated);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Source allow-list**: remote lists only from raw GitHub content hosts
//! - **Tolerant parser**: unknown lines are skipped, malformed rolls are reported with line numbers
//! - **Atomic updates**: list, source and timestamp always change together
//! - **Ordered syncs**: a slow, older sync can never overwrite a newer one
//! - **Persistence**: state survives restarts as a JSON file

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod persist;
pub mod source;
pub mod store;

// Re-export commonly used types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{SyncConfig, SyncConfigBuilder};
pub use coordinator::{SyncCoordinator, SyncReport};
pub use error::{ErrorSeverity, FetchError, FileOperation, ParseError, Result, SyncError};
pub use events::{ConsoleNotifier, IntoSyncCallback, NullNotifier, SyncCallback, SyncEvent, SyncNotifier};
pub use fetch::{HttpFetcher, WishListFetcher};
pub use model::{ItemTarget, Polarity, SyncState, WishListAndInfo, WishListRoll};
pub use parser::{parse_wish_list, to_wish_list_text};
pub use persist::{JsonFilePersistence, StatePersistence};
pub use source::{KnownSource, check_source, content_security_policy_connect_src, is_admissible_source};
pub use store::{CommitOutcome, SyncToken, WishListStore};
