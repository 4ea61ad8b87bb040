//! Wish list data model
//!
//! These are the values that flow through the sync pipeline: the parser
//! produces a [`WishListAndInfo`], and the store wraps it in a [`SyncState`]
//! together with the source it came from and when it was loaded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Item hash the community format uses to mean "any item"
pub const ANY_ITEM_HASH: i64 = -69420;

/// Source label recorded when a wish list was imported from a local file
pub const LOCAL_FILE_SOURCE: &str = "local file";

/// Whether a roll is recommended or discouraged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Wish,
    Trash,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Wish => write!(f, "wish"),
            Polarity::Trash => write!(f, "trash"),
        }
    }
}

/// The item a roll applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTarget {
    /// A specific item hash
    Item(u32),
    /// Every item that can roll the listed perks
    AnyItem,
}

impl fmt::Display for ItemTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemTarget::Item(hash) => write!(f, "{}", hash),
            ItemTarget::AnyItem => write!(f, "any item"),
        }
    }
}

/// One recommended (or discouraged) item/perk combination
///
/// Fields are private so a roll cannot change after it has been built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WishListRoll {
    item: ItemTarget,
    perks: BTreeSet<u32>,
    notes: Option<String>,
    polarity: Polarity,
}

impl WishListRoll {
    /// Create a roll without notes
    ///
    /// The any-item wildcard only exists as a wish in the text format, so
    /// `ItemTarget::AnyItem` always gets `Polarity::Wish`.
    ///
    /// A trash roll for item 69420 would be written as `item=-69420`, which
    /// is the wildcard, so the format cannot express it. Such a roll is
    /// normalized to the wildcard, exactly what reading its text back gives.
    pub fn new<I: IntoIterator<Item = u32>>(item: ItemTarget, perks: I, polarity: Polarity) -> Self {
        let item = match (item, polarity) {
            (ItemTarget::Item(hash), Polarity::Trash) if -i64::from(hash) == ANY_ITEM_HASH => ItemTarget::AnyItem,
            _ => item,
        };
        let polarity = match item {
            ItemTarget::AnyItem => Polarity::Wish,
            ItemTarget::Item(_) => polarity,
        };

        Self {
            item,
            perks: perks.into_iter().collect(),
            notes: None,
            polarity,
        }
    }

    /// Attach notes; blank notes are dropped
    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        let notes = notes.into();
        let trimmed = notes.trim();
        self.notes = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn item(&self) -> ItemTarget {
        self.item
    }

    pub fn perks(&self) -> &BTreeSet<u32> {
        &self.perks
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_trash(&self) -> bool {
        self.polarity == Polarity::Trash
    }
}

/// A parsed wish list plus its optional header metadata
///
/// Rolls keep file order. Duplicate rolls are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishListAndInfo {
    pub rolls: Vec<WishListRoll>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl WishListAndInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rolls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rolls.is_empty()
    }

    /// Number of recommended rolls
    pub fn wish_count(&self) -> usize {
        self.rolls.iter().filter(|roll| !roll.is_trash()).count()
    }

    /// Number of discouraged rolls
    pub fn trash_count(&self) -> usize {
        self.rolls.iter().filter(|roll| roll.is_trash()).count()
    }

    /// Hex xxHash64 of the canonical text form
    ///
    /// Two lists with the same rolls, title and description always hash the
    /// same, which is what lets a re-sync report "unchanged".
    pub fn content_hash(&self) -> String {
        let canonical = crate::parser::to_wish_list_text(self);
        let hash = xxhash_rust::xxh64::xxh64(canonical.as_bytes(), 0);
        hex::encode(hash.to_be_bytes())
    }
}

/// Everything the store knows about the active wish list
///
/// `current`, `last_updated` and `content_hash` always change together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last configured origin: a URL, or a label such as [`LOCAL_FILE_SOURCE`]
    pub source: String,
    /// When the active list was last successfully synced
    pub last_updated: Option<DateTime<Utc>>,
    /// The active list, shared read-only with snapshot holders
    pub current: Arc<WishListAndInfo>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl SyncState {
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            last_updated: None,
            current: Arc::new(WishListAndInfo::empty()),
            content_hash: None,
        }
    }

    /// Whether a wish list has been loaded since the last clear
    pub fn is_loaded(&self) -> bool {
        self.last_updated.is_some()
    }

    /// Time since the last successful sync
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_updated.map(|updated| now - updated)
    }

    /// A list that was never loaded counts as stale
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now).is_none_or(|age| age > max_age)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::empty()
    }
}
