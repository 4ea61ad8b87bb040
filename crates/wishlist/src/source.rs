//! Wish list source validation
//!
//! Remote wish lists are only ever loaded from a small set of raw-content
//! hosts. [`ALLOWED_SOURCE_PREFIXES`] is the single definition of that list:
//! the validator and the content-security-policy directive are both derived
//! from it, so the two cannot drift apart.

use crate::error::{Result, SyncError};
use once_cell::sync::Lazy;
use url::Url;

/// Origin prefixes a remote wish list may be loaded from
pub const ALLOWED_SOURCE_PREFIXES: [&str; 2] = [
    "https://raw.githubusercontent.com/",
    "https://gist.githubusercontent.com/",
];

static ALLOWED_PREFIX_URLS: Lazy<Vec<Url>> = Lazy::new(|| {
    ALLOWED_SOURCE_PREFIXES
        .iter()
        .filter_map(|prefix| Url::parse(prefix).ok())
        .collect()
});

/// Whether `candidate` is a well-formed URL under an allowed prefix
pub fn is_admissible_source(candidate: &str) -> bool {
    check_source(candidate).is_ok()
}

/// Validate a remote source, returning the parsed URL or the rejection reason
///
/// The comparison runs on the normalized URL, so tricks such as userinfo
/// (`https://raw.githubusercontent.com@evil.example/`) or look-alike hosts
/// (`https://raw.githubusercontent.com.evil.example/`) are rejected.
pub fn check_source(candidate: &str) -> Result<Url> {
    let reject = |reason: String| SyncError::InvalidSource {
        candidate: candidate.to_string(),
        reason,
    };

    let url = Url::parse(candidate).map_err(|e| reject(format!("not a well-formed URL ({})", e)))?;

    if !url.username().is_empty() || url.password().is_some() {
        return Err(reject("credentials are not allowed in a source URL".to_string()));
    }

    let normalized = url.as_str();
    let allowed = ALLOWED_PREFIX_URLS.iter().any(|prefix| {
        url.scheme() == prefix.scheme()
            && url.host_str() == prefix.host_str()
            && url.port_or_known_default() == prefix.port_or_known_default()
            && normalized.starts_with(prefix.as_str())
    });

    if allowed {
        Ok(url)
    } else {
        Err(reject(format!(
            "source must start with one of: {}",
            ALLOWED_SOURCE_PREFIXES.join(", ")
        )))
    }
}

/// `connect-src` directive matching the source allow-list
pub fn content_security_policy_connect_src() -> String {
    format!("connect-src 'self' {}", ALLOWED_SOURCE_PREFIXES.join(" "))
}

/// Curated community wish lists offered as one-click sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownSource {
    Voltron,
    ChoosyVoltron,
}

impl KnownSource {
    pub const ALL: [KnownSource; 2] = [KnownSource::Voltron, KnownSource::ChoosyVoltron];

    pub fn url(self) -> &'static str {
        match self {
            KnownSource::Voltron => {
                "https://raw.githubusercontent.com/48klocs/dim-wish-list-sources/master/voltron.txt"
            }
            KnownSource::ChoosyVoltron => {
                "https://raw.githubusercontent.com/48klocs/dim-wish-list-sources/master/choosy_voltron.txt"
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KnownSource::Voltron => "Voltron",
            KnownSource::ChoosyVoltron => "Choosy Voltron",
        }
    }

    /// Match a configured source string against the curated lists
    pub fn from_source(source: &str) -> Option<Self> {
        let source = source.trim();
        Self::ALL.into_iter().find(|known| known.url() == source)
    }
}
