//! Error types for the wish list sync pipeline
//!
//! Three failure families are kept apart so callers can tell a bad URL from a
//! network problem from a broken file:
//! - [`SyncError::InvalidSource`]: the source is not on the allow-list
//! - [`FetchError`]: transport or HTTP failure
//! - [`ParseError`]: the payload does not follow the wish list format

use std::error::Error as _;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Malformed wish list text. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: `{key}:` header has no value")]
    EmptyHeader { line: usize, key: &'static str },

    #[error("line {line}: malformed wish list roll ({reason})")]
    MalformedRoll { line: usize, reason: String },

    #[error("line {line}: unknown polarity marker '{marker}' in item id")]
    UnknownPolarity { line: usize, marker: char },
}

impl ParseError {
    /// Line the error was found on
    pub fn line(&self) -> usize {
        match self {
            ParseError::EmptyHeader { line, .. }
            | ParseError::MalformedRoll { line, .. }
            | ParseError::UnknownPolarity { line, .. } => *line,
        }
    }
}

/// Network failures while retrieving a wish list
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to '{url}' failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to '{url}' timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("'{url}' responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("'{url}' returned an empty wish list")]
    EmptyBody { url: String },

    #[error("'{url}' is larger than the {limit} byte limit")]
    BodyTooLarge { url: String, limit: u64 },

    #[error("'{url}' redirected to '{target}', which is not an allowed wish list source")]
    DisallowedRedirect { url: String, target: String },

    #[error("'{url}' did not return UTF-8 text")]
    InvalidEncoding { url: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether trying again later could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            FetchError::Transport { source, .. } => {
                // Client errors (4xx) won't fix themselves
                source
                    .status()
                    .is_none_or(|status| status.is_server_error() || status.as_u16() == 429)
            }
            FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::EmptyBody { .. } => false,
            FetchError::BodyTooLarge { .. } => false,
            FetchError::DisallowedRedirect { .. } => false,
            FetchError::InvalidEncoding { .. } => false,
            FetchError::Client(_) => false,
        }
    }

    /// URL the failed request targeted, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::EmptyBody { url }
            | FetchError::BodyTooLarge { url, .. }
            | FetchError::DisallowedRedirect { url, .. }
            | FetchError::InvalidEncoding { url } => Some(url),
            FetchError::Client(_) => None,
        }
    }
}

/// Top-level error for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid wish list source '{candidate}': {reason}")]
    InvalidSource { candidate: String, reason: String },

    #[error("Failed to fetch wish list")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse wish list")]
    Parse(#[from] ParseError),

    /// A newer sync committed (or the list was cleared) while this one ran
    #[error("Sync {token} was superseded by a newer sync")]
    Superseded { token: u64 },

    #[error("Failed {operation} '{path}'")]
    Persistence {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode wish list state")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    #[error("Background parse task failed: {0}")]
    Task(String),
}

/// File operations, for persistence error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Move,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Check if error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Fetch(error) => error.is_recoverable(),
            SyncError::InvalidSource { .. } => false, // User error
            SyncError::Parse(_) => false,             // Same bytes, same result
            SyncError::Superseded { .. } => false,    // Newer data already won
            SyncError::Persistence { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            SyncError::Serialization(_) => false,
            SyncError::Configuration { .. } => false,
            SyncError::Task(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::InvalidSource { .. } => "invalid_source",
            SyncError::Fetch(_) => "fetch",
            SyncError::Parse(_) => "parse",
            SyncError::Superseded { .. } => "superseded",
            SyncError::Persistence { .. } => "persistence",
            SyncError::Serialization(_) => "serialization",
            SyncError::Configuration { .. } => "configuration",
            SyncError::Task(_) => "task",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::InvalidSource { .. } => ErrorSeverity::Medium,
            SyncError::Fetch(_) => ErrorSeverity::Medium,
            SyncError::Parse(_) => ErrorSeverity::High,
            SyncError::Superseded { .. } => ErrorSeverity::Low,
            SyncError::Persistence { .. } => ErrorSeverity::Critical,
            SyncError::Serialization(_) => ErrorSeverity::High,
            SyncError::Configuration { .. } => ErrorSeverity::High,
            SyncError::Task(_) => ErrorSeverity::High,
        }
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::InvalidSource { .. } => Some(
                "Use a raw.githubusercontent.com or gist.githubusercontent.com link to the wish list file",
            ),
            SyncError::Fetch(FetchError::Status { status: 404, .. }) => {
                Some("Check that the URL points at the raw text of the wish list")
            }
            SyncError::Fetch(FetchError::Timeout { .. }) => {
                Some("Check your internet connection or try increasing the timeout value")
            }
            SyncError::Parse(_) => Some("Fix the reported line or ask the list author for a corrected file"),
            SyncError::Configuration { .. } => Some("Check WISHLIST_* environment variables and .env"),
            _ => None,
        }
    }

    /// One-line message including every underlying cause
    ///
    /// This is what gets shown to users in notifications.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        let mut cause = self.source();
        while let Some(error) = cause {
            message.push_str(": ");
            message.push_str(&error.to_string());
            cause = error.source();
        }
        message
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self.user_message());
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        report
    }
}
