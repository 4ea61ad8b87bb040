//! Wish list retrieval over HTTP
//!
//! Fetchers never retry; retry policy belongs to the caller. The coordinator
//! validates the source before fetching, and [`HttpFetcher`] only follows
//! redirects that stay inside the same allow-list.

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::source::is_admissible_source;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::{Action, Attempt, Policy};
use reqwest::{Client, header};
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

const MAX_REDIRECTS: usize = 10;

fn allow_listed_redirects(attempt: Attempt<'_>) -> Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        attempt.error("too many redirects")
    } else if is_admissible_source(attempt.url().as_str()) {
        attempt.follow()
    } else {
        // Hand the 3xx back so the caller can report where it pointed
        attempt.stop()
    }
}

/// Trait for retrieving raw wish list text
#[async_trait]
pub trait WishListFetcher: Send + Sync {
    /// Fetch the raw text behind an already validated source
    async fn fetch(&self, source: &Url) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &SyncConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(Policy::custom(allow_listed_redirects))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn classify(&self, url: &Url, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: error,
            }
        }
    }

    async fn fetch_text(&self, source: &Url) -> Result<String, FetchError> {
        let url = source.to_string();
        debug!("Fetching wish list from {}", url);

        let response = self
            .client
            .get(source.clone())
            .send()
            .await
            .map_err(|e| self.classify(source, e))?;

        let status = response.status();
        if status.is_redirection() {
            let target = response
                .headers()
                .get(header::LOCATION)
                .and_then(|location| location.to_str().ok())
                .unwrap_or_default()
                .to_string();
            warn!("Refusing redirect from {} to {}", url, target);
            return Err(FetchError::DisallowedRedirect { url, target });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    url,
                    limit: self.max_body_bytes,
                });
            }
        }

        // Content-Length can be missing or wrong, so enforce the cap while streaming
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| self.classify(source, e))?;
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    url,
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let text = String::from_utf8(body).map_err(|_| FetchError::InvalidEncoding { url: url.clone() })?;
        if text.trim().is_empty() {
            return Err(FetchError::EmptyBody { url });
        }

        debug!("Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }
}

#[async_trait]
impl WishListFetcher for HttpFetcher {
    async fn fetch(&self, source: &Url) -> Result<String, FetchError> {
        self.fetch_text(source)
            .instrument(info_span!("wish_list_fetch", url = %source))
            .await
    }
}
