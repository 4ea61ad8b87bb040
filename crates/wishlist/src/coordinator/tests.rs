use super::*;
use crate::clock::FixedClock;
use crate::error::FetchError;
use crate::model::{ItemTarget, Polarity};
use async_trait::async_trait;
use chrono::TimeZone;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use url::Url;

const SOURCE_A: &str = "https://raw.githubusercontent.com/lists/main/a.txt";
const SOURCE_B: &str = "https://raw.githubusercontent.com/lists/main/b.txt";

const LIST_A: &str = "title: Test\ndimwishlist:item=1234&perks=1,2\n";
const LIST_B: &str = "title: Other\ndimwishlist:item=55&perks=9\ndimwishlist:item=-56&perks=8\n";

/// Serves canned bodies per URL and counts calls
#[derive(Default)]
struct StubFetcher {
    responses: Mutex<HashMap<String, std::result::Result<String, u16>>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn with(self, url: &str, body: &str) -> Self {
        self.set(url, Ok(body.to_string()));
        self
    }

    fn set(&self, url: &str, response: std::result::Result<String, u16>) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WishListFetcher for StubFetcher {
    async fn fetch(&self, source: &Url) -> std::result::Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = source.to_string();
        match self.responses.lock().unwrap().get(&url).cloned() {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(FetchError::Status { url, status }),
            None => Err(FetchError::Status { url, status: 404 }),
        }
    }
}

/// Holds each response until the test releases it
#[derive(Default)]
struct GatedFetcher {
    gates: Mutex<HashMap<String, oneshot::Receiver<String>>>,
    started: Notify,
}

impl GatedFetcher {
    fn gate(&self, url: &str) -> oneshot::Sender<String> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(url.to_string(), rx);
        tx
    }
}

#[async_trait]
impl WishListFetcher for GatedFetcher {
    async fn fetch(&self, source: &Url) -> std::result::Result<String, FetchError> {
        let rx = self.gates.lock().unwrap().remove(source.as_str());
        self.started.notify_one();
        match rx {
            Some(rx) => rx.await.map_err(|_| FetchError::EmptyBody {
                url: source.to_string(),
            }),
            None => Err(FetchError::Status {
                url: source.to_string(),
                status: 404,
            }),
        }
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn coordinator(fetcher: Arc<dyn WishListFetcher>) -> (SyncCoordinator, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start_time()));
    let coordinator =
        SyncCoordinator::new(Arc::new(WishListStore::new()), fetcher).with_clock(clock.clone());
    (coordinator, clock)
}

fn recorder() -> (SyncCallback, Arc<Mutex<Vec<SyncEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: SyncCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (callback, events)
}

#[tokio::test]
async fn test_sync_from_url_replaces_state() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, _) = coordinator(fetcher.clone());

    let report = coordinator.sync_from_url(SOURCE_A).await.unwrap();
    assert_eq!(report.roll_count, 1);
    assert_eq!(report.title.as_deref(), Some("Test"));
    assert!(report.changed);
    assert_eq!(report.last_updated, start_time());

    let state = coordinator.store().snapshot();
    assert_eq!(state.source, SOURCE_A);
    assert_eq!(state.last_updated, Some(start_time()));
    assert_eq!(state.current.title.as_deref(), Some("Test"));

    let roll = &state.current.rolls[0];
    assert_eq!(roll.item(), ItemTarget::Item(1234));
    assert_eq!(roll.perks().iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(roll.polarity(), Polarity::Wish);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_rejected_source_never_fetches() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, _) = coordinator(fetcher.clone());
    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    let before = coordinator.store().snapshot();

    for candidate in [
        "https://evil.example/list.txt",
        "http://raw.githubusercontent.com/a/b/c.txt",
        "https://raw.githubusercontent.com.evil.example/a.txt",
        "not a url",
    ] {
        let result = coordinator.sync_from_url(candidate).await;
        assert!(
            matches!(result, Err(SyncError::InvalidSource { .. })),
            "{} should be rejected",
            candidate
        );
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn test_parse_failure_keeps_previous_list() {
    let fetcher = Arc::new(
        StubFetcher::default()
            .with(SOURCE_A, LIST_A)
            .with(SOURCE_B, "title: Broken\ndimwishlist:item=abc&perks=1\n"),
    );
    let (coordinator, clock) = coordinator(fetcher);
    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    let before = coordinator.store().snapshot();

    clock.advance(chrono::Duration::minutes(5));
    let result = coordinator.sync_from_url(SOURCE_B).await;

    match result {
        Err(SyncError::Parse(error)) => assert_eq!(error.line(), 2),
        other => panic!("Expected parse error, got {:?}", other),
    }
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_list() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, clock) = coordinator(fetcher.clone());
    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    let before = coordinator.store().snapshot();

    fetcher.set(SOURCE_A, Err(503));
    clock.advance(chrono::Duration::hours(1));
    let error = coordinator.sync_from_url(SOURCE_A).await.unwrap_err();

    assert!(matches!(error, SyncError::Fetch(FetchError::Status { status: 503, .. })));
    assert!(error.is_recoverable());
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn test_sync_from_text_skips_validation() {
    let fetcher = Arc::new(StubFetcher::default());
    let (coordinator, _) = coordinator(fetcher.clone());

    let report = coordinator
        .sync_from_text(LIST_B, "/home/me/my-list.txt")
        .await
        .unwrap();

    assert_eq!(report.roll_count, 2);
    assert_eq!(fetcher.calls(), 0);

    let state = coordinator.store().snapshot();
    assert_eq!(state.source, "/home/me/my-list.txt");
    assert_eq!(state.current.trash_count(), 1);
}

#[tokio::test]
async fn test_sync_from_text_parse_failure() {
    let (coordinator, _) = coordinator(Arc::new(StubFetcher::default()));
    coordinator.sync_from_text(LIST_A, "local").await.unwrap();
    let before = coordinator.store().snapshot();

    let result = coordinator.sync_from_text("title:\n", "local").await;
    assert!(matches!(result, Err(SyncError::Parse(_))));
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn test_resync_reports_unchanged() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, clock) = coordinator(fetcher);

    assert!(coordinator.sync_from_url(SOURCE_A).await.unwrap().changed);
    let first = coordinator.store().snapshot();

    clock.advance(chrono::Duration::days(1));
    let report = coordinator.sync_from_url(SOURCE_A).await.unwrap();
    assert!(!report.changed);

    let second = coordinator.store().snapshot();
    assert_eq!(second.current, first.current);
    assert_eq!(second.last_updated, Some(start_time() + chrono::Duration::days(1)));
}

#[tokio::test]
async fn test_clear_keeps_source() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, _) = coordinator(fetcher);
    coordinator.sync_from_url(SOURCE_A).await.unwrap();

    coordinator.clear();

    let state = coordinator.store().snapshot();
    assert!(state.current.is_empty());
    assert_eq!(state.last_updated, None);
    assert_eq!(state.source, SOURCE_A);
}

#[tokio::test]
async fn test_sync_configured_uses_store_source() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, _) = coordinator(fetcher.clone());
    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    coordinator.clear();

    let report = coordinator.sync_configured().await.unwrap();
    assert_eq!(report.source, SOURCE_A);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(coordinator.store().snapshot().current.len(), 1);
}

#[tokio::test]
async fn test_sync_configured_without_source() {
    let fetcher = Arc::new(StubFetcher::default());
    let (coordinator, _) = coordinator(fetcher.clone());

    let result = coordinator.sync_configured().await;
    assert!(matches!(result, Err(SyncError::InvalidSource { .. })));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_sync_configured_falls_back_to_default() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_B, LIST_B));
    let (coordinator, _) = coordinator(fetcher.clone());
    let coordinator = coordinator.with_default_source(SOURCE_B);
    coordinator.sync_from_text(LIST_A, "local file").await.unwrap();

    let report = coordinator.sync_configured().await.unwrap();
    assert_eq!(report.source, SOURCE_B);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_refresh_skips_fresh_list() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, clock) = coordinator(fetcher.clone());
    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    let before = coordinator.store().snapshot();

    clock.advance(chrono::Duration::hours(1));
    let refreshed = coordinator.refresh_if_stale(Duration::from_secs(24 * 3600)).await.unwrap();

    assert_eq!(refreshed, None);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn test_refresh_fetches_stale_list() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (coordinator, clock) = coordinator(fetcher.clone());
    coordinator.sync_from_url(SOURCE_A).await.unwrap();

    clock.advance(chrono::Duration::hours(25));
    let report = coordinator
        .refresh_if_stale(Duration::from_secs(24 * 3600))
        .await
        .unwrap()
        .expect("stale list should be refreshed");

    assert_eq!(report.source, SOURCE_A);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(
        coordinator.store().snapshot().last_updated,
        Some(start_time() + chrono::Duration::hours(25))
    );
}

#[tokio::test]
async fn test_refresh_loads_default_into_empty_store() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_B, LIST_B));
    let (coordinator, _) = coordinator(fetcher.clone());
    let coordinator = coordinator.with_default_source(SOURCE_B);

    let report = coordinator.refresh_if_stale(Duration::from_secs(3600)).await.unwrap();

    assert_eq!(report.map(|report| report.source), Some(SOURCE_B.to_string()));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_refresh_keeps_local_import() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_B, LIST_B));
    let (coordinator, clock) = coordinator(fetcher.clone());
    let coordinator = coordinator.with_default_source(SOURCE_B);
    coordinator.sync_from_text(LIST_A, "local file").await.unwrap();

    clock.advance(chrono::Duration::days(7));
    let refreshed = coordinator.refresh_if_stale(Duration::from_secs(3600)).await.unwrap();

    assert_eq!(refreshed, None);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(coordinator.store().snapshot().source, "local file");
}

#[tokio::test]
async fn test_out_of_order_completion_is_superseded() {
    let fetcher = Arc::new(GatedFetcher::default());
    let release_a = fetcher.gate(SOURCE_A);
    let release_b = fetcher.gate(SOURCE_B);
    let (coordinator, _) = coordinator(fetcher.clone());
    let coordinator = Arc::new(coordinator);

    // A starts first and is therefore the older sync
    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sync_from_url(SOURCE_A).await })
    };
    fetcher.started.notified().await;
    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sync_from_url(SOURCE_B).await })
    };
    fetcher.started.notified().await;

    release_b.send(LIST_B.to_string()).unwrap();
    let newer = second.await.unwrap().unwrap();
    assert_eq!(newer.source, SOURCE_B);

    release_a.send(LIST_A.to_string()).unwrap();
    let older = first.await.unwrap();
    assert!(matches!(older, Err(SyncError::Superseded { .. })));

    let state = coordinator.store().snapshot();
    assert_eq!(state.source, SOURCE_B);
    assert_eq!(state.current.title.as_deref(), Some("Other"));
}

#[tokio::test]
async fn test_clear_supersedes_in_flight_sync() {
    let fetcher = Arc::new(GatedFetcher::default());
    let release = fetcher.gate(SOURCE_A);
    let (coordinator, _) = coordinator(fetcher.clone());
    let coordinator = Arc::new(coordinator);

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sync_from_url(SOURCE_A).await })
    };
    fetcher.started.notified().await;

    coordinator.clear();
    release.send(LIST_A.to_string()).unwrap();

    assert!(matches!(in_flight.await.unwrap(), Err(SyncError::Superseded { .. })));
    assert!(coordinator.store().snapshot().current.is_empty());
}

#[tokio::test]
async fn test_events_for_successful_sync() {
    let fetcher = Arc::new(StubFetcher::default().with(SOURCE_A, LIST_A));
    let (callback, events) = recorder();
    let (coordinator, _) = coordinator(fetcher);
    let coordinator = coordinator.with_callback(callback);

    coordinator.sync_from_url(SOURCE_A).await.unwrap();
    coordinator.clear();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            SyncEvent::SyncStarted {
                token: 1,
                source: SOURCE_A.to_string(),
            },
            SyncEvent::FetchComplete {
                source: SOURCE_A.to_string(),
                bytes: LIST_A.len(),
            },
            SyncEvent::Parsed {
                source: SOURCE_A.to_string(),
                rolls: 1,
            },
            SyncEvent::Committed {
                token: 1,
                source: SOURCE_A.to_string(),
                rolls: 1,
                changed: true,
            },
            SyncEvent::Cleared,
        ]
    );
}

#[tokio::test]
async fn test_failure_event_carries_cause() {
    let fetcher = Arc::new(StubFetcher::default());
    let (callback, events) = recorder();
    let (coordinator, _) = coordinator(fetcher);
    let coordinator = coordinator.with_callback(callback);

    coordinator.sync_from_url(SOURCE_A).await.unwrap_err();
    coordinator.sync_from_url("https://evil.example/x.txt").await.unwrap_err();

    let events = events.lock().unwrap();
    let failures: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Failed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(failures.len(), 2);
    assert!(failures[0].contains("404"), "{}", failures[0]);
    assert!(failures[1].contains("evil.example"), "{}", failures[1]);
}

#[test]
fn test_from_config_rejects_invalid_config() {
    let config = crate::config::SyncConfigBuilder::new()
        .timeout(Duration::ZERO)
        .build();

    let result = SyncCoordinator::from_config(Arc::new(WishListStore::new()), &config);
    assert!(matches!(result, Err(SyncError::Configuration { .. })));
}
