//! Preload batches against a scripted resolver.

use async_trait::async_trait;
use bridge_traits::time::{Clock, ManualClock};
use core_async::time::Instant;
use core_playback::cache::{CacheConfig, CacheEntry, CacheStore, PreloadContext};
use core_playback::preload::{PreloadConfig, PreloadOrchestrator, PreloadRequest};
use core_resolver::{MediaResolver, ResolutionError, ResolutionResult, TitleMeta};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Resolver that records every call and can flip the playing track when it
/// reaches a given ID.
struct RecordingResolver {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
    switch_on: Option<(String, Arc<CacheStore>)>,
}

impl RecordingResolver {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Vec::new(),
            switch_on: None,
        }
    }

    fn failing(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    fn switch_track_after(mut self, id: &str, store: Arc<CacheStore>) -> Self {
        self.switch_on = Some((id.to_string(), store));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MediaResolver for RecordingResolver {
    async fn resolve(&self, media_id: &str) -> core_resolver::Result<ResolutionResult> {
        self.calls.lock().push(media_id.to_string());

        if let Some((trigger, store)) = &self.switch_on {
            if trigger == media_id {
                store.set_current_track("youtube", "Y").await.unwrap();
            }
        }

        if self.failing.iter().any(|id| id == media_id) {
            return Err(ResolutionError::Exhausted {
                attempts: 3,
                last: Box::new(ResolutionError::NotFound("gone".into())),
            });
        }

        Ok(ResolutionResult {
            direct_url: format!("https://cdn.example/{}", media_id),
            format_label: "medium".to_string(),
            container: "m4a".to_string(),
            duration_seconds: 180.0,
            title_meta: TitleMeta::default(),
        })
    }
}

fn ids(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
}

fn new_store() -> (Arc<CacheStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    (
        Arc::new(CacheStore::new(CacheConfig::default(), clock.clone())),
        clock,
    )
}

fn cached(id: &str, resolved_at: chrono::DateTime<chrono::Utc>) -> CacheEntry {
    CacheEntry {
        media_id: id.to_string(),
        direct_url: format!("https://cdn.example/old/{}", id),
        resolved_at,
        format_label: "medium".to_string(),
        duration_seconds: 180.0,
        preloaded: false,
        used: true,
        context: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_resolves_only_stale_ids() {
    let (store, clock) = new_store();
    let batch = ids("t", 6);

    // two fresh, one too old for preload but still servable
    store.put(cached("t2", clock.now())).await.unwrap();
    store.put(cached("t4", clock.now())).await.unwrap();
    store
        .put(cached("t5", clock.now() - chrono::Duration::seconds(3100)))
        .await
        .unwrap();

    let resolver = Arc::new(RecordingResolver::new());
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let outcome = orchestrator
        .run(PreloadRequest::new(batch).with_context(PreloadContext::ShuffleStart))
        .await;

    assert_eq!(resolver.calls(), vec!["t1", "t3", "t5", "t6"]);
    assert_eq!(outcome.resolved, 4);
    assert_eq!(outcome.skipped_fresh, 2);
    assert!(!outcome.aborted);

    let t1 = store.get("t1").await.unwrap().unwrap();
    assert!(t1.preloaded);
    assert!(!t1.used);
    assert_eq!(t1.context, Some(PreloadContext::ShuffleStart));
}

#[tokio::test(start_paused = true)]
async fn test_adjacent_batch_stops_when_track_changes() {
    let (store, _clock) = new_store();
    store.set_current_track("youtube", "X").await.unwrap();

    let resolver = Arc::new(RecordingResolver::new().switch_track_after("n2", store.clone()));
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let outcome = orchestrator
        .run(
            PreloadRequest::new(ids("n", 10))
                .with_current_track("X")
                .with_context(PreloadContext::AdjacentTracks),
        )
        .await;

    assert_eq!(resolver.calls(), vec!["n1", "n2"]);
    assert!(outcome.aborted);
    assert_eq!(outcome.resolved, 2);
    assert_eq!(store.size().await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_other_contexts_ignore_track_changes() {
    let (store, _clock) = new_store();
    store.set_current_track("youtube", "X").await.unwrap();

    let resolver = Arc::new(RecordingResolver::new().switch_track_after("s1", store.clone()));
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let outcome = orchestrator
        .run(
            PreloadRequest::new(ids("s", 4))
                .with_current_track("X")
                .with_context(PreloadContext::ShuffleStart),
        )
        .await;

    assert_eq!(resolver.calls().len(), 4);
    assert!(!outcome.aborted);
}

#[tokio::test(start_paused = true)]
async fn test_no_playing_track_does_not_abort() {
    let (store, _clock) = new_store();
    let resolver = Arc::new(RecordingResolver::new());
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let outcome = orchestrator
        .run(PreloadRequest::new(ids("a", 3)).with_current_track("X"))
        .await;

    assert_eq!(outcome.resolved, 3);
    assert!(!outcome.aborted);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_contained() {
    let (store, _clock) = new_store();
    let resolver = Arc::new(RecordingResolver::new().failing(&["f2"]));
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let outcome = orchestrator.run(PreloadRequest::new(ids("f", 3))).await;

    assert_eq!(resolver.calls(), vec!["f1", "f2", "f3"]);
    assert_eq!(outcome.resolved, 2);
    assert_eq!(outcome.failed, 1);
    assert!(store.get("f2").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pause_depends_on_context() {
    let (store, _clock) = new_store();
    let resolver = Arc::new(RecordingResolver::new());
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let started = Instant::now();
    orchestrator
        .run(PreloadRequest::new(ids("p", 3)).with_context(PreloadContext::ShuffleStart))
        .await;
    let shuffle = started.elapsed();

    let started = Instant::now();
    orchestrator
        .run(PreloadRequest::new(ids("q", 3)).with_context(PreloadContext::AdjacentTracks))
        .await;
    let adjacent = started.elapsed();

    assert!(shuffle >= Duration::from_millis(900));
    assert!(shuffle < Duration::from_millis(1500));
    assert!(adjacent >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_start_returns_ticket_before_resolving() {
    let (store, clock) = new_store();
    store.put(cached("b", clock.now())).await.unwrap();

    let resolver = Arc::new(RecordingResolver::new());
    let orchestrator =
        PreloadOrchestrator::new(store.clone(), resolver.clone(), PreloadConfig::default());

    let ticket = orchestrator
        .start(PreloadRequest::new(["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(ticket.accepted, 2);
    assert_eq!(ticket.skipped, 1);
    assert!(resolver.calls().is_empty());

    let outcome = ticket.handle.unwrap().await.unwrap();
    assert_eq!(outcome.resolved, 2);
    assert_eq!(resolver.calls(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_start_with_everything_cached_spawns_nothing() {
    let (store, clock) = new_store();
    store.put(cached("a", clock.now())).await.unwrap();

    let resolver = Arc::new(RecordingResolver::new());
    let orchestrator = PreloadOrchestrator::new(store, resolver.clone(), PreloadConfig::default());

    let ticket = orchestrator.start(PreloadRequest::new(["a"])).await.unwrap();
    assert_eq!(ticket.accepted, 0);
    assert_eq!(ticket.skipped, 1);
    assert!(ticket.handle.is_none());
}

#[tokio::test]
async fn test_start_rejects_empty_batch() {
    let (store, _clock) = new_store();
    let orchestrator = PreloadOrchestrator::new(
        store,
        Arc::new(RecordingResolver::new()),
        PreloadConfig::default(),
    );

    let err = orchestrator
        .start(PreloadRequest::new(Vec::<String>::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        core_playback::PlaybackError::InvalidRequest(_)
    ));
}
