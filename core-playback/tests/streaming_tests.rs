//! Stream service: URL acquisition, upstream relay and local range serving.

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpRequest, StreamingResponse};
use bridge_traits::time::{Clock, ManualClock};
use bytes::Bytes;
use core_playback::cache::{CacheConfig, CacheEntry, CacheStore, PreloadContext};
use core_playback::streaming::{StreamConfig, StreamService, UrlSource};
use core_playback::PlaybackError;
use core_resolver::{MediaResolver, ResolutionError, ResolutionResult, TitleMeta};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Barrier;

mock! {
    Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn get_stream(&self, request: HttpRequest) -> bridge_traits::error::Result<StreamingResponse>;
    }
}

mock! {
    Resolver {}

    #[async_trait]
    impl MediaResolver for Resolver {
        async fn resolve(&self, media_id: &str) -> core_resolver::Result<ResolutionResult>;
    }
}

fn resolution(url: &str) -> ResolutionResult {
    ResolutionResult {
        direct_url: url.to_string(),
        format_label: "medium".to_string(),
        container: "m4a".to_string(),
        duration_seconds: 212.0,
        title_meta: TitleMeta::default(),
    }
}

fn preloaded(id: &str, url: &str, clock: &ManualClock) -> CacheEntry {
    CacheEntry::from_resolution(id, &resolution(url), clock.now())
        .into_preloaded(PreloadContext::AdjacentTracks)
}

struct Fixture {
    store: Arc<CacheStore>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        Self {
            store: Arc::new(CacheStore::new(CacheConfig::default(), clock.clone())),
            clock,
        }
    }

    fn service(&self, resolver: impl MediaResolver + 'static, http: MockHttp) -> StreamService {
        self.service_with(resolver, http, StreamConfig::default())
    }

    fn service_with(
        &self,
        resolver: impl MediaResolver + 'static,
        http: MockHttp,
        config: StreamConfig,
    ) -> StreamService {
        StreamService::new(
            self.store.clone(),
            Arc::new(resolver),
            Arc::new(http),
            config,
        )
    }
}

// ============================================================================
// URL acquisition
// ============================================================================

#[tokio::test]
async fn test_preloaded_hit_is_flipped_and_not_resolved() {
    let fx = Fixture::new();
    fx.store
        .put(preloaded("abc", "https://cdn.example/abc", &fx.clock))
        .await
        .unwrap();

    let mut resolver = MockResolver::new();
    resolver.expect_resolve().times(0);
    let service = fx.service(resolver, MockHttp::new());

    let first = service.acquire_url("abc").await.unwrap();
    assert_eq!(first.url, "https://cdn.example/abc");
    assert_eq!(first.source, UrlSource::Preloaded);

    let entry = fx.store.get("abc").await.unwrap().unwrap();
    assert!(entry.used);
    assert!(!entry.preloaded);

    let second = service.acquire_url("abc").await.unwrap();
    assert_eq!(second.source, UrlSource::Cached);
}

#[tokio::test]
async fn test_miss_resolves_and_writes_used_entry() {
    let fx = Fixture::new();

    let mut resolver = MockResolver::new();
    resolver.expect_resolve().times(1).returning(|id| {
        assert_eq!(id, "xyz");
        Ok(resolution("https://cdn.example/xyz?sig=secret"))
    });
    let service = fx.service(resolver, MockHttp::new());

    let acquired = service.acquire_url("xyz").await.unwrap();
    assert_eq!(acquired.source, UrlSource::Resolved);

    let entry = fx.store.get("xyz").await.unwrap().unwrap();
    assert!(entry.used);
    assert!(!entry.preloaded);
    assert_eq!(entry.resolved_at, fx.clock.now());
}

#[tokio::test]
async fn test_stale_entry_is_resolved_again() {
    let fx = Fixture::new();
    fx.store
        .put(preloaded("abc", "https://cdn.example/old", &fx.clock))
        .await
        .unwrap();
    fx.clock.advance_secs(3600);

    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(1)
        .returning(|_| Ok(resolution("https://cdn.example/new")));
    let service = fx.service(resolver, MockHttp::new());

    let acquired = service.acquire_url("abc").await.unwrap();
    assert_eq!(acquired.url, "https://cdn.example/new");
    assert_eq!(acquired.source, UrlSource::Resolved);
}

#[tokio::test]
async fn test_resolution_failure_is_no_playable_url() {
    let fx = Fixture::new();

    let mut resolver = MockResolver::new();
    resolver.expect_resolve().returning(|_| {
        Err(ResolutionError::Exhausted {
            attempts: 4,
            last: Box::new(ResolutionError::RateLimited("429".into())),
        })
    });
    let service = fx.service(resolver, MockHttp::new());

    let err = service.acquire_url("abc").await.unwrap_err();
    assert!(matches!(err, PlaybackError::NoPlayableUrl(_)));
    assert_eq!(fx.store.size().await.unwrap(), 0);
}

/// Resolver that only returns once two resolutions are in flight at once.
struct RendezvousResolver {
    barrier: Barrier,
    calls: AtomicUsize,
}

#[async_trait]
impl MediaResolver for RendezvousResolver {
    async fn resolve(&self, media_id: &str) -> core_resolver::Result<ResolutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.barrier.wait().await;
        Ok(resolution(&format!("https://cdn.example/{}", media_id)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_misses_for_different_ids_resolve_in_parallel() {
    let fx = Fixture::new();
    let resolver = RendezvousResolver {
        barrier: Barrier::new(2),
        calls: AtomicUsize::new(0),
    };
    let service = Arc::new(fx.service(resolver, MockHttp::new()));

    let a = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.acquire_url("a").await })
    };
    let b = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.acquire_url("b").await })
    };

    let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
        (a.await.unwrap(), b.await.unwrap())
    })
    .await
    .expect("resolutions should not serialise on the cache lock");

    assert_eq!(a.unwrap().source, UrlSource::Resolved);
    assert_eq!(b.unwrap().source, UrlSource::Resolved);
    assert_eq!(fx.store.size().await.unwrap(), 2);
}

// ============================================================================
// Upstream relay
// ============================================================================

#[tokio::test]
async fn test_proxy_forwards_range_and_relays_headers() {
    let fx = Fixture::new();
    fx.store
        .put(preloaded("abc", "https://cdn.example/abc", &fx.clock))
        .await
        .unwrap();

    let mut http = MockHttp::new();
    http.expect_get_stream().times(1).returning(|request| {
        assert_eq!(request.url, "https://cdn.example/abc");
        assert_eq!(
            request.headers.get("Range").map(String::as_str),
            Some("bytes=0-3")
        );
        assert_eq!(
            request.headers.get("User-Agent").map(String::as_str),
            Some("test-agent/1.0")
        );

        let mut headers = HashMap::new();
        headers.insert("Content-Length".to_string(), "4".to_string());
        headers.insert("Content-Range".to_string(), "bytes 0-3/100".to_string());
        headers.insert("Accept-Ranges".to_string(), "bytes".to_string());
        headers.insert("Set-Cookie".to_string(), "nope".to_string());
        Ok(StreamingResponse::from_chunks(
            206,
            headers,
            vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")],
        ))
    });

    let service = fx.service_with(
        MockResolver::new(),
        http,
        StreamConfig::default().with_user_agent("test-agent/1.0"),
    );

    let response = service.proxy("abc", Some("bytes=0-3")).await.unwrap();
    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-length"), Some("4"));
    assert_eq!(response.header("content-range"), Some("bytes 0-3/100"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("set-cookie"), None);
    assert_eq!(response.collect_body().await.unwrap(), Bytes::from_static(b"abcd"));
}

#[tokio::test]
async fn test_proxy_rejects_unexpected_upstream_status() {
    let fx = Fixture::new();
    fx.store
        .put(preloaded("abc", "https://cdn.example/abc", &fx.clock))
        .await
        .unwrap();

    let mut http = MockHttp::new();
    http.expect_get_stream()
        .returning(|_| Ok(StreamingResponse::from_chunks(403, HashMap::new(), Vec::new())));

    let service = fx.service(MockResolver::new(), http);
    let err = service.proxy("abc", None).await.unwrap_err();

    assert!(matches!(err, PlaybackError::UpstreamStatus(403)));
    assert!(err.is_upstream());
}

#[tokio::test]
async fn test_proxy_maps_transport_errors() {
    let fx = Fixture::new();
    fx.store
        .put(preloaded("abc", "https://cdn.example/abc", &fx.clock))
        .await
        .unwrap();

    let mut http = MockHttp::new();
    http.expect_get_stream()
        .times(1)
        .returning(|_| Err(BridgeError::Timeout("connect".into())));

    let service = fx.service(MockResolver::new(), http);
    let err = service.proxy("abc", None).await.unwrap_err();
    assert!(matches!(err, PlaybackError::UpstreamFetch(_)));
}

// ============================================================================
// Local files
// ============================================================================

fn media_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("song.mp3"), bytes).unwrap();
    dir
}

fn local_service(fx: &Fixture, dir: &TempDir) -> StreamService {
    fx.service_with(
        MockResolver::new(),
        MockHttp::new(),
        StreamConfig::default().with_media_dir(dir.path()),
    )
}

#[tokio::test]
async fn test_local_range_request() {
    let fx = Fixture::new();
    let dir = media_dir();
    let service = local_service(&fx, &dir);

    let response = service
        .serve_local("song", Some("bytes=100-199"))
        .await
        .unwrap();

    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.header("content-range"), Some("bytes 100-199/1000"));

    let body = response.collect_body().await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(body[0], 100);
}

#[tokio::test]
async fn test_local_range_end_is_clamped() {
    let fx = Fixture::new();
    let dir = media_dir();
    let service = local_service(&fx, &dir);

    let response = service
        .serve_local("song", Some("bytes=900-2000"))
        .await
        .unwrap();

    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.header("content-range"), Some("bytes 900-999/1000"));
    assert_eq!(response.collect_body().await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_local_full_file() {
    let fx = Fixture::new();
    let dir = media_dir();
    let service = local_service(&fx, &dir);

    let response = service.serve_local("song", None).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("content-length"), Some("1000"));
    assert_eq!(response.collect_body().await.unwrap().len(), 1000);
}

#[tokio::test]
async fn test_local_unknown_range_unit_sends_whole_file() {
    let fx = Fixture::new();
    let dir = media_dir();
    let service = local_service(&fx, &dir);

    let response = service.serve_local("song", Some("items=0-1")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("content-length"), Some("1000"));
    assert_eq!(response.header("content-range"), None);
    assert_eq!(response.collect_body().await.unwrap().len(), 1000);

    // a malformed bytes spec is still rejected
    assert!(matches!(
        service.serve_local("song", Some("bytes=abc-def")).await,
        Err(PlaybackError::RangeNotSatisfiable { size: 1000 })
    ));
}

#[tokio::test]
async fn test_local_errors() {
    let fx = Fixture::new();
    let dir = media_dir();
    let service = local_service(&fx, &dir);

    assert!(matches!(
        service.serve_local("song", Some("bytes=1000-")).await,
        Err(PlaybackError::RangeNotSatisfiable { size: 1000 })
    ));
    assert!(matches!(
        service.serve_local("missing", None).await,
        Err(PlaybackError::NotFound(_))
    ));
    assert!(matches!(
        service.serve_local("../song", None).await,
        Err(PlaybackError::InvalidMediaId(_))
    ));
}
