//! End-to-end chain behaviour over the built-in strategy kinds.

use async_trait::async_trait;
use core_async::time::{Duration, Instant};
use core_resolver::{
    ChainConfig, Extractor, MediaFormat, MediaInfo, MediaResolver, RequestProfile,
    ResolutionError, Result, StrategyChain, StrategyKind,
};
use mockall::mock;
use mockall::Sequence;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

mock! {
    Extractor {}

    #[async_trait]
    impl Extractor for Extractor {
        async fn extract(&self, media_id: &str, profile: &RequestProfile) -> Result<MediaInfo>;
    }
}

fn playable(url: &str) -> MediaInfo {
    MediaInfo {
        title: Some("Track".to_string()),
        uploader: Some("Artist".to_string()),
        duration: Some(240.0),
        formats: vec![
            MediaFormat {
                url: Some(format!("{}/video", url)),
                ext: Some("mp4".to_string()),
                acodec: Some("none".to_string()),
                tbr: Some(2500.0),
                ..Default::default()
            },
            MediaFormat {
                url: Some(url.to_string()),
                ext: Some("m4a".to_string()),
                acodec: Some("mp4a.40.2".to_string()),
                abr: Some(129.0),
                format_note: Some("medium".to_string()),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_cookies_then_rate_limit_then_success() {
    let mut extractor = MockExtractor::new();
    let mut seq = Sequence::new();

    // The cookie strategy never reaches the extractor: its file is missing.
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, profile| {
            assert_eq!(profile.strategy, "visitor_data");
            Err(ResolutionError::classify("HTTP Error 429: Too Many Requests"))
        });
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, profile| {
            assert_eq!(profile.strategy, "minimal_headers");
            Ok(playable("https://cdn.example/audio?sig=1"))
        });

    let chain = StrategyChain::from_kinds(
        StrategyKind::default_order(Some(PathBuf::from("/missing/cookies.txt")), None),
        Arc::new(extractor),
        ChainConfig::default(),
    );

    let start = Instant::now();
    let result = chain.resolve("dQw4w9WgXcQ").await.unwrap();

    assert_eq!(result.direct_url, "https://cdn.example/audio?sig=1");
    assert_eq!(result.format_label, "medium");
    assert_eq!(result.title_meta.uploader, "Artist");
    assert!(start.elapsed() >= Duration::from_millis(3 * 500 + 2000));
}

#[tokio::test(start_paused = true)]
async fn test_valid_cookies_resolve_on_first_strategy() {
    let mut cookies = tempfile::NamedTempFile::new().unwrap();
    writeln!(cookies, ".youtube.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\tabc").unwrap();
    let cookie_path = cookies.path().to_path_buf();

    let mut extractor = MockExtractor::new();
    let expected_path = cookie_path.clone();
    extractor
        .expect_extract()
        .times(1)
        .returning(move |_, profile| {
            assert_eq!(profile.cookie_file.as_ref(), Some(&expected_path));
            Ok(playable("https://cdn.example/first"))
        });

    let chain = StrategyChain::from_kinds(
        StrategyKind::default_order(Some(cookie_path), None),
        Arc::new(extractor),
        ChainConfig::default(),
    );

    assert_eq!(
        chain.strategy_names(),
        vec!["with_cookies", "visitor_data", "minimal_headers", "mobile_headers"]
    );

    let result = chain.resolve("abc").await.unwrap();
    assert_eq!(result.direct_url, "https://cdn.example/first");
}

#[tokio::test]
async fn test_every_strategy_failing_is_exhausted() {
    let mut extractor = MockExtractor::new();
    extractor
        .expect_extract()
        .times(3)
        .returning(|_, _| Err(ResolutionError::classify("Video unavailable")));

    let chain = StrategyChain::from_kinds(
        StrategyKind::default_order(None, None),
        Arc::new(extractor),
        ChainConfig::immediate(),
    );

    let err = chain.resolve("gone").await.unwrap_err();
    match err {
        ResolutionError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ResolutionError::NotFound(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
