//! End-to-end behavior of the orchestrator over in-process providers.

mod common;

use common::{test_config, MockPrimary, RecordingFallback};
use resilient_tts::cache::{AudioCache, CacheConfig};
use resilient_tts::{Error, SynthesisConfig, SynthesisOrchestrator, SynthesisRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn orchestrator(
    config: SynthesisConfig,
    primary: &Arc<MockPrimary>,
    fallback: Option<&Arc<RecordingFallback>>,
) -> SynthesisOrchestrator {
    let mut builder = SynthesisOrchestrator::builder(config).primary(primary.clone());
    if let Some(f) = fallback {
        builder = builder.fallback(f.clone());
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let primary = Arc::new(MockPrimary::new());
    let tts = orchestrator(test_config(), &primary, None);
    let req = SynthesisRequest::new("Good morning, Sir.");

    let first = tts.generate_speech(&req).await.unwrap();
    let second = tts.generate_speech(&req).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(primary.synth_calls(), 1);

    let signals = tts.signals().await;
    assert_eq!(signals.cache.hits, 1);
    assert_eq!(signals.cache.stores, 1);
    assert_eq!(signals.cache_entries, 1);
    assert_eq!(signals.metrics.primary_successes, 1);
}

#[tokio::test]
async fn whitespace_differences_share_a_cache_entry() {
    let primary = Arc::new(MockPrimary::new());
    let tts = orchestrator(test_config(), &primary, None);

    tts.generate_speech(&SynthesisRequest::new("hello   there"))
        .await
        .unwrap();
    tts.generate_speech(&SynthesisRequest::new("  hello there\n"))
        .await
        .unwrap();

    assert_eq!(primary.synth_calls(), 1);
}

#[tokio::test]
async fn cache_disabled_always_calls_provider() {
    let primary = Arc::new(MockPrimary::new());
    let config = SynthesisConfig {
        enable_caching: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, None);
    let req = SynthesisRequest::new("Good morning, Sir.");

    tts.generate_speech(&req).await.unwrap();
    tts.generate_speech(&req).await.unwrap();
    assert_eq!(primary.synth_calls(), 2);
}

#[tokio::test]
async fn orchestrators_can_share_one_cache() {
    let cache = Arc::new(AudioCache::new(CacheConfig::new()));
    let p1 = Arc::new(MockPrimary::new());
    let p2 = Arc::new(MockPrimary::new());
    let a = SynthesisOrchestrator::builder(test_config())
        .primary(p1.clone())
        .shared_cache(cache.clone())
        .build()
        .unwrap();
    let b = SynthesisOrchestrator::builder(test_config())
        .primary(p2.clone())
        .shared_cache(cache)
        .build()
        .unwrap();

    let req = SynthesisRequest::new("Shared line");
    a.generate_speech(&req).await.unwrap();
    b.generate_speech(&req).await.unwrap();

    assert_eq!(p1.synth_calls(), 1);
    assert_eq!(p2.synth_calls(), 0);
}

#[tokio::test]
async fn blank_text_returns_empty_audio_without_calls() {
    let primary = Arc::new(MockPrimary::new());
    let tts = orchestrator(test_config(), &primary, None);

    let audio = tts
        .generate_speech(&SynthesisRequest::new("   \n\t"))
        .await
        .unwrap();
    assert!(audio.is_empty());
    assert_eq!(primary.synth_calls(), 0);
}

#[tokio::test]
async fn missing_voice_is_a_configuration_error() {
    let primary = Arc::new(MockPrimary::new());
    let fallback = Arc::new(RecordingFallback::new());
    let config = SynthesisConfig {
        voice_id: None,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, Some(&fallback));

    let err = tts
        .generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(primary.synth_calls(), 0);
    assert_eq!(fallback.calls(), 0);

    // a voice on the request is enough
    let audio = tts
        .generate_speech(&SynthesisRequest::new("hello").with_voice("bella"))
        .await
        .unwrap();
    assert!(!audio.is_empty());
}

#[tokio::test]
async fn quota_preflight_blocks_primary_and_uses_fallback() {
    let primary = Arc::new(MockPrimary::new().with_quota(995, 1_000));
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    let audio = tts
        .generate_speech(&SynthesisRequest::new("This is longer than five characters"))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"fallback-audio");
    assert_eq!(primary.synth_calls(), 0);
    assert_eq!(fallback.calls(), 1);

    let signals = tts.signals().await;
    assert_eq!(signals.metrics.quota_rejections, 1);
    assert_eq!(signals.metrics.transport_attempts, 0);
    // the reserved ledger slot is handed back
    assert_eq!(signals.usage.requests_in_window, 0);
    assert_eq!(signals.quota.map(|q| q.characters_remaining), Some(5));
}

#[tokio::test]
async fn quota_preflight_without_fallback_reports_quota_exceeded() {
    let primary = Arc::new(MockPrimary::new().with_quota(995, 1_000));
    let config = SynthesisConfig {
        enable_fallback: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, None);

    let err = tts
        .generate_speech(&SynthesisRequest::new("This is longer than five characters"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::QuotaExceeded {
            remaining: 5,
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_quota_endpoint_does_not_block_synthesis() {
    let primary = Arc::new(MockPrimary::new());
    *primary.quota.lock().unwrap() = None;
    let tts = orchestrator(test_config(), &primary, None);

    tts.generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap();
    assert_eq!(primary.synth_calls(), 1);
    assert!(tts.quota_snapshot(false).await.is_none());
}

#[tokio::test]
async fn successful_synthesis_debits_local_quota() {
    let primary = Arc::new(MockPrimary::new().with_quota(0, 100));
    let tts = orchestrator(test_config(), &primary, None);

    tts.generate_speech(&SynthesisRequest::new("0123456789"))
        .await
        .unwrap();
    let quota = tts.quota_snapshot(false).await.unwrap();
    assert_eq!(quota.characters_remaining, 90);
    assert_eq!(tts.signals().await.metrics.quota_percent_used, Some(10.0));
}

#[tokio::test]
async fn rate_limit_denies_request_beyond_window() {
    let primary = Arc::new(MockPrimary::new());
    let fallback = Arc::new(RecordingFallback::new());
    let config = SynthesisConfig {
        max_requests_per_minute: 3,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, Some(&fallback));

    for i in 0..4 {
        tts.generate_speech(&SynthesisRequest::new(format!("line number {i}")))
            .await
            .unwrap();
    }

    assert_eq!(primary.synth_calls(), 3);
    assert_eq!(fallback.calls(), 1);
    let signals = tts.signals().await;
    assert_eq!(signals.metrics.rate_limit_rejections, 1);
    assert_eq!(signals.usage.requests_in_window, 3);
    assert_eq!(signals.usage.remaining_requests, 0);
}

#[tokio::test]
async fn rate_limited_without_fallback_is_typed() {
    let primary = Arc::new(MockPrimary::new());
    let config = SynthesisConfig {
        max_requests_per_minute: 1,
        enable_fallback: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, None);

    tts.generate_speech(&SynthesisRequest::new("first"))
        .await
        .unwrap();
    let err = tts
        .generate_speech(&SynthesisRequest::new("second"))
        .await
        .unwrap_err();
    match err {
        Error::RateLimited { retry_after_ms, .. } => {
            let wait = retry_after_ms.expect("window has an oldest entry");
            assert!(wait > 0 && wait <= 60_000);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(primary.synth_calls(), 1);
}

#[tokio::test]
async fn concurrent_callers_never_exceed_request_budget() {
    let primary = Arc::new(MockPrimary::new());
    let fallback = Arc::new(RecordingFallback::new());
    let config = SynthesisConfig {
        max_requests_per_minute: 5,
        enable_caching: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, Some(&fallback));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let tts = tts.clone();
            tokio::spawn(async move {
                tts.generate_speech(&SynthesisRequest::new(format!("caller {i}")))
                    .await
            })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(primary.synth_calls(), 5);
    assert_eq!(fallback.calls(), 15);
}

#[tokio::test]
async fn always_failing_primary_hits_retry_ceiling_then_falls_back() {
    let primary = Arc::new(MockPrimary::failing(500));
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    let audio = tts
        .generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"fallback-audio");
    // max_retry_attempts = 2 => three tries in total
    assert_eq!(primary.synth_calls(), 3);
    assert_eq!(fallback.calls(), 1);

    let m = tts.signals().await.metrics;
    assert_eq!(m.transport_attempts, 3);
    assert_eq!(m.retries, 2);
    assert_eq!(m.fallback_invocations, 1);
    assert_eq!(m.fallback_failures, 0);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let primary = Arc::new(MockPrimary::failing(401));
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    tts.generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap();
    assert_eq!(primary.synth_calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn fallback_disabled_returns_primary_error() {
    let primary = Arc::new(MockPrimary::failing(500));
    let fallback = Arc::new(RecordingFallback::new());
    let config = SynthesisConfig {
        enable_fallback: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, Some(&fallback));

    let err = tts
        .generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 500, .. }));
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn fallback_gets_original_text_and_no_voice() {
    let primary = Arc::new(MockPrimary::failing(503));
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    tts.generate_speech(&SynthesisRequest::new("System error detected, Sir."))
        .await
        .unwrap();

    // the primary saw markup, the fallback did not
    assert!(primary.last_text().unwrap().contains("<emphasis"));
    let seen = fallback.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![("System error detected, Sir.".to_string(), None)]
    );
}

#[tokio::test]
async fn enhancement_can_be_switched_off() {
    let primary = Arc::new(MockPrimary::new());
    let config = SynthesisConfig {
        enable_enhancement: false,
        ..test_config()
    };
    let tts = orchestrator(config, &primary, None);

    tts.generate_speech(&SynthesisRequest::new("System error detected, Sir."))
        .await
        .unwrap();
    assert_eq!(
        primary.last_text().as_deref(),
        Some("System error detected, Sir.")
    );
}

#[tokio::test]
async fn fallback_audio_is_not_cached() {
    let primary = Arc::new(MockPrimary::failing(503));
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));
    let req = SynthesisRequest::new("hello");

    tts.generate_speech(&req).await.unwrap();
    tts.generate_speech(&req).await.unwrap();

    assert_eq!(fallback.calls(), 2);
    assert_eq!(tts.signals().await.cache_entries, 0);
}

#[tokio::test]
async fn every_path_failing_is_synthesis_unavailable() {
    let primary = Arc::new(MockPrimary::failing(500));
    let fallback = Arc::new(RecordingFallback::failing());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    let err = tts
        .generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SynthesisUnavailable { .. }));
    assert_eq!(tts.signals().await.metrics.fallback_failures, 1);
}

#[tokio::test]
async fn no_registered_fallback_is_synthesis_unavailable() {
    let primary = Arc::new(MockPrimary::failing(500));
    let tts = orchestrator(test_config(), &primary, None);

    let err = tts
        .generate_speech(&SynthesisRequest::new("hello"))
        .await
        .unwrap_err();
    match err {
        Error::SynthesisUnavailable { source, .. } => {
            assert!(matches!(source.as_deref(), Some(Error::Remote { status: 500, .. })));
        }
        other => panic!("expected SynthesisUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_during_synthesis_skips_fallback() {
    let primary = Arc::new(MockPrimary {
        delay: Duration::from_millis(500),
        ..MockPrimary::new()
    });
    let fallback = Arc::new(RecordingFallback::new());
    let tts = orchestrator(test_config(), &primary, Some(&fallback));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tts
        .generate_speech_with_cancel(&SynthesisRequest::new("hello"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn list_voices_goes_through_primary() {
    let primary = Arc::new(MockPrimary::new());
    let tts = orchestrator(test_config(), &primary, None);

    let voices = tts.list_voices().await.unwrap();
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].voice_id, "voice-1");
}

#[test]
fn invalid_config_is_rejected_at_build() {
    let primary = Arc::new(MockPrimary::new());
    let config = SynthesisConfig {
        streaming_chunk_size: 0,
        ..test_config()
    };
    let res = SynthesisOrchestrator::builder(config)
        .primary(primary)
        .build();
    assert!(matches!(res, Err(Error::Validation { .. })));
}
