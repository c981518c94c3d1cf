//! # resilient-tts
//!
//! 弹性语音合成编排库：在配额耗尽、限流、网络抖动和服务中断下依然为调用方产出音频。
//!
//! Resilient speech-synthesis orchestration. Turns text into audio through a
//! metered remote provider while surviving quota exhaustion, rate limiting,
//! transient network failure and provider outage.
//!
//! ## Pipeline
//!
//! caller → [`SynthesisOrchestrator`] → cache → usage ledger → quota pre-flight
//! → text enhancer → retrying transport → primary provider → record usage →
//! cache fill. Any recoverable failure after the cache lookup is routed to the
//! [`FallbackChain`](fallback::FallbackChain).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use resilient_tts::{SynthesisConfig, SynthesisOrchestrator, SynthesisRequest};
//!
//! #[tokio::main]
//! async fn main() -> resilient_tts::Result<()> {
//!     let config = SynthesisConfig::default().with_env_overrides();
//!     let tts = SynthesisOrchestrator::builder(config).build()?;
//!
//!     let request = SynthesisRequest::new("System error detected, Sir.").streaming(true);
//!     let (mut audio, _cancel) = tts.stream_speech(&request).await?;
//!     while let Some(chunk) = audio.next().await {
//!         let _bytes = chunk?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Request sequencing, streaming delivery, signals |
//! | [`cache`] | Content-addressed audio cache with TTL and byte budget |
//! | [`resilience`] | Usage ledger (rate limiting) and quota tracking |
//! | [`transport`] | HTTP plumbing and the retry loop |
//! | [`provider`] | Primary and OpenAI-compatible synthesizers |
//! | [`fallback`] | Ordered fallback chain |
//! | [`enhance`] | Prosody markup |
//! | [`types`] | Requests, profiles, quota snapshots, voices |
//! | [`config`] | Configuration surface |

pub mod cache;
pub mod config;
pub mod enhance;
pub mod fallback;
pub mod orchestrator;
pub mod provider;
pub mod resilience;
pub mod transport;
pub mod types;

pub use config::SynthesisConfig;
pub use orchestrator::{
    CancelHandle, MetricsSnapshot, SignalsSnapshot, SynthesisOrchestrator,
    SynthesisOrchestratorBuilder,
};
pub use types::{QuotaSnapshot, Sentiment, SynthesisRequest, VoiceInfo, VoiceProfile};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Audio delivered chunk by chunk.
pub type AudioStream = BoxStream<'static, bytes::Bytes>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
