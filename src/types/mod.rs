//! 类型模块：合成请求、音色参数、配额快照等核心数据类型。
//!
//! # Types Module
//!
//! Core data types shared by every stage of the synthesis pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SynthesisRequest`] | Immutable request: text, optional voice, streaming flag |
//! | [`VoiceProfile`] | Stability / similarity / style / rate parameters |
//! | [`Sentiment`] | Keyword-based sentiment category of the input text |
//! | [`ProfileSelector`] | Maps sentiment to a voice profile |
//! | [`QuotaSnapshot`] | Remote character budget at a point in time |
//! | [`VoiceInfo`] | Voice metadata returned by the provider |

pub mod profile;
pub mod quota;
pub mod request;
pub mod voice;

pub use profile::{ProfileSelector, Sentiment, VoiceProfile};
pub use quota::QuotaSnapshot;
pub use request::SynthesisRequest;
pub use voice::VoiceInfo;
