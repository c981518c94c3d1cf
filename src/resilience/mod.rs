//! 弹性模块：按凭据的滑动窗口限流与远端配额跟踪。
//!
//! # Budget Gates
//!
//! Both gates run before any synthesis request leaves the process.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`UsageLedger`] | Sliding 60 s window of request slots and characters per credential |
//! | [`QuotaTracker`] | Cached remote quota, refreshed at most every few minutes |
//!
//! ```rust
//! use resilient_tts::resilience::{LedgerConfig, UsageLedger};
//!
//! let ledger = UsageLedger::new(LedgerConfig::per_minute(2));
//! assert!(ledger.try_acquire("cred", 12).is_some());
//! assert!(ledger.try_acquire("cred", 12).is_some());
//! assert!(ledger.try_acquire("cred", 12).is_none());
//! ```

pub mod quota;
pub mod rate_limiter;

pub use quota::{QuotaSource, QuotaTracker};
pub use rate_limiter::{
    credential_fingerprint, LedgerConfig, Reservation, UsageLedger, UsageSnapshot, UsageWindow,
};
