//! Retry engine: error classification and the rate-aware executor every
//! remote call is routed through.
mod classify;
mod executor;

pub use classify::{classify, ErrorClass, TRANSIENT_MARKERS};
pub use executor::{RetryConfig, RetryExecutor, RetrySession, DEFAULT_RETRY_TIMEOUT_SECS};
