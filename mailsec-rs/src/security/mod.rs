//! Security module
//!
//! - [`rate_limit`]: per-client request rate limiting for the HTTP API

pub mod rate_limit;

pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore};
