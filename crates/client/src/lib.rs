//! Typed client for a remote, cursor-paginated key-value store API.
//!
//! This crate provides the thin HTTP layer underneath the kv-bulk
//! orchestration engine: authentication, endpoint wrappers, the response
//! envelope, retry-on-429 and a shared token-bucket rate limiter. The
//! concurrent fan-out logic lives in `kvbulk-engine`.

#![cfg_attr(not(test), warn(clippy::unwrap_used))]

mod auth;
mod client;
mod error;
mod rate_limit;

pub mod endpoints;
pub mod models;

pub use auth::AuthStrategy;
pub use client::{KvClient, KvClientBuilder, WriteOptions};
pub use error::{ClientError, Result};
pub use rate_limit::RateLimiter;
pub use models::{
    ApiEnvelope, ApiMessage, BulkWriteResult, KeyEntry, KeyPage, Namespace, ResultInfo, WriteItem,
};
