//! Data models for remote API requests and responses.
//!
//! Types are organized by resource in submodules and re-exported here for
//! convenient access.

pub mod bulk;
pub mod common;
pub mod keys;
pub mod namespaces;

pub use bulk::{BulkWriteResult, DeleteName, WriteItem};
pub use common::{ApiEnvelope, ApiMessage, ResultInfo};
pub use keys::{KeyEntry, KeyPage};
pub use namespaces::Namespace;
