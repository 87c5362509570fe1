//! Remote API endpoint implementations.
//!
//! Endpoints are free async functions over a shared `reqwest::Client`; the
//! [`crate::KvClient`] methods wrap them 1:1 with the account scoping and
//! retry budget filled in.

mod bulk;
mod keys;
mod metadata;
mod namespaces;
mod request;
mod values;

pub mod url_encoding;

pub use bulk::{bulk_delete, bulk_write};
pub use keys::list_keys_page;
pub use metadata::get_metadata;
pub use namespaces::list_namespaces;
pub use request::{continuation_cursor, decode_envelope, send_request_with_retry};
pub use values::{WriteOptions, delete_value, get_value, put_value};

use crate::error::{ClientError, Result};

/// Fail fast on a missing required parameter.
pub(crate) fn require(value: &str, what: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ClientError::Validation(format!("{what} is required")))
    } else {
        Ok(())
    }
}
