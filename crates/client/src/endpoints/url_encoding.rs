//! URL encoding utilities for constructing safe API paths.
//!
//! Keys are opaque UTF-8 strings and may contain any character; without
//! percent-encoding, a key like `logs/2024` would create a nested path and a
//! key like `a?b` would grow a query string.

use percent_encoding::{AsciiSet, CONTROLS, percent_encode};

/// Characters that must be percent-encoded in URL path segments.
///
/// Based on RFC 3986 section 3.3, plus characters that break URL parsing or
/// cause double-decode issues. Slash and percent are the critical ones:
/// slash prevents path traversal, percent prevents double-encoding.
pub const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'+')
    .add(b',')
    .add(b';')
    .add(b'[')
    .add(b']');

/// Percent-encode a key (or any user-provided value) for safe use as a URL
/// path segment.
pub fn encode_path_segment(segment: &str) -> String {
    percent_encode(segment.as_bytes(), PATH_SEGMENT_ENCODE_SET).to_string()
}
