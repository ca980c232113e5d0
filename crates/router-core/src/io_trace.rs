//! I/O Tracker — per-stage input/output recording for observability and replay.

use sha2::{Digest, Sha256};

/// Which side of a stage boundary this record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// One append-only entry in an [`crate::context::ExecutionContext`]'s I/O log.
///
/// Full payloads are only captured when `ConfigSnapshot::io_trace_debug` is
/// set; otherwise a bounded excerpt plus a content hash is recorded, per
/// spec.md §4.2 ("Between-stage I/O recording").
#[derive(Debug, Clone)]
pub struct IoRecord {
    pub stage_name: &'static str,
    pub direction: Direction,
    pub size_bytes: usize,
    pub duration_ms: u64,
    pub truncated_payload_hash: String,
    /// Present only when debug capture is enabled
    pub excerpt: Option<String>,
}

/// Soft cap on the excerpt captured when debug capture is enabled.
const EXCERPT_LIMIT: usize = 2_048;

impl IoRecord {
    /// Build a record from a serialized payload, honouring the debug flag.
    #[must_use]
    pub fn capture(stage_name: &'static str, direction: Direction, payload: &[u8], duration_ms: u64, debug: bool) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let hash = hasher.finalize();
        let truncated_payload_hash = hex_encode(&hash[..8]);

        let excerpt = debug.then(|| {
            let text = String::from_utf8_lossy(payload);
            if text.len() > EXCERPT_LIMIT {
                format!("{}...", &text[..floor_char_boundary(&text, EXCERPT_LIMIT)])
            } else {
                text.into_owned()
            }
        });

        Self {
            stage_name,
            direction,
            size_bytes: payload.len(),
            duration_ms,
            truncated_payload_hash,
            excerpt,
        }
    }

    /// A record marking that this request was cancelled mid-stage.
    #[must_use]
    pub fn cancelled(stage_name: &'static str) -> Self {
        Self {
            stage_name,
            direction: Direction::Out,
            size_bytes: 0,
            duration_ms: 0,
            truncated_payload_hash: "cancelled".to_owned(),
            excerpt: None,
        }
    }
}

/// Largest byte index `<= limit` that falls on a UTF-8 char boundary of
/// `text`, so truncating there never splits a multibyte character.
fn floor_char_boundary(text: &str, limit: usize) -> usize {
    if limit >= text.len() {
        return text.len();
    }
    (0..=limit).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("write to String never fails");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_without_debug_has_no_excerpt() {
        let record = IoRecord::capture("protocol", Direction::In, b"hello world", 3, false);
        assert!(record.excerpt.is_none());
        assert_eq!(record.size_bytes, 11);
        assert_eq!(record.truncated_payload_hash.len(), 16);
    }

    #[test]
    fn capture_with_debug_has_excerpt() {
        let record = IoRecord::capture("protocol", Direction::Out, b"hello world", 3, true);
        assert_eq!(record.excerpt.as_deref(), Some("hello world"));
    }

    #[test]
    fn same_payload_hashes_identically() {
        let a = IoRecord::capture("x", Direction::In, b"payload", 0, false);
        let b = IoRecord::capture("x", Direction::In, b"payload", 0, false);
        assert_eq!(a.truncated_payload_hash, b.truncated_payload_hash);
    }

    #[test]
    fn excerpt_truncation_does_not_split_a_multibyte_char() {
        // The euro sign is 3 bytes wide and straddles `EXCERPT_LIMIT`;
        // truncating at the raw byte offset would panic mid-codepoint.
        let filler = "a".repeat(EXCERPT_LIMIT - 1);
        let payload = format!("{filler}\u{20ac}\u{20ac}").into_bytes();
        let record = IoRecord::capture("protocol", Direction::In, &payload, 0, true);
        let excerpt = record.excerpt.expect("debug capture enabled");
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= EXCERPT_LIMIT + "...".len());
    }
}
