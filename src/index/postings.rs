//! Postings/terms enumerator traits and the position payload protocol.
//!
//! These traits are the narrow seam between the engine core and whatever
//! inverted index hosts it. The segment codec writer walks them to build
//! the forward index; term span iterators walk them at query time.

use crate::codec::format::{read_vint_at, write_vint_to};
use crate::error::Result;

/// Sentinel returned by doc cursors when exhausted.
pub const NO_MORE_DOCS: i32 = i32::MAX;

/// One segment's worth of fields, terms and postings.
pub trait FieldsSource {
    /// Names of all index fields present in this segment.
    fn fields(&self) -> Vec<String>;

    /// Does this field get a forward index?
    fn has_forward_index(&self, field: &str) -> bool;

    /// Cursor over this field's terms in lexicographic byte order, or None
    /// if the field does not occur in this segment.
    fn terms(&self, field: &str) -> Result<Option<Box<dyn TermsCursor + '_>>>;

    /// Postings cursor for one exact term, or None if absent.
    fn postings(&self, field: &str, term: &[u8]) -> Result<Option<Box<dyn PostingsCursor + '_>>>;

    /// Number of documents a term occurs in (0 if absent).
    fn doc_freq(&self, field: &str, term: &[u8]) -> i32;

    /// One more than the highest document id in this segment.
    fn max_doc(&self) -> i32;
}

/// Cursor over the terms of one field, in term order.
pub trait TermsCursor {
    /// Advance to the next term. Returns false when exhausted.
    fn move_next(&mut self) -> bool;

    /// Bytes of the current term.
    fn term(&self) -> &[u8];

    /// Number of documents the current term occurs in.
    fn doc_freq(&self) -> i32;

    /// Postings cursor for the current term.
    fn postings(&self) -> Result<Box<dyn PostingsCursor + '_>>;
}

/// Cursor over the postings of one term: documents, and positions with
/// payloads within each document.
pub trait PostingsCursor {
    /// Advance to the next document; returns its id or [`NO_MORE_DOCS`].
    fn next_doc(&mut self) -> i32;

    /// Skip to the first document with id >= target.
    fn advance(&mut self, target: i32) -> i32 {
        loop {
            let doc = self.next_doc();
            if doc >= target {
                return doc;
            }
        }
    }

    /// Current document id (valid after a successful next_doc/advance).
    fn doc_id(&self) -> i32;

    /// Number of occurrences in the current document.
    fn freq(&self) -> i32;

    /// Next occurrence position within the current document. Must be called
    /// at most `freq()` times per document.
    fn next_position(&mut self) -> Result<i32>;

    /// Payload bytes of the current position (may be empty).
    fn payload(&self) -> &[u8];
}

/// Payload indicator bit: this value is the primary value at its position.
pub const PAYLOAD_PRIMARY: u8 = 0x01;

/// Payload indicator bit: a vint relative span end follows the indicator.
pub const PAYLOAD_SPAN_END: u8 = 0x02;

/// Encode the payload for one position.
///
/// `span_length` is the token length of an inline tag span (0 for an empty
/// tag). The rest of the payload is opaque to the engine.
pub fn encode_payload(primary: bool, span_length: Option<i32>) -> Vec<u8> {
    let mut indicator = 0u8;
    if primary {
        indicator |= PAYLOAD_PRIMARY;
    }
    if span_length.is_some() {
        indicator |= PAYLOAD_SPAN_END;
    }
    let mut payload = vec![indicator];
    if let Some(len) = span_length {
        write_vint_to(&mut payload, len as u64);
    }
    payload
}

/// Is this value the primary value at its position?
///
/// An empty payload means a plain single-value token stream; those are
/// always primary.
pub fn is_primary(payload: &[u8]) -> bool {
    match payload.first() {
        Some(indicator) => indicator & PAYLOAD_PRIMARY != 0,
        None => true,
    }
}

/// Span end position encoded in this payload, if any.
pub fn span_end(payload: &[u8], start: i32) -> Option<i32> {
    let indicator = *payload.first()?;
    if indicator & PAYLOAD_SPAN_END == 0 {
        return None;
    }
    let (length, _) = read_vint_at(payload, 1).ok()?;
    Some(start + length as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_primary() {
        assert!(is_primary(&encode_payload(true, None)));
        assert!(!is_primary(&encode_payload(false, None)));
        assert!(is_primary(&[]));
    }

    #[test]
    fn test_payload_span_end() {
        let payload = encode_payload(true, Some(3));
        assert_eq!(span_end(&payload, 2), Some(5));
        assert_eq!(span_end(&encode_payload(true, None), 2), None);
    }

    #[test]
    fn test_payload_empty_tag() {
        let payload = encode_payload(true, Some(0));
        assert_eq!(span_end(&payload, 7), Some(7));
    }
}
