//! The lazy span cursor contract.

use crate::error::Result;
use crate::query::context::HitQueryContext;

/// Sentinel: no more documents in this iterator.
pub const NO_MORE_DOCS: i32 = i32::MAX;

/// Sentinel: no more positions in the current document.
pub const NO_MORE_POSITIONS: i32 = i32::MAX;

pub type SpansBox<'a> = Box<dyn Spans + 'a>;

/// A lazy cursor over `(doc, start, end)` triples in a declared order.
///
/// Cursors are single-threaded and cooperative: every call does bounded
/// work and returns. Accessors are valid only between successful advance
/// calls. Before the first `next_doc` the cursor is unpositioned
/// (`doc_id() == -1`); within a new document, `next_start_position` must
/// be called before the position accessors.
pub trait Spans {
    /// Advance to the next document with at least one hit.
    fn next_doc(&mut self) -> Result<i32>;

    /// Skip to the first document with id >= target that has a hit.
    fn advance(&mut self, target: i32) -> Result<i32> {
        loop {
            let doc = self.next_doc()?;
            if doc >= target {
                return Ok(doc);
            }
        }
    }

    /// Advance to the next hit within the current document.
    fn next_start_position(&mut self) -> Result<i32>;

    /// Skip to the first hit with start >= target in the current document.
    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        loop {
            let start = self.next_start_position()?;
            if start >= target {
                return Ok(start);
            }
        }
    }

    fn doc_id(&self) -> i32;

    fn start_position(&self) -> i32;

    fn end_position(&self) -> i32;

    fn width(&self) -> i32 {
        self.end_position() - self.start_position()
    }

    /// Register capture slots with the context and pass it to children.
    fn register_captures(&mut self, _context: &mut HitQueryContext) {}

    /// Write any captured `(start, end)` slots for the current hit into
    /// the caller's buffer.
    fn get_captured_groups(&mut self, _buffer: &mut [Option<(i32, i32)>]) {}
}

/// Advance two doc cursors until they agree on a document.
///
/// `advance_other` is called with a target doc and must return the first
/// doc >= target of the second cursor.
pub fn synchronize_docs(
    spans: &mut dyn Spans,
    mut other_doc: i32,
    advance_other: &mut dyn FnMut(i32) -> Result<i32>,
) -> Result<i32> {
    loop {
        let doc = spans.doc_id();
        if doc == NO_MORE_DOCS || other_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if doc == other_doc {
            return Ok(doc);
        }
        if doc < other_doc {
            if spans.advance(other_doc)? == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
        } else {
            other_doc = advance_other(doc)?;
        }
    }
}
