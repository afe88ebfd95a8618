//! Token-universe complement: all single-token positions not matched by
//! the clause.

use crate::error::{EngineError, Result};
use crate::forward::reader::ForwardIndexReader;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{ensure_sorted_unique, SpanQuery, SpanQueryBox};
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches every token position where the (single-token) clause does not
/// match. The token universe comes from the forward index's per-document
/// lengths, so negation is always bounded.
#[derive(Clone, Debug)]
pub struct SpanQueryNot {
    clause: SpanQueryBox,
}

impl SpanQueryNot {
    pub fn new(clause: SpanQueryBox) -> Self {
        Self { clause }
    }
}

impl SpanQuery for SpanQueryNot {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let rewritten = self.clause.rewrite(reader)?;
        if !rewritten.produces_single_tokens() {
            return Err(EngineError::Query(
                "can only negate single-token clauses (the complement of longer spans is unbounded)"
                    .into(),
            ));
        }
        // NOT NOT a == a
        if rewritten.is_single_token_not() && rewritten.okay_to_invert() {
            return Ok(rewritten.inverted());
        }
        Ok(Box::new(SpanQueryNot::new(ensure_sorted_unique(rewritten))))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let lengths = ctx.forward_reader(self.field())?;
        let clause = self.clause.spans(ctx)?;
        Ok(Some(Box::new(SpansNot::new(
            clause,
            lengths,
            ctx.max_doc(),
        ))))
    }

    fn hits_all_same_length(&self) -> bool {
        true
    }

    fn hits_length_min(&self) -> i32 {
        1
    }

    fn hits_length_max(&self) -> i32 {
        1
    }

    fn hits_start_point_sorted(&self) -> bool {
        true
    }

    fn hits_end_point_sorted(&self) -> bool {
        true
    }

    fn hits_have_unique_start(&self) -> bool {
        true
    }

    fn hits_have_unique_end(&self) -> bool {
        true
    }

    fn hits_are_unique(&self) -> bool {
        true
    }

    fn is_single_token_not(&self) -> bool {
        true
    }

    fn okay_to_invert(&self) -> bool {
        true
    }

    fn inverted(&self) -> SpanQueryBox {
        self.clause.clone()
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        // The complement visits every token the clause does not match;
        // assume it is expensive relative to the clause itself.
        self.clause.reverse_matching_cost(reader).saturating_mul(2) + 1000
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Walks every document of the segment, yielding the token positions the
/// clause does not match.
pub struct SpansNot<'a> {
    clause: Option<SpansBox<'a>>,
    lengths: ForwardIndexReader,
    max_doc: i32,
    current_doc: i32,
    doc_length: i32,
    position: i32,
    /// Clause start positions within the current doc, sorted.
    excluded: Vec<i32>,
}

impl<'a> SpansNot<'a> {
    pub fn new(clause: Option<SpansBox<'a>>, lengths: ForwardIndexReader, max_doc: i32) -> Self {
        Self {
            clause,
            lengths,
            max_doc,
            current_doc: -1,
            doc_length: 0,
            position: -1,
            excluded: Vec::new(),
        }
    }

    /// Load the clause's matched positions for a doc.
    fn load_excluded(&mut self, doc: i32) -> Result<()> {
        self.excluded.clear();
        let Some(clause) = self.clause.as_mut() else {
            return Ok(());
        };
        let mut clause_doc = clause.doc_id();
        if clause_doc < doc {
            clause_doc = clause.advance(doc)?;
        }
        if clause_doc != doc {
            return Ok(());
        }
        loop {
            let start = clause.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                self.excluded.dedup();
                return Ok(());
            }
            self.excluded.push(start);
        }
    }

    fn has_free_position(&self) -> bool {
        (self.excluded.len() as i32) < self.doc_length
    }
}

impl Spans for SpansNot<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        loop {
            if self.current_doc >= self.max_doc - 1 {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.current_doc += 1;
            self.doc_length = self.lengths.doc_length(self.current_doc)?;
            self.position = -1;
            self.load_excluded(self.current_doc)?;
            if self.doc_length > 0 && self.has_free_position() {
                return Ok(self.current_doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if target >= self.max_doc {
            self.current_doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.current_doc = target - 1;
        self.next_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        loop {
            self.position += 1;
            if self.position >= self.doc_length {
                self.position = NO_MORE_POSITIONS;
                return Ok(NO_MORE_POSITIONS);
            }
            if self.excluded.binary_search(&self.position).is_err() {
                return Ok(self.position);
            }
        }
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn start_position(&self) -> i32 {
        self.position
    }

    fn end_position(&self) -> i32 {
        if self.position == NO_MORE_POSITIONS {
            NO_MORE_POSITIONS
        } else {
            self.position + 1
        }
    }
}
