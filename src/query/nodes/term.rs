//! Single-term query: the postings of one `(field, term)`.

use crate::error::Result;
use crate::index::postings::{PostingsCursor, NO_MORE_DOCS as POSTINGS_NO_MORE_DOCS};
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Fragment, NfaBuilder, TokenPredicate};
use crate::query::ast::{SpanQuery, SpanQueryBox};
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches every occurrence of one term; hits are single tokens,
/// start-point sorted and unique.
#[derive(Clone, Debug)]
pub struct SpanQueryTerm {
    field: String,
    term: String,
}

impl SpanQueryTerm {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }
}

impl SpanQuery for SpanQueryTerm {
    fn field(&self) -> &str {
        &self.field
    }

    fn rewrite(&self, _reader: &CorpusReader) -> Result<SpanQueryBox> {
        Ok(self.clone_box())
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let cursor = ctx.postings.postings(&self.field, self.term.as_bytes())?;
        Ok(cursor.map(|cursor| Box::new(TermSpans::new(cursor)) as SpansBox<'a>))
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

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        reader.doc_freq(&self.field, &self.term)
    }

    fn can_make_nfa(&self) -> bool {
        true
    }

    fn nfa_fragment(&self, builder: &mut NfaBuilder, _direction: i32) -> Result<Fragment> {
        Ok(builder.token(
            self.field.clone(),
            TokenPredicate::literal(&self.term),
        ))
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Spans over one term's postings; each occurrence is a width-1 hit.
pub struct TermSpans<'a> {
    cursor: Box<dyn PostingsCursor + 'a>,
    doc: i32,
    start: i32,
    positions_left: i32,
}

impl<'a> TermSpans<'a> {
    pub fn new(cursor: Box<dyn PostingsCursor + 'a>) -> Self {
        Self {
            cursor,
            doc: -1,
            start: -1,
            positions_left: 0,
        }
    }
}

impl Spans for TermSpans<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        let doc = self.cursor.next_doc();
        self.doc = if doc == POSTINGS_NO_MORE_DOCS {
            NO_MORE_DOCS
        } else {
            doc
        };
        self.start = -1;
        self.positions_left = if self.doc == NO_MORE_DOCS {
            0
        } else {
            self.cursor.freq()
        };
        Ok(self.doc)
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let doc = self.cursor.advance(target);
        self.doc = if doc == POSTINGS_NO_MORE_DOCS {
            NO_MORE_DOCS
        } else {
            doc
        };
        self.start = -1;
        self.positions_left = if self.doc == NO_MORE_DOCS {
            0
        } else {
            self.cursor.freq()
        };
        Ok(self.doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.positions_left == 0 {
            self.start = NO_MORE_POSITIONS;
            return Ok(NO_MORE_POSITIONS);
        }
        self.positions_left -= 1;
        self.start = self.cursor.next_position()?;
        Ok(self.start)
    }

    fn doc_id(&self) -> i32 {
        self.doc
    }

    fn start_position(&self) -> i32 {
        self.start
    }

    fn end_position(&self) -> i32 {
        if self.start == NO_MORE_POSITIONS {
            NO_MORE_POSITIONS
        } else {
            self.start + 1
        }
    }
}
