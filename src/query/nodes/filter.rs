//! Document-set filter: restrict a clause to an accepted set of doc ids.

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Only yields hits in documents present in the given doc id set, e.g.
/// the result of a metadata filter.
#[derive(Clone, Debug)]
pub struct SpanQueryDocFilter {
    clause: SpanQueryBox,
    docs: RoaringBitmap,
}

impl SpanQueryDocFilter {
    pub fn new(clause: SpanQueryBox, docs: RoaringBitmap) -> Self {
        Self { clause, docs }
    }
}

impl SpanQuery for SpanQueryDocFilter {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        Ok(Box::new(SpanQueryDocFilter::new(
            self.clause.rewrite(reader)?,
            self.docs.clone(),
        )))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        if self.docs.is_empty() {
            return Ok(None);
        }
        let Some(clause) = self.clause.spans(ctx)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(SpansDocFilter::new(clause, self.docs.clone()))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clause.matches_empty_sequence()
    }

    fn hits_all_same_length(&self) -> bool {
        self.clause.hits_all_same_length()
    }

    fn hits_length_min(&self) -> i32 {
        self.clause.hits_length_min()
    }

    fn hits_length_max(&self) -> i32 {
        self.clause.hits_length_max()
    }

    fn hits_start_point_sorted(&self) -> bool {
        self.clause.hits_start_point_sorted()
    }

    fn hits_end_point_sorted(&self) -> bool {
        self.clause.hits_end_point_sorted()
    }

    fn hits_have_unique_start(&self) -> bool {
        self.clause.hits_have_unique_start()
    }

    fn hits_have_unique_end(&self) -> bool {
        self.clause.hits_have_unique_end()
    }

    fn hits_are_unique(&self) -> bool {
        self.clause.hits_are_unique()
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        self.clause.reverse_matching_cost(reader)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Cursor over an accepted-docs bitmap, advanced in lockstep with the
/// clause spans.
struct DocSetCursor {
    docs: Vec<u32>,
    index: usize,
    current: i32,
}

impl DocSetCursor {
    fn new(docs: RoaringBitmap) -> Self {
        Self {
            docs: docs.iter().collect(),
            index: 0,
            current: -1,
        }
    }

    fn next_doc(&mut self) -> i32 {
        self.advance(self.current + 1)
    }

    fn advance(&mut self, target: i32) -> i32 {
        let target = target.max(0) as u32;
        self.index += self.docs[self.index..].partition_point(|&d| d < target);
        self.current = match self.docs.get(self.index) {
            Some(&doc) => doc as i32,
            None => NO_MORE_DOCS,
        };
        self.current
    }

    fn doc_id(&self) -> i32 {
        self.current
    }
}

/// Keeps the clause and the doc set synchronized on a common document.
pub struct SpansDocFilter<'a> {
    clause: SpansBox<'a>,
    docs: DocSetCursor,
    more: bool,
}

impl<'a> SpansDocFilter<'a> {
    pub fn new(clause: SpansBox<'a>, docs: RoaringBitmap) -> Self {
        let mut docs = DocSetCursor::new(docs);
        let more = docs.next_doc() != NO_MORE_DOCS;
        Self { clause, docs, more }
    }

    fn synchronize(&mut self) -> Result<i32> {
        while self.more && self.clause.doc_id() != self.docs.doc_id() {
            if self.clause.doc_id() < self.docs.doc_id() {
                self.more = self.clause.advance(self.docs.doc_id())? != NO_MORE_DOCS;
            } else if self.docs.advance(self.clause.doc_id()) == NO_MORE_DOCS {
                self.more = false;
            }
        }
        Ok(if self.more {
            self.clause.doc_id()
        } else {
            NO_MORE_DOCS
        })
    }
}

impl Spans for SpansDocFilter<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        if !self.more {
            return Ok(NO_MORE_DOCS);
        }
        self.more = self.clause.next_doc()? != NO_MORE_DOCS;
        self.synchronize()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if !self.more {
            return Ok(NO_MORE_DOCS);
        }
        self.more = self.clause.advance(target)? != NO_MORE_DOCS;
        self.synchronize()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if !self.more {
            return Ok(NO_MORE_POSITIONS);
        }
        self.clause.next_start_position()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        if !self.more {
            return Ok(NO_MORE_POSITIONS);
        }
        self.clause.advance_start_position(target)
    }

    fn doc_id(&self) -> i32 {
        self.clause.doc_id()
    }

    fn start_position(&self) -> i32 {
        self.clause.start_position()
    }

    fn end_position(&self) -> i32 {
        self.clause.end_position()
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.clause.register_captures(context);
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        self.clause.get_captured_groups(buffer);
    }
}
