//! Streaming dedupe of adjacent identical hits. Requires start-point
//! sorted input, where duplicates are always adjacent.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_POSITIONS};

#[derive(Clone, Debug)]
pub struct SpanQueryUnique {
    clause: SpanQueryBox,
}

impl SpanQueryUnique {
    pub fn new(clause: SpanQueryBox) -> Self {
        debug_assert!(clause.hits_start_point_sorted());
        Self { clause }
    }
}

impl SpanQuery for SpanQueryUnique {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let rewritten = self.clause.rewrite(reader)?;
        if rewritten.hits_are_unique() {
            return Ok(rewritten);
        }
        Ok(Box::new(SpanQueryUnique::new(rewritten)))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let Some(clause) = self.clause.spans(ctx)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(SpansUnique::new(clause))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clause.matches_empty_sequence()
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        Ok(Box::new(SpanQueryUnique::new(self.clause.no_empty()?)))
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
        true
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        self.clause.reverse_matching_cost(reader)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

pub struct SpansUnique<'a> {
    clause: SpansBox<'a>,
    last: Option<(i32, i32)>,
}

impl<'a> SpansUnique<'a> {
    pub fn new(clause: SpansBox<'a>) -> Self {
        Self { clause, last: None }
    }
}

impl Spans for SpansUnique<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        self.last = None;
        self.clause.next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.last = None;
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        loop {
            let start = self.clause.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                return Ok(NO_MORE_POSITIONS);
            }
            let hit = (start, self.clause.end_position());
            if self.last != Some(hit) {
                self.last = Some(hit);
                return Ok(start);
            }
        }
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
