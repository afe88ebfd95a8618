//! Named capture: records the clause's `(start, end)` into a slot for
//! every hit.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_POSITIONS};

#[derive(Clone, Debug)]
pub struct SpanQueryCapture {
    clause: SpanQueryBox,
    name: String,
}

impl SpanQueryCapture {
    pub fn new(clause: SpanQueryBox, name: impl Into<String>) -> Self {
        Self {
            clause,
            name: name.into(),
        }
    }
}

impl SpanQuery for SpanQueryCapture {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        Ok(Box::new(SpanQueryCapture::new(
            self.clause.rewrite(reader)?,
            self.name.clone(),
        )))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let Some(clause) = self.clause.spans(ctx)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(SpansCapture::new(clause, self.name.clone()))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clause.matches_empty_sequence()
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        Ok(Box::new(SpanQueryCapture::new(
            self.clause.no_empty()?,
            self.name.clone(),
        )))
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

pub struct SpansCapture<'a> {
    clause: SpansBox<'a>,
    name: String,
    slot: Option<usize>,
}

impl<'a> SpansCapture<'a> {
    pub fn new(clause: SpansBox<'a>, name: String) -> Self {
        Self {
            clause,
            name,
            slot: None,
        }
    }
}

impl Spans for SpansCapture<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        self.clause.next_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        self.clause.next_start_position()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
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
        self.slot = Some(context.register_capture(&self.name));
        self.clause.register_captures(context);
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        if let Some(slot) = self.slot {
            let start = self.start_position();
            if start != -1 && start != NO_MORE_POSITIONS {
                buffer[slot] = Some((start, self.end_position()));
            }
        }
        self.clause.get_captured_groups(buffer);
    }
}
