//! Per-document sort and dedupe.
//!
//! The only node that materializes a whole document's hits at once. Its
//! buffer is bounded by the hits of one document; everything else in the
//! engine streams.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Buffers each document's hits, sorts them by start or end point, and
/// optionally removes duplicates. The rewriter only keeps this node when
/// the child does not already guarantee the required order.
#[derive(Clone, Debug)]
pub struct SpanQuerySorted {
    clause: SpanQueryBox,
    by_end_point: bool,
    eliminate_duplicates: bool,
}

impl SpanQuerySorted {
    pub fn new(clause: SpanQueryBox, by_end_point: bool, eliminate_duplicates: bool) -> Self {
        Self {
            clause,
            by_end_point,
            eliminate_duplicates,
        }
    }
}

impl SpanQuery for SpanQuerySorted {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let rewritten = self.clause.rewrite(reader)?;
        let must_dedupe = self.eliminate_duplicates && !rewritten.hits_are_unique();
        let must_sort = if self.by_end_point {
            !rewritten.hits_end_point_sorted()
        } else {
            !rewritten.hits_start_point_sorted()
        };
        if !must_dedupe && !must_sort {
            return Ok(rewritten);
        }
        Ok(Box::new(SpanQuerySorted::new(
            rewritten,
            self.by_end_point,
            self.eliminate_duplicates,
        )))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let Some(clause) = self.clause.spans(ctx)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(PerDocumentSortedSpans::new(
            clause,
            self.by_end_point,
            self.eliminate_duplicates,
        ))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clause.matches_empty_sequence()
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        Ok(Box::new(SpanQuerySorted::new(
            self.clause.no_empty()?,
            self.by_end_point,
            self.eliminate_duplicates,
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
        !self.by_end_point
    }

    fn hits_end_point_sorted(&self) -> bool {
        self.by_end_point || self.clause.hits_end_point_sorted()
    }

    fn hits_have_unique_start(&self) -> bool {
        self.clause.hits_have_unique_start()
    }

    fn hits_have_unique_end(&self) -> bool {
        self.clause.hits_have_unique_end()
    }

    fn hits_are_unique(&self) -> bool {
        self.eliminate_duplicates || self.clause.hits_are_unique()
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        self.clause.reverse_matching_cost(reader)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Buffered per-doc hits with their capture rows, in sorted order.
pub struct PerDocumentSortedSpans<'a> {
    clause: SpansBox<'a>,
    by_end_point: bool,
    eliminate_duplicates: bool,
    num_capture_slots: usize,
    buffer: Vec<((i32, i32), Vec<Option<(i32, i32)>>)>,
    index: usize,
    current_doc: i32,
}

impl<'a> PerDocumentSortedSpans<'a> {
    pub fn new(clause: SpansBox<'a>, by_end_point: bool, eliminate_duplicates: bool) -> Self {
        Self {
            clause,
            by_end_point,
            eliminate_duplicates,
            num_capture_slots: 0,
            buffer: Vec::new(),
            index: 0,
            current_doc: -1,
        }
    }

    fn fill_buffer(&mut self) -> Result<()> {
        self.buffer.clear();
        self.index = 0;
        loop {
            let start = self.clause.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                break;
            }
            let mut captures = vec![None; self.num_capture_slots];
            if self.num_capture_slots > 0 {
                self.clause.get_captured_groups(&mut captures);
            }
            self.buffer
                .push(((start, self.clause.end_position()), captures));
        }
        if self.by_end_point {
            self.buffer.sort_by_key(|&((s, e), _)| (e, s));
        } else {
            self.buffer.sort_by_key(|&(hit, _)| hit);
        }
        if self.eliminate_duplicates {
            self.buffer.dedup_by_key(|&mut (hit, _)| hit);
        }
        Ok(())
    }
}

impl Spans for PerDocumentSortedSpans<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        self.current_doc = self.clause.next_doc()?;
        if self.current_doc != NO_MORE_DOCS {
            self.fill_buffer()?;
        }
        Ok(self.current_doc)
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        self.current_doc = self.clause.advance(target)?;
        if self.current_doc != NO_MORE_DOCS {
            self.fill_buffer()?;
        }
        Ok(self.current_doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.index >= self.buffer.len() {
            self.index = self.buffer.len() + 1;
            return Ok(NO_MORE_POSITIONS);
        }
        let start = self.buffer[self.index].0 .0;
        self.index += 1;
        Ok(start)
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn start_position(&self) -> i32 {
        if self.index == 0 {
            return -1;
        }
        match self.buffer.get(self.index - 1) {
            Some(&(hit, _)) => hit.0,
            None => NO_MORE_POSITIONS,
        }
    }

    fn end_position(&self) -> i32 {
        if self.index == 0 {
            return -1;
        }
        match self.buffer.get(self.index - 1) {
            Some(&(hit, _)) => hit.1,
            None => NO_MORE_POSITIONS,
        }
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.clause.register_captures(context);
        self.num_capture_slots = context.num_captures();
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        if self.index == 0 {
            return;
        }
        if let Some((_, captures)) = self.buffer.get(self.index - 1) {
            for (slot, value) in buffer.iter_mut().zip(captures) {
                *slot = *value;
            }
        }
    }
}
