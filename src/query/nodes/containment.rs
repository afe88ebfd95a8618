//! Positional filters: keep producer hits by their relation to filter
//! hits in the same document.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{ensure_sorted, SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// How a producer hit must relate to some filter hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainmentOp {
    /// Producer contains a filter hit.
    Containing,
    /// Producer lies within a filter hit.
    Within,
    /// Producer starts where a filter hit starts.
    StartingAt,
    /// Producer ends where a filter hit ends.
    EndingAt,
}

impl ContainmentOp {
    fn accepts(self, producer: (i32, i32), filter: (i32, i32)) -> bool {
        match self {
            ContainmentOp::Containing => producer.0 <= filter.0 && filter.1 <= producer.1,
            ContainmentOp::Within => filter.0 <= producer.0 && producer.1 <= filter.1,
            ContainmentOp::StartingAt => producer.0 == filter.0,
            ContainmentOp::EndingAt => producer.1 == filter.1,
        }
    }
}

/// Filters producer hits by a positional relation to filter hits.
#[derive(Clone, Debug)]
pub struct SpanQueryContainment {
    producer: SpanQueryBox,
    filter: SpanQueryBox,
    op: ContainmentOp,
    invert: bool,
}

impl SpanQueryContainment {
    pub fn new(
        producer: SpanQueryBox,
        filter: SpanQueryBox,
        op: ContainmentOp,
        invert: bool,
    ) -> Self {
        Self {
            producer,
            filter,
            op,
            invert,
        }
    }
}

impl SpanQuery for SpanQueryContainment {
    fn field(&self) -> &str {
        self.producer.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let producer = ensure_sorted(self.producer.rewrite(reader)?);
        let filter = self.filter.rewrite(reader)?;
        Ok(Box::new(SpanQueryContainment::new(
            producer,
            filter,
            self.op,
            self.invert,
        )))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let Some(producer) = self.producer.spans(ctx)? else {
            return Ok(None);
        };
        let filter = self.filter.spans(ctx)?;
        let Some(filter) = filter else {
            // No filter hits anywhere in the segment: everything fails the
            // relation, or everything passes when inverted.
            return if self.invert { Ok(Some(producer)) } else { Ok(None) };
        };
        Ok(Some(Box::new(SpansContainment::new(
            producer,
            filter,
            self.op,
            self.invert,
        ))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.producer.matches_empty_sequence()
    }

    fn hits_all_same_length(&self) -> bool {
        self.producer.hits_all_same_length()
    }

    fn hits_length_min(&self) -> i32 {
        self.producer.hits_length_min()
    }

    fn hits_length_max(&self) -> i32 {
        self.producer.hits_length_max()
    }

    fn hits_start_point_sorted(&self) -> bool {
        true
    }

    fn hits_end_point_sorted(&self) -> bool {
        self.producer.hits_end_point_sorted()
    }

    fn hits_have_unique_start(&self) -> bool {
        self.producer.hits_have_unique_start()
    }

    fn hits_have_unique_end(&self) -> bool {
        self.producer.hits_have_unique_end()
    }

    fn hits_are_unique(&self) -> bool {
        self.producer.hits_are_unique()
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        self.producer.reverse_matching_cost(reader)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Streams producer hits, testing each against the filter hits of the
/// same document.
pub struct SpansContainment<'a> {
    producer: SpansBox<'a>,
    filter: SpansBox<'a>,
    op: ContainmentOp,
    invert: bool,
    /// Filter hits of the doc both sides agree on; empty when the filter
    /// has no hits in the producer's current doc.
    filter_hits: Vec<(i32, i32)>,
    current_doc: i32,
    /// First accepted hit of a fresh doc, found by next_doc and delivered
    /// by the following next_start_position; -1 when none pending.
    pending_start: i32,
}

impl<'a> SpansContainment<'a> {
    pub fn new(
        producer: SpansBox<'a>,
        filter: SpansBox<'a>,
        op: ContainmentOp,
        invert: bool,
    ) -> Self {
        Self {
            producer,
            filter,
            op,
            invert,
            filter_hits: Vec::new(),
            current_doc: -1,
            pending_start: -1,
        }
    }

    /// Gather the filter hits for the producer's current doc (none if the
    /// filter skips it).
    fn load_filter_hits(&mut self) -> Result<()> {
        self.filter_hits.clear();
        let producer_doc = self.producer.doc_id();
        let mut filter_doc = self.filter.doc_id();
        if filter_doc == -1 {
            filter_doc = self.filter.next_doc()?;
        }
        if filter_doc < producer_doc {
            filter_doc = self.filter.advance(producer_doc)?;
        }
        if filter_doc != producer_doc {
            return Ok(());
        }
        loop {
            let start = self.filter.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                return Ok(());
            }
            self.filter_hits.push((start, self.filter.end_position()));
        }
    }

    fn accepts_current(&self) -> bool {
        let hit = (self.producer.start_position(), self.producer.end_position());
        let related = self.filter_hits.iter().any(|&f| self.op.accepts(hit, f));
        related != self.invert
    }

    /// Move the producer to the next doc with at least one accepted hit;
    /// leaves the first accepted hit pending.
    fn to_doc_with_match(&mut self, mut doc: i32) -> Result<i32> {
        loop {
            if doc == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.load_filter_hits()?;
            self.pending_start = self.first_match()?;
            if self.pending_start != NO_MORE_POSITIONS {
                self.current_doc = doc;
                return Ok(doc);
            }
            doc = self.producer.next_doc()?;
        }
    }

    fn first_match(&mut self) -> Result<i32> {
        loop {
            let start = self.producer.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                return Ok(NO_MORE_POSITIONS);
            }
            if self.accepts_current() {
                return Ok(start);
            }
        }
    }
}

impl Spans for SpansContainment<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let doc = self.producer.next_doc()?;
        self.to_doc_with_match(doc)
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let doc = self.producer.advance(target)?;
        self.to_doc_with_match(doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.pending_start != -1 {
            let start = self.pending_start;
            self.pending_start = -1;
            return Ok(start);
        }
        self.first_match()
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn start_position(&self) -> i32 {
        self.producer.start_position()
    }

    fn end_position(&self) -> i32 {
        self.producer.end_position()
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.producer.register_captures(context);
        self.filter.register_captures(context);
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        self.producer.get_captured_groups(buffer);
    }
}
