//! Forward-index fusion: anchor hits extended by an NFA evaluated
//! against the forward index.
//!
//! Produced by the sequence rewriter when a clause is much more expensive
//! to match through the inverted index than its neighbour. The expensive
//! clause is compiled to an NFA once (term predicates expanded to global
//! term ids); at query time each anchor hit is extended by matching the
//! NFA from the anchor's edge, forward or backward.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::fieldname;
use crate::forward::accessor::{CorpusForwardIndexAccessor, CorpusForwardIndexDocument};
use crate::forward::GlobalTerms;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Nfa, NfaBuilder};
use crate::query::ast::{add_max_values, SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

#[derive(Clone)]
pub struct SpanQueryForwardMatch {
    anchor: SpanQueryBox,
    /// Kept for cost estimates and diagnostics.
    nfa_source: SpanQueryBox,
    nfa: Nfa,
    base_field: String,
    annotations: Vec<String>,
    globals: Vec<Arc<GlobalTerms>>,
    /// +1: the NFA clause follows the anchor; -1: it precedes it.
    direction: i32,
}

impl fmt::Debug for SpanQueryForwardMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanQueryForwardMatch")
            .field("anchor", &self.anchor)
            .field("nfa_source", &self.nfa_source)
            .field("direction", &self.direction)
            .finish()
    }
}

impl SpanQueryForwardMatch {
    /// Compile `nfa_clause` to an NFA over global term ids and pair it
    /// with `anchor`.
    pub fn compile(
        anchor: SpanQueryBox,
        nfa_clause: SpanQueryBox,
        direction: i32,
        reader: &CorpusReader,
    ) -> Result<Self> {
        let base_field = fieldname::base_name(nfa_clause.field()).to_string();
        let mut accessor = CorpusForwardIndexAccessor::new(reader, base_field);
        let mut builder = NfaBuilder::new();
        let fragment = nfa_clause.nfa_fragment(&mut builder, direction)?;
        let mut nfa = builder.finish(fragment);
        nfa.lookup(&mut accessor)?;
        let (base_field, annotations, globals) = accessor.into_parts();
        Ok(Self {
            anchor,
            nfa_source: nfa_clause,
            nfa,
            base_field,
            annotations,
            globals,
            direction,
        })
    }
}

impl SpanQuery for SpanQueryForwardMatch {
    fn field(&self) -> &str {
        self.anchor.field()
    }

    fn rewrite(&self, _reader: &CorpusReader) -> Result<SpanQueryBox> {
        Ok(self.clone_box())
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let Some(anchor) = self.anchor.spans(ctx)? else {
            return Ok(None);
        };
        let mut readers = Vec::with_capacity(self.annotations.len());
        for annotation in &self.annotations {
            let field = fieldname::annotation_field(&self.base_field, annotation, None);
            readers.push(ctx.forward_reader(&field)?);
        }
        let document =
            CorpusForwardIndexDocument::from_parts(readers, self.globals.clone(), ctx.ord, -1);
        Ok(Some(Box::new(ForwardMatchSpans {
            anchor,
            nfa: self.nfa.clone(),
            direction: self.direction,
            document,
            pending: Vec::new(),
            pending_index: 0,
            start: -1,
            end: -1,
        })))
    }

    fn hits_all_same_length(&self) -> bool {
        self.anchor.hits_all_same_length() && self.nfa_source.hits_all_same_length()
    }

    fn hits_length_min(&self) -> i32 {
        self.anchor
            .hits_length_min()
            .saturating_add(self.nfa_source.hits_length_min())
    }

    fn hits_length_max(&self) -> i32 {
        add_max_values(
            self.anchor.hits_length_max(),
            self.nfa_source.hits_length_max(),
        )
    }

    fn hits_start_point_sorted(&self) -> bool {
        self.direction > 0
            && self.anchor.hits_start_point_sorted()
            && self.anchor.hits_have_unique_start()
    }

    fn hits_end_point_sorted(&self) -> bool {
        false
    }

    fn hits_have_unique_start(&self) -> bool {
        false
    }

    fn hits_have_unique_end(&self) -> bool {
        false
    }

    fn hits_are_unique(&self) -> bool {
        false
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        // The whole point: only the anchor is matched via the inverted
        // index.
        self.anchor.reverse_matching_cost(reader)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Extends each anchor hit with every NFA match at its edge.
pub struct ForwardMatchSpans<'a> {
    anchor: SpansBox<'a>,
    nfa: Nfa,
    direction: i32,
    document: CorpusForwardIndexDocument,
    /// Extended hits for the current anchor hit.
    pending: Vec<(i32, i32)>,
    pending_index: usize,
    start: i32,
    end: i32,
}

impl ForwardMatchSpans<'_> {
    /// Run the NFA at the current anchor hit's edge; fill `pending`.
    fn extend_current(&mut self) -> Result<bool> {
        self.pending.clear();
        self.pending_index = 0;
        let anchor_start = self.anchor.start_position();
        let anchor_end = self.anchor.end_position();
        let from = if self.direction > 0 {
            anchor_end
        } else {
            anchor_start - 1
        };
        let mut finals = Vec::new();
        self.nfa
            .find_matches(&mut self.document, from, self.direction, &mut finals)?;
        for final_position in finals {
            if self.direction > 0 {
                self.pending.push((anchor_start, final_position));
            } else {
                self.pending.push((final_position + 1, anchor_end));
            }
        }
        self.pending.sort_unstable();
        Ok(!self.pending.is_empty())
    }

    /// Advance the anchor until a hit with at least one extension.
    fn to_next_extended(&mut self) -> Result<bool> {
        loop {
            let start = self.anchor.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                return Ok(false);
            }
            if self.extend_current()? {
                return Ok(true);
            }
        }
    }
}

impl Spans for ForwardMatchSpans<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        loop {
            let doc = self.anchor.next_doc()?;
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            self.document.set_doc(doc);
            self.start = -1;
            self.end = -1;
            if self.to_next_extended()? {
                return Ok(doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let doc = self.anchor.advance(target)?;
        if doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.document.set_doc(doc);
        self.start = -1;
        self.end = -1;
        if self.to_next_extended()? {
            return Ok(doc);
        }
        self.next_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        loop {
            if self.pending_index < self.pending.len() {
                (self.start, self.end) = self.pending[self.pending_index];
                self.pending_index += 1;
                return Ok(self.start);
            }
            if !self.to_next_extended()? {
                self.start = NO_MORE_POSITIONS;
                self.end = NO_MORE_POSITIONS;
                return Ok(NO_MORE_POSITIONS);
            }
        }
    }

    fn doc_id(&self) -> i32 {
        self.anchor.doc_id()
    }

    fn start_position(&self) -> i32 {
        self.start
    }

    fn end_position(&self) -> i32 {
        self.end
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.anchor.register_captures(context);
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        self.anchor.get_captured_groups(buffer);
    }
}
