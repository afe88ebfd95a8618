//! Repetition: `A{min,max}`, chains of 1..n adjacent clause hits.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Fragment, NfaBuilder};
use crate::query::ast::{SpanQuery, SpanQueryBox, MAX_UNLIMITED};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches `min` to `max` concatenated hits of the clause. `min == 0`
/// means the repetition also matches the empty sequence; the empty match
/// itself is produced by sequence distribution, not by this node.
#[derive(Clone, Debug)]
pub struct SpanQueryRepetition {
    clause: SpanQueryBox,
    min: i32,
    max: i32,
}

impl SpanQueryRepetition {
    pub fn new(clause: SpanQueryBox, min: i32, max: i32) -> Self {
        debug_assert!(min >= 0 && max >= 1 && min <= max);
        Self { clause, min, max }
    }

    pub fn bounds(&self) -> (i32, i32) {
        (self.min, self.max)
    }
}

impl SpanQuery for SpanQueryRepetition {
    fn field(&self) -> &str {
        self.clause.field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let clause = self.clause.rewrite(reader)?;
        if clause.matches_empty_sequence() {
            // A{0,2} of an empty-matching A collapses the lower bound.
            let clause = clause.no_empty()?;
            return Ok(Box::new(SpanQueryRepetition::new(clause, 0, self.max)));
        }
        if self.min == self.max && self.min == 1 {
            return Ok(clause);
        }
        Ok(Box::new(SpanQueryRepetition::new(clause, self.min, self.max)))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        if self.clause.matches_empty_sequence() {
            return Err(EngineError::Query(
                "repetition of an empty-matching clause; query was not rewritten".into(),
            ));
        }
        let Some(clause_spans) = self.clause.spans(ctx)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(SpansRepetition::new(
            clause_spans,
            self.min.max(1),
            self.max,
        ))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.min == 0 || self.clause.matches_empty_sequence()
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        if !self.matches_empty_sequence() {
            return Ok(self.clone_box());
        }
        Ok(Box::new(SpanQueryRepetition::new(
            self.clause.no_empty()?,
            self.min.max(1),
            self.max,
        )))
    }

    fn hits_all_same_length(&self) -> bool {
        self.clause.hits_all_same_length() && self.min == self.max
    }

    fn hits_length_min(&self) -> i32 {
        self.clause.hits_length_min().saturating_mul(self.min.max(1))
    }

    fn hits_length_max(&self) -> i32 {
        if self.max == MAX_UNLIMITED || self.clause.hits_length_max() == MAX_UNLIMITED {
            MAX_UNLIMITED
        } else {
            self.clause.hits_length_max().saturating_mul(self.max)
        }
    }

    fn hits_start_point_sorted(&self) -> bool {
        true
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
        true
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        self.clause.reverse_matching_cost(reader)
    }

    fn can_make_nfa(&self) -> bool {
        self.clause.can_make_nfa()
    }

    fn nfa_fragment(&self, builder: &mut NfaBuilder, direction: i32) -> Result<Fragment> {
        let make = |builder: &mut NfaBuilder| self.clause.nfa_fragment(builder, direction);
        builder.repeat(make, self.min, self.max)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Per-document expansion: the clause's hits form an adjacency relation
/// on positions (start -> ends); chains of length `min..=max` are walked
/// breadth-first with the step map memoized for the doc.
pub struct SpansRepetition<'a> {
    clause: SpansBox<'a>,
    min: i32,
    max: i32,
    current_doc: i32,
    /// Hits of the current doc, sorted and unique.
    doc_hits: Vec<(i32, i32)>,
    hit_index: usize,
}

impl<'a> SpansRepetition<'a> {
    pub fn new(clause: SpansBox<'a>, min: i32, max: i32) -> Self {
        Self {
            clause,
            min,
            max,
            current_doc: -1,
            doc_hits: Vec::new(),
            hit_index: 0,
        }
    }

    /// Expand chains for the clause's current doc; false if no chain
    /// reaches the minimum length.
    fn expand_current_doc(&mut self) -> Result<bool> {
        // Memoized single-step map: start -> ends of clause hits.
        let mut step: HashMap<i32, Vec<i32>> = HashMap::new();
        loop {
            let start = self.clause.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                break;
            }
            let end = self.clause.end_position();
            if end > start {
                // Zero-width hits would chain onto themselves forever.
                step.entry(start).or_default().push(end);
            }
        }

        self.doc_hits.clear();
        self.hit_index = 0;
        for &chain_start in step.keys() {
            let mut frontier = vec![chain_start];
            let mut count = 0;
            while !frontier.is_empty() && count < self.max {
                count += 1;
                let mut next_frontier = Vec::new();
                for position in frontier {
                    if let Some(ends) = step.get(&position) {
                        next_frontier.extend_from_slice(ends);
                    }
                }
                next_frontier.sort_unstable();
                next_frontier.dedup();
                if count >= self.min {
                    for &end in &next_frontier {
                        self.doc_hits.push((chain_start, end));
                    }
                }
                frontier = next_frontier;
            }
        }
        self.doc_hits.sort_unstable();
        self.doc_hits.dedup();
        Ok(!self.doc_hits.is_empty())
    }
}

impl Spans for SpansRepetition<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        loop {
            let doc = self.clause.next_doc()?;
            if doc == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            if self.expand_current_doc()? {
                self.current_doc = doc;
                return Ok(doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        let doc = self.clause.advance(target)?;
        if doc == NO_MORE_DOCS {
            self.current_doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        if self.expand_current_doc()? {
            self.current_doc = doc;
            return Ok(doc);
        }
        self.next_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.hit_index >= self.doc_hits.len() {
            self.hit_index = self.doc_hits.len() + 1;
            return Ok(NO_MORE_POSITIONS);
        }
        let hit = self.doc_hits[self.hit_index];
        self.hit_index += 1;
        Ok(hit.0)
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn start_position(&self) -> i32 {
        if self.hit_index == 0 {
            return -1;
        }
        if self.hit_index > self.doc_hits.len() {
            return NO_MORE_POSITIONS;
        }
        self.doc_hits[self.hit_index - 1].0
    }

    fn end_position(&self) -> i32 {
        if self.hit_index == 0 {
            return -1;
        }
        if self.hit_index > self.doc_hits.len() {
            return NO_MORE_POSITIONS;
        }
        self.doc_hits[self.hit_index - 1].1
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.clause.register_captures(context);
    }
}
