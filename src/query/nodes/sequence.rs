//! Concatenation: `A · B` yields `(doc, a.start, b.end)` for every pair
//! with `a.doc == b.doc` and `a.end == b.start`.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Fragment, NfaBuilder};
use crate::query::ast::{
    add_max_values, ensure_sorted, SpanQuery, SpanQueryBox,
};
use crate::query::context::HitQueryContext;
use crate::query::nodes::forward_match::SpanQueryForwardMatch;
use crate::query::nodes::or::SpanQueryOr;
use crate::query::spans::{synchronize_docs, Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Maximum number of empty-matching clauses the rewriter will distribute;
/// each one doubles the number of alternatives.
const MAX_EMPTY_CLAUSE_EXPANSION: usize = 6;

/// A sequence of clauses matched back to back.
#[derive(Clone, Debug)]
pub struct SpanQuerySequence {
    clauses: Vec<SpanQueryBox>,
}

impl SpanQuerySequence {
    pub fn new(clauses: Vec<SpanQueryBox>) -> Self {
        debug_assert!(!clauses.is_empty());
        Self { clauses }
    }

    /// Expand empty-matching clauses into an OR of all-non-empty
    /// sequences, e.g. `A* · B` becomes `(A+ · B) | B`.
    fn distribute_empty_clauses(clauses: &[SpanQueryBox]) -> Result<Vec<Vec<SpanQueryBox>>> {
        let optional: Vec<usize> = clauses
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches_empty_sequence())
            .map(|(i, _)| i)
            .collect();
        if optional.len() > MAX_EMPTY_CLAUSE_EXPANSION {
            return Err(EngineError::Query(format!(
                "too many optional clauses in sequence ({})",
                optional.len()
            )));
        }
        let mut alternatives = Vec::new();
        for mask in 0..(1u32 << optional.len()) {
            let mut combo: Vec<SpanQueryBox> = Vec::with_capacity(clauses.len());
            let mut ok = true;
            for (i, clause) in clauses.iter().enumerate() {
                match optional.iter().position(|&o| o == i) {
                    Some(bit) if mask & (1 << bit) == 0 => {} // omitted
                    Some(_) => match clause.no_empty() {
                        Ok(non_empty) => combo.push(non_empty),
                        Err(_) => {
                            // Clause only matches empty; keep only combos
                            // where it is omitted.
                            ok = false;
                            break;
                        }
                    },
                    None => combo.push(clause.clone()),
                }
            }
            if ok && !combo.is_empty() {
                alternatives.push(combo);
            }
        }
        Ok(alternatives)
    }

    /// Try to fuse the most expensive NFA-capable clause with a cheap
    /// neighbouring anchor into a forward-index match node.
    fn apply_forward_index_fusion(
        clauses: Vec<SpanQueryBox>,
        reader: &CorpusReader,
    ) -> Result<Vec<SpanQueryBox>> {
        let factor = reader.config().forward_match_factor;
        if clauses.len() < 2 {
            return Ok(clauses);
        }
        let costs: Vec<u64> = clauses
            .iter()
            .map(|c| c.reverse_matching_cost(reader))
            .collect();

        let mut best: Option<(usize, usize)> = None; // (nfa clause, anchor)
        let mut best_cost = 0u64;
        for i in 0..clauses.len() {
            if !clauses[i].can_make_nfa() {
                continue;
            }
            for anchor in [i.checked_sub(1), Some(i + 1)].into_iter().flatten() {
                if anchor >= clauses.len() {
                    continue;
                }
                if costs[i] > costs[anchor].saturating_mul(factor) && costs[i] > best_cost {
                    best = Some((i, anchor));
                    best_cost = costs[i];
                }
            }
        }
        let Some((nfa_index, anchor_index)) = best else {
            return Ok(clauses);
        };

        let direction = if nfa_index > anchor_index { 1 } else { -1 };
        let fused = SpanQueryForwardMatch::compile(
            clauses[anchor_index].clone(),
            clauses[nfa_index].clone(),
            direction,
            reader,
        )?;

        let mut result: Vec<SpanQueryBox> = Vec::with_capacity(clauses.len() - 1);
        for (i, clause) in clauses.into_iter().enumerate() {
            if i == nfa_index {
                continue;
            }
            if i == anchor_index {
                result.push(ensure_sorted(Box::new(fused.clone())));
            } else {
                result.push(clause);
            }
        }
        Ok(result)
    }
}

impl SpanQuery for SpanQuerySequence {
    fn field(&self) -> &str {
        self.clauses[0].field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        // Rewrite children, flattening nested sequences.
        let mut rewritten: Vec<SpanQueryBox> = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let clause = clause.rewrite(reader)?;
            match clause.as_sequence_clauses() {
                Some(inner) => rewritten.extend(inner),
                None => rewritten.push(clause),
            }
        }
        if rewritten.len() == 1 {
            return Ok(rewritten.pop().unwrap_or_else(|| self.clone_box()));
        }

        if rewritten.iter().any(|c| c.matches_empty_sequence()) {
            let alternatives = Self::distribute_empty_clauses(&rewritten)?;
            let mut queries: Vec<SpanQueryBox> = Vec::with_capacity(alternatives.len());
            for combo in alternatives {
                let query: SpanQueryBox = if combo.len() == 1 {
                    combo.into_iter().next().unwrap_or_else(|| self.clone_box())
                } else {
                    Box::new(SpanQuerySequence::new(combo))
                };
                queries.push(query);
            }
            return match queries.len() {
                0 => Err(EngineError::Query(
                    "sequence reduces to the empty sequence only".into(),
                )),
                1 => queries.pop().unwrap_or_else(|| self.clone_box()).rewrite(reader),
                _ => SpanQueryOr::new(queries).rewrite(reader),
            };
        }

        let fused = Self::apply_forward_index_fusion(rewritten, reader)?;
        if fused.len() == 1 {
            return Ok(fused.into_iter().next().unwrap_or_else(|| self.clone_box()));
        }
        // The right side of each join is bucketed by start position and
        // must be sorted; the left side streams in its own order.
        let clauses: Vec<SpanQueryBox> = fused
            .into_iter()
            .enumerate()
            .map(|(i, c)| if i == 0 { c } else { ensure_sorted(c) })
            .collect();
        Ok(Box::new(SpanQuerySequence::new(clauses)))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let mut spans: Option<SpansBox<'a>> = None;
        for clause in &self.clauses {
            let Some(clause_spans) = clause.spans(ctx)? else {
                return Ok(None);
            };
            spans = Some(match spans {
                None => clause_spans,
                Some(left) => Box::new(SpansSequence::new(left, clause_spans)),
            });
        }
        Ok(spans)
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clauses.iter().all(|c| c.matches_empty_sequence())
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        if !self.matches_empty_sequence() {
            return Ok(self.clone_box());
        }
        // All clauses optional: drop the all-empty combination by
        // requiring the first clause to be non-empty.
        let mut clauses = self.clauses.clone();
        clauses[0] = clauses[0].no_empty()?;
        Ok(Box::new(SpanQuerySequence::new(clauses)))
    }

    fn hits_all_same_length(&self) -> bool {
        self.clauses.iter().all(|c| c.hits_all_same_length())
    }

    fn hits_length_min(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_min())
            .fold(0, |a, b| a.saturating_add(b))
    }

    fn hits_length_max(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_max())
            .fold(0, add_max_values)
    }

    fn hits_start_point_sorted(&self) -> bool {
        // Joined ends interleave when the first clause repeats a start, so
        // no order is promised; callers wrap per rewrite rule when needed.
        false
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
        // Candidate pairs are bounded by the cheapest clause.
        self.clauses
            .iter()
            .map(|c| c.reverse_matching_cost(reader))
            .min()
            .unwrap_or(0)
    }

    fn can_make_nfa(&self) -> bool {
        self.clauses.iter().all(|c| c.can_make_nfa())
    }

    fn nfa_fragment(&self, builder: &mut NfaBuilder, direction: i32) -> Result<Fragment> {
        let mut fragment: Option<Fragment> = None;
        let clauses: Vec<&SpanQueryBox> = if direction >= 0 {
            self.clauses.iter().collect()
        } else {
            self.clauses.iter().rev().collect()
        };
        for clause in clauses {
            let next = clause.nfa_fragment(builder, direction)?;
            fragment = Some(match fragment {
                None => next,
                Some(prev) => builder.concatenate(prev, next),
            });
        }
        fragment.ok_or_else(|| EngineError::Query("empty sequence".into()))
    }

    fn as_sequence_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        Some(self.clauses.clone())
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Pairwise join: left hits stream; right hits are bucketed per document
/// by start position.
pub struct SpansSequence<'a> {
    left: SpansBox<'a>,
    right: SpansBox<'a>,
    /// Right-side bucket for the current doc: start -> sorted end list.
    right_bucket: HashMap<i32, Vec<i32>>,
    current_doc: i32,
    start: i32,
    end: i32,
    /// Remaining ends joined to the current left hit.
    pending_ends: Vec<i32>,
    pending_index: usize,
}

impl<'a> SpansSequence<'a> {
    pub fn new(left: SpansBox<'a>, right: SpansBox<'a>) -> Self {
        Self {
            left,
            right,
            right_bucket: HashMap::new(),
            current_doc: -1,
            start: -1,
            end: -1,
            pending_ends: Vec::new(),
            pending_index: 0,
        }
    }

    /// Fill the right-side bucket for the doc both sides agree on.
    fn load_right_bucket(&mut self) -> Result<()> {
        self.right_bucket.clear();
        loop {
            let start = self.right.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                break;
            }
            self.right_bucket
                .entry(start)
                .or_default()
                .push(self.right.end_position());
        }
        for ends in self.right_bucket.values_mut() {
            ends.sort_unstable();
        }
        Ok(())
    }

    /// Move to the next doc where both sides have hits and at least one
    /// joined pair exists.
    fn to_next_matching_doc(&mut self, mut left_doc: i32) -> Result<i32> {
        loop {
            if left_doc == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            let right = &mut self.right;
            if right.doc_id() == -1 && right.next_doc()? == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            let left = &mut self.left;
            let doc = synchronize_docs(left.as_mut(), right.doc_id(), &mut |target| {
                right.advance(target)
            })?;
            if doc == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.load_right_bucket()?;
            self.current_doc = doc;
            self.start = -1;
            self.end = -1;
            self.pending_ends.clear();
            self.pending_index = 0;
            if !self.right_bucket.is_empty() && self.find_first_pair()? {
                return Ok(doc);
            }
            // No joined pair here; push both sides forward.
            left_doc = self.left.next_doc()?;
            if self.right.next_doc()? == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
        }
    }

    /// Position on the first left hit with a joinable right start;
    /// leaves the pair pending for next_start_position.
    fn find_first_pair(&mut self) -> Result<bool> {
        loop {
            let left_start = self.left.next_start_position()?;
            if left_start == NO_MORE_POSITIONS {
                return Ok(false);
            }
            if let Some(ends) = self.right_bucket.get(&self.left.end_position()) {
                self.pending_ends = ends.clone();
                self.pending_index = 0;
                return Ok(true);
            }
        }
    }
}

impl Spans for SpansSequence<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let left_doc = self.left.next_doc()?;
        if self.current_doc >= 0 && self.right.next_doc()? == NO_MORE_DOCS {
            self.current_doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.to_next_matching_doc(left_doc)
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let left_doc = self.left.advance(target)?;
        if self.current_doc >= 0 && self.right.advance(target)? == NO_MORE_DOCS {
            self.current_doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.to_next_matching_doc(left_doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        loop {
            if self.pending_index < self.pending_ends.len() {
                self.start = self.left.start_position();
                self.end = self.pending_ends[self.pending_index];
                self.pending_index += 1;
                return Ok(self.start);
            }
            if !self.find_first_pair()? {
                self.start = NO_MORE_POSITIONS;
                self.end = NO_MORE_POSITIONS;
                return Ok(NO_MORE_POSITIONS);
            }
        }
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn start_position(&self) -> i32 {
        self.start
    }

    fn end_position(&self) -> i32 {
        self.end
    }

    fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.left.register_captures(context);
        self.right.register_captures(context);
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        // Right-side hits are bucketed, so only the left clause's capture
        // state is attributable to the current hit.
        self.left.get_captured_groups(buffer);
    }
}
