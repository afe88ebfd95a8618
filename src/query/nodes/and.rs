//! Conjunction of exact spans: hits present in every clause with
//! identical `(doc, start, end)`.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{ensure_sorted_unique, SpanQuery, SpanQueryBox};
use crate::query::context::HitQueryContext;
use crate::query::nodes::or::SpanQueryOr;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches `(doc, start, end)` triples that appear in all clauses.
///
/// Clause spans must be start-point sorted and unique; the rewriter wraps
/// clauses that do not already guarantee this, and orders them cheapest
/// first so the lowest-cost clause drives the join.
#[derive(Clone, Debug)]
pub struct SpanQueryAnd {
    clauses: Vec<SpanQueryBox>,
}

impl SpanQueryAnd {
    pub fn new(clauses: Vec<SpanQueryBox>) -> Self {
        debug_assert!(!clauses.is_empty());
        Self { clauses }
    }
}

impl SpanQuery for SpanQueryAnd {
    fn field(&self) -> &str {
        self.clauses[0].field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        let mut rewritten: Vec<SpanQueryBox> = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let clause = clause.rewrite(reader)?;
            match clause.as_and_clauses() {
                Some(inner) => rewritten.extend(inner),
                None => rewritten.push(clause),
            }
        }
        if rewritten.len() == 1 {
            return Ok(rewritten.pop().unwrap_or_else(|| self.clone_box()));
        }

        // All-negative conjunction: NOT a & NOT b == NOT (a | b), which
        // evaluates one complement instead of several.
        if rewritten.iter().all(|c| c.is_single_token_not() && c.okay_to_invert()) {
            let inverted: Vec<SpanQueryBox> = rewritten.iter().map(|c| c.inverted()).collect();
            let union = SpanQueryOr::new(inverted).rewrite(reader)?;
            return Ok(union.inverted());
        }

        // Cheapest clause first drives the join.
        rewritten.sort_by_key(|c| c.reverse_matching_cost(reader));
        let clauses = rewritten.into_iter().map(ensure_sorted_unique).collect();
        Ok(Box::new(SpanQueryAnd::new(clauses)))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let mut children = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            match clause.spans(ctx)? {
                Some(spans) => children.push(spans),
                // A clause with no hits in this segment empties the AND.
                None => return Ok(None),
            }
        }
        Ok(Some(Box::new(SpansAnd::new(children))))
    }

    fn hits_all_same_length(&self) -> bool {
        self.clauses.iter().any(|c| c.hits_all_same_length())
    }

    fn hits_length_min(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_min())
            .max()
            .unwrap_or(0)
    }

    fn hits_length_max(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_max())
            .min()
            .unwrap_or(0)
    }

    fn hits_start_point_sorted(&self) -> bool {
        true
    }

    fn hits_end_point_sorted(&self) -> bool {
        false
    }

    fn hits_have_unique_start(&self) -> bool {
        self.clauses.iter().any(|c| c.hits_have_unique_start())
    }

    fn hits_have_unique_end(&self) -> bool {
        self.clauses.iter().any(|c| c.hits_have_unique_end())
    }

    fn hits_are_unique(&self) -> bool {
        true
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        // The cheapest clause bounds the number of candidate hits.
        self.clauses
            .iter()
            .map(|c| c.reverse_matching_cost(reader))
            .min()
            .unwrap_or(0)
    }

    fn as_and_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        Some(self.clauses.clone())
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Merge join over start-point-sorted, unique child spans.
pub struct SpansAnd<'a> {
    children: Vec<SpansBox<'a>>,
    current_doc: i32,
    start: i32,
    end: i32,
    /// The first match of a fresh doc is found eagerly by next_doc and
    /// re-delivered by the next next_start_position call.
    pending: bool,
}

impl<'a> SpansAnd<'a> {
    pub fn new(children: Vec<SpansBox<'a>>) -> Self {
        Self {
            children,
            current_doc: -1,
            start: -1,
            end: -1,
            pending: false,
        }
    }

    /// Advance all children to the same document, starting from the first
    /// child's current doc.
    fn align_docs(&mut self, mut candidate: i32) -> Result<i32> {
        'outer: loop {
            if candidate == NO_MORE_DOCS {
                self.current_doc = NO_MORE_DOCS;
                self.pending = false;
                return Ok(NO_MORE_DOCS);
            }
            for child in &mut self.children {
                let mut doc = child.doc_id();
                if doc < candidate {
                    doc = child.advance(candidate)?;
                }
                if doc > candidate {
                    candidate = doc;
                    continue 'outer;
                }
            }
            self.current_doc = candidate;
            return Ok(candidate);
        }
    }

    /// Prime every child's first position in the current doc.
    fn start_positions(&mut self) -> Result<bool> {
        for child in &mut self.children {
            if child.next_start_position()? == NO_MORE_POSITIONS {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Align positions to a common `(start, end)`; children are sorted by
    /// `(start, end)`, so repeatedly advancing everyone to the current
    /// maximum converges or exhausts the doc.
    fn align_positions(&mut self) -> Result<i32> {
        loop {
            let mut max = (i32::MIN, i32::MIN);
            let mut all_equal = true;
            for child in &self.children {
                let tuple = (child.start_position(), child.end_position());
                if tuple.0 == NO_MORE_POSITIONS {
                    self.start = NO_MORE_POSITIONS;
                    self.end = NO_MORE_POSITIONS;
                    return Ok(NO_MORE_POSITIONS);
                }
                if tuple != max {
                    if max != (i32::MIN, i32::MIN) {
                        all_equal = false;
                    }
                    if tuple > max {
                        max = tuple;
                    }
                }
            }
            if all_equal {
                self.start = max.0;
                self.end = max.1;
                return Ok(self.start);
            }
            for child in &mut self.children {
                while (child.start_position(), child.end_position()) < max {
                    if child.start_position() < max.0 {
                        if child.advance_start_position(max.0)? == NO_MORE_POSITIONS {
                            break;
                        }
                    } else if child.next_start_position()? == NO_MORE_POSITIONS {
                        break;
                    }
                }
            }
        }
    }
}

impl Spans for SpansAnd<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        loop {
            let first = self.children[0].next_doc()?;
            if self.align_docs(first)? == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            self.start = -1;
            self.end = -1;
            if self.start_positions()? && self.align_positions()? != NO_MORE_POSITIONS {
                // Found this doc's first hit; re-deliver it lazily.
                self.pending = true;
                return Ok(self.current_doc);
            }
        }
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let first = self.children[0].advance(target)?;
        if self.align_docs(first)? == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.start = -1;
        self.end = -1;
        if self.start_positions()? && self.align_positions()? != NO_MORE_POSITIONS {
            self.pending = true;
            return Ok(self.current_doc);
        }
        self.next_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.pending {
            self.pending = false;
            return Ok(self.start);
        }
        if self.start == NO_MORE_POSITIONS {
            return Ok(NO_MORE_POSITIONS);
        }
        // Step past the current match, then re-align.
        for child in &mut self.children {
            if child.next_start_position()? == NO_MORE_POSITIONS {
                self.start = NO_MORE_POSITIONS;
                self.end = NO_MORE_POSITIONS;
                return Ok(NO_MORE_POSITIONS);
            }
        }
        self.align_positions()
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
        for child in &mut self.children {
            child.register_captures(context);
        }
    }

    fn get_captured_groups(&mut self, buffer: &mut [Option<(i32, i32)>]) {
        for child in &mut self.children {
            child.get_captured_groups(buffer);
        }
    }
}
