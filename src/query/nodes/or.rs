//! Disjunction: a k-way merge of the clause hits by `(doc, start, end)`.

use crate::error::Result;
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Fragment, NfaBuilder};
use crate::query::ast::{SpanQuery, SpanQueryBox, MAX_UNLIMITED};
use crate::query::context::HitQueryContext;
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches hits of any clause. Start-point sort order is preserved when
/// every clause is start-point sorted.
#[derive(Clone, Debug)]
pub struct SpanQueryOr {
    clauses: Vec<SpanQueryBox>,
}

impl SpanQueryOr {
    pub fn new(clauses: Vec<SpanQueryBox>) -> Self {
        debug_assert!(!clauses.is_empty());
        Self { clauses }
    }

    pub fn clauses(&self) -> &[SpanQueryBox] {
        &self.clauses
    }
}

impl SpanQuery for SpanQueryOr {
    fn field(&self) -> &str {
        self.clauses[0].field()
    }

    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox> {
        // Rewrite children, flattening nested ORs.
        let mut rewritten: Vec<SpanQueryBox> = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let clause = clause.rewrite(reader)?;
            match clause.as_or_clauses() {
                Some(inner) => rewritten.extend(inner),
                None => rewritten.push(clause),
            }
        }
        if rewritten.len() == 1 {
            return Ok(rewritten.pop().unwrap_or_else(|| self.clone_box()));
        }
        Ok(Box::new(SpanQueryOr::new(rewritten)))
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let mut children = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            if let Some(spans) = clause.spans(ctx)? {
                children.push(spans);
            }
        }
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(SpansOr::new(children))))
    }

    fn matches_empty_sequence(&self) -> bool {
        self.clauses.iter().any(|c| c.matches_empty_sequence())
    }

    fn no_empty(&self) -> Result<SpanQueryBox> {
        if !self.matches_empty_sequence() {
            return Ok(self.clone_box());
        }
        let clauses = self
            .clauses
            .iter()
            .map(|c| c.no_empty())
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(SpanQueryOr::new(clauses)))
    }

    fn hits_all_same_length(&self) -> bool {
        let min = self.clauses[0].hits_length_min();
        self.clauses
            .iter()
            .all(|c| c.hits_all_same_length() && c.hits_length_min() == min)
    }

    fn hits_length_min(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_min())
            .min()
            .unwrap_or(0)
    }

    fn hits_length_max(&self) -> i32 {
        self.clauses
            .iter()
            .map(|c| c.hits_length_max())
            .max()
            .unwrap_or(MAX_UNLIMITED)
    }

    fn hits_start_point_sorted(&self) -> bool {
        self.clauses.iter().all(|c| c.hits_start_point_sorted())
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
        self.clauses
            .iter()
            .map(|c| c.reverse_matching_cost(reader))
            .sum()
    }

    fn can_make_nfa(&self) -> bool {
        self.clauses.iter().all(|c| c.can_make_nfa())
    }

    fn nfa_fragment(&self, builder: &mut NfaBuilder, direction: i32) -> Result<Fragment> {
        let fragments = self
            .clauses
            .iter()
            .map(|c| c.nfa_fragment(builder, direction))
            .collect::<Result<Vec<_>>>()?;
        Ok(builder.alternatives(fragments))
    }

    fn as_or_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        Some(self.clauses.clone())
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// K-way merge over child spans.
pub struct SpansOr<'a> {
    children: Vec<SpansBox<'a>>,
    child_docs: Vec<i32>,
    /// (start, end) of the next pending hit per child on the current doc;
    /// start is NO_MORE_POSITIONS when the child's doc is drained.
    child_positions: Vec<(i32, i32)>,
    on_current_doc: Vec<bool>,
    current_doc: i32,
    start: i32,
    end: i32,
    /// Child whose hit we yielded last; advanced lazily so its capture
    /// state stays valid until the next call.
    pending_advance: Option<usize>,
    started: bool,
}

impl<'a> SpansOr<'a> {
    pub fn new(children: Vec<SpansBox<'a>>) -> Self {
        let n = children.len();
        Self {
            children,
            child_docs: vec![-1; n],
            child_positions: vec![(NO_MORE_POSITIONS, NO_MORE_POSITIONS); n],
            on_current_doc: vec![false; n],
            current_doc: -1,
            start: -1,
            end: -1,
            pending_advance: None,
            started: false,
        }
    }

    fn select_current_doc(&mut self) -> Result<i32> {
        self.current_doc = self.child_docs.iter().copied().min().unwrap_or(NO_MORE_DOCS);
        self.start = -1;
        self.end = -1;
        self.pending_advance = None;
        if self.current_doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        for i in 0..self.children.len() {
            self.on_current_doc[i] = self.child_docs[i] == self.current_doc;
            if self.on_current_doc[i] {
                let start = self.children[i].next_start_position()?;
                let end = self.children[i].end_position();
                self.child_positions[i] = (start, end);
            }
        }
        Ok(self.current_doc)
    }
}

impl Spans for SpansOr<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        if !self.started {
            self.started = true;
            for i in 0..self.children.len() {
                self.child_docs[i] = self.children[i].next_doc()?;
            }
        } else {
            if self.current_doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for i in 0..self.children.len() {
                if self.child_docs[i] == self.current_doc {
                    self.child_docs[i] = self.children[i].next_doc()?;
                }
            }
        }
        self.select_current_doc()
    }

    fn advance(&mut self, target: i32) -> Result<i32> {
        if !self.started {
            self.started = true;
            for i in 0..self.children.len() {
                self.child_docs[i] = self.children[i].advance(target)?;
            }
        } else {
            for i in 0..self.children.len() {
                if self.child_docs[i] < target {
                    self.child_docs[i] = self.children[i].advance(target)?;
                }
            }
        }
        self.select_current_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if let Some(i) = self.pending_advance.take() {
            let next_start = self.children[i].next_start_position()?;
            self.child_positions[i] = (next_start, self.children[i].end_position());
        }
        let mut best: Option<usize> = None;
        for i in 0..self.children.len() {
            if !self.on_current_doc[i] || self.child_positions[i].0 == NO_MORE_POSITIONS {
                continue;
            }
            best = match best {
                Some(b) if self.child_positions[b] <= self.child_positions[i] => Some(b),
                _ => Some(i),
            };
        }
        let Some(i) = best else {
            self.start = NO_MORE_POSITIONS;
            self.end = NO_MORE_POSITIONS;
            return Ok(NO_MORE_POSITIONS);
        };
        (self.start, self.end) = self.child_positions[i];
        self.pending_advance = Some(i);
        Ok(self.start)
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
        if let Some(i) = self.pending_advance {
            self.children[i].get_captured_groups(buffer);
        }
    }
}
