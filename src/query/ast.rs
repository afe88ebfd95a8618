//! The span-query node trait and rewriter support.
//!
//! Every node describes its own hits (length bounds, sort order,
//! uniqueness); the rewriter composes those predicates instead of
//! inspecting node internals, and only inserts sort/dedupe wrappers where
//! a guarantee is missing.

use std::fmt::Debug;

use crate::error::{EngineError, Result};
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::nfa::{Fragment, NfaBuilder};
use crate::query::nodes::not::SpanQueryNot;
use crate::query::nodes::sorted::SpanQuerySorted;
use crate::query::nodes::unique::SpanQueryUnique;
use crate::query::spans::SpansBox;

/// "No limit" value for maximum hit lengths and repetition bounds.
pub const MAX_UNLIMITED: i32 = i32::MAX;

pub type SpanQueryBox = Box<dyn SpanQuery>;

/// A node in a span query tree.
pub trait SpanQuery: Debug + Send + Sync {
    /// The annotation-qualified field this query runs on, e.g.
    /// `contents%word@i`.
    fn field(&self) -> &str;

    /// Return a semantically equivalent but optimized node.
    fn rewrite(&self, reader: &CorpusReader) -> Result<SpanQueryBox>;

    /// A spans cursor over one segment, or None when the segment cannot
    /// produce hits.
    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>>;

    /// Does this query match the empty sequence? (e.g. `A*` does.)
    fn matches_empty_sequence(&self) -> bool {
        false
    }

    /// A version of this clause that cannot match the empty sequence.
    fn no_empty(&self) -> Result<SpanQueryBox> {
        if self.matches_empty_sequence() {
            return Err(EngineError::Query(format!(
                "no non-empty version available for {self:?}"
            )));
        }
        Ok(self.clone_box())
    }

    /// The complement of this query over the token universe.
    fn inverted(&self) -> SpanQueryBox {
        Box::new(SpanQueryNot::new(self.clone_box()))
    }

    /// Is inverting this clause likely to be cheaper than evaluating it?
    fn okay_to_invert(&self) -> bool {
        false
    }

    /// Is this a pure single-token negation?
    fn is_single_token_not(&self) -> bool {
        false
    }

    fn produces_single_tokens(&self) -> bool {
        self.hits_all_same_length() && self.hits_length_min() == 1
    }

    fn hits_all_same_length(&self) -> bool;

    fn hits_length_min(&self) -> i32;

    fn hits_length_max(&self) -> i32;

    /// When hit B follows hit A: B.start >= A.start, and if starts are
    /// equal, B.end > A.end.
    fn hits_start_point_sorted(&self) -> bool;

    /// When hit B follows hit A: B.end >= A.end, and if ends are equal,
    /// B.start > A.start.
    fn hits_end_point_sorted(&self) -> bool;

    fn hits_have_unique_start(&self) -> bool;

    fn hits_have_unique_end(&self) -> bool;

    fn hits_are_unique(&self) -> bool;

    /// Very rough estimate of the work needed to evaluate this clause via
    /// the inverted index. Used to pick join drivers and forward-index
    /// candidates.
    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64;

    /// Can this subtree compile to a forward-index NFA?
    fn can_make_nfa(&self) -> bool {
        false
    }

    /// Clauses of an OR node; used by the rewriter to flatten nested
    /// disjunctions.
    fn as_or_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        None
    }

    /// Clauses of an AND node; used by the rewriter to flatten nested
    /// conjunctions.
    fn as_and_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        None
    }

    /// Clauses of a sequence node; used by the rewriter to flatten nested
    /// sequences.
    fn as_sequence_clauses(&self) -> Option<Vec<SpanQueryBox>> {
        None
    }

    /// Append this query's NFA fragment to the builder. `direction` is +1
    /// for left-to-right matching, -1 for right-to-left.
    fn nfa_fragment(&self, _builder: &mut NfaBuilder, _direction: i32) -> Result<Fragment> {
        Err(EngineError::Query(format!(
            "cannot match {self:?} against the forward index"
        )))
    }

    fn clone_box(&self) -> SpanQueryBox;
}

impl Clone for SpanQueryBox {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Add two maximum-length values, where [`MAX_UNLIMITED`] is infinity.
pub fn add_max_values(a: i32, b: i32) -> i32 {
    debug_assert!(a >= 0 && b >= 0);
    if a == MAX_UNLIMITED || b == MAX_UNLIMITED {
        MAX_UNLIMITED
    } else {
        a.saturating_add(b)
    }
}

/// Wrap a query so its hits come out start-point sorted, unless they
/// already are.
pub fn ensure_sorted(query: SpanQueryBox) -> SpanQueryBox {
    if query.hits_start_point_sorted() {
        return query;
    }
    Box::new(SpanQuerySorted::new(query, false, false))
}

/// Wrap a query so its hits come out start-point sorted and unique,
/// adding only the passes that are missing.
pub fn ensure_sorted_unique(query: SpanQueryBox) -> SpanQueryBox {
    if query.hits_start_point_sorted() {
        if query.hits_are_unique() {
            return query;
        }
        return Box::new(SpanQueryUnique::new(query));
    }
    let dedupe = !query.hits_are_unique();
    Box::new(SpanQuerySorted::new(query, false, dedupe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_max_values() {
        assert_eq!(add_max_values(2, 3), 5);
        assert_eq!(add_max_values(2, MAX_UNLIMITED), MAX_UNLIMITED);
        assert_eq!(add_max_values(MAX_UNLIMITED, MAX_UNLIMITED), MAX_UNLIMITED);
    }
}
