//! Per-segment term table: term strings and their sort positions under
//! both sensitivities.

use crate::collation::MatchSensitivity;
use crate::forward::NO_TERM;

/// One term as yielded by [`SegmentTerms::iter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermInSegment<'a> {
    pub id: i32,
    pub term: &'a str,
    pub sort_position_sensitive: i32,
    pub sort_position_insensitive: i32,
}

/// The term table of one `(segment, field)`, loaded from the codec files.
/// Immutable; shareable across threads.
#[derive(Debug)]
pub struct SegmentTerms {
    terms: Vec<String>,
    term_id2sensitive: Vec<i32>,
    sensitive2term_id: Vec<i32>,
    term_id2insensitive: Vec<i32>,
    insensitive2term_id: Vec<i32>,
}

impl SegmentTerms {
    pub(crate) fn new(
        terms: Vec<String>,
        term_id2sensitive: Vec<i32>,
        sensitive2term_id: Vec<i32>,
        term_id2insensitive: Vec<i32>,
        insensitive2term_id: Vec<i32>,
    ) -> Self {
        Self {
            terms,
            term_id2sensitive,
            sensitive2term_id,
            term_id2insensitive,
            insensitive2term_id,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Term string for a segment term id; None outside `0..len`.
    pub fn get(&self, term_id: i32) -> Option<&str> {
        if term_id < 0 {
            return None;
        }
        self.terms.get(term_id as usize).map(String::as_str)
    }

    /// Sort position of a term under a sensitivity, or -1 for an invalid id.
    pub fn sort_position(&self, term_id: i32, sensitivity: MatchSensitivity) -> i32 {
        if term_id < 0 || term_id as usize >= self.terms.len() {
            return NO_TERM;
        }
        match sensitivity {
            MatchSensitivity::Sensitive => self.term_id2sensitive[term_id as usize],
            MatchSensitivity::Insensitive => self.term_id2insensitive[term_id as usize],
        }
    }

    /// Term id at a sort position (the representative of its run).
    pub fn term_id_at_sort_position(&self, position: i32, sensitivity: MatchSensitivity) -> i32 {
        let table = match sensitivity {
            MatchSensitivity::Sensitive => &self.sensitive2term_id,
            MatchSensitivity::Insensitive => &self.insensitive2term_id,
        };
        if position < 0 || position as usize >= table.len() {
            return NO_TERM;
        }
        table[position as usize]
    }

    /// All terms in id order, with their sort positions.
    pub fn iter(&self) -> impl Iterator<Item = TermInSegment<'_>> {
        self.terms.iter().enumerate().map(|(id, term)| TermInSegment {
            id: id as i32,
            term,
            sort_position_sensitive: self.term_id2sensitive[id],
            sort_position_insensitive: self.term_id2insensitive[id],
        })
    }

    /// Do all these term ids refer to collation-equal terms?
    pub fn terms_equal(&self, term_ids: &[i32], sensitivity: MatchSensitivity) -> bool {
        if term_ids.len() < 2 {
            return true;
        }
        let expected = self.sort_position(term_ids[0], sensitivity);
        term_ids[1..]
            .iter()
            .all(|&id| self.sort_position(id, sensitivity) == expected)
    }
}
