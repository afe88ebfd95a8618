//! Index-wide term numbering and sort orders across segments.
//!
//! Global ids are assigned in first-seen segment order and live only as
//! long as the reader. Sorting reuses per-segment sort positions where two
//! terms share a segment (within a segment the order is total, and
//! segments agree on the relative order of terms they both contain);
//! otherwise it falls back to collation keys, cached only while building.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::collation::{CollationKey, Collators, MatchSensitivity};
use crate::forward::terms::SegmentTerms;
use crate::forward::NO_TERM;

/// Term character data is chunked so the total may exceed a single
/// allocation's index range; offsets are packed `(chunk << 32) | offset`.
const CHUNK_MAX_BYTES: usize = i32::MAX as usize;

struct TermInIndex {
    term: String,
    /// Sort position within each segment, case-sensitive; -1 where absent.
    segment_pos_sensitive: Vec<i32>,
    /// Sort position within each segment, case-insensitive; -1 where absent.
    segment_pos_insensitive: Vec<i32>,
}

/// Frozen union of all segments' term tables.
pub struct GlobalTerms {
    collators: Collators,
    num_terms: usize,
    term_id2sensitive_pos: Vec<i32>,
    term_id2insensitive_pos: Vec<i32>,
    /// Start index of each group in `group2term_ids`, by sort position.
    sensitive_pos2group: Vec<i32>,
    /// Same for insensitive positions; gaps are forward-filled so binary
    /// search never lands on an uninitialized slot.
    insensitive_pos2group: Vec<i32>,
    /// A leading count followed by that many term ids, per group.
    group2term_ids: Vec<i32>,
    char_chunks: Vec<Vec<u8>>,
    term_id2char_offset: Vec<u64>,
    /// Per segment ord: segment term id -> global term id.
    segment_to_global: Vec<Vec<i32>>,
}

impl GlobalTerms {
    /// Union the given segments' term tables into a global numbering.
    pub fn build(collators: Collators, segments: &[&SegmentTerms]) -> Self {
        let n_segments = segments.len();

        // Union in first-seen order; that order is the global numbering.
        let mut terms: Vec<TermInIndex> = Vec::new();
        let mut by_string: HashMap<String, usize> = HashMap::new();
        let mut segment_to_global: Vec<Vec<i32>> = Vec::with_capacity(n_segments);

        for (ord, segment) in segments.iter().enumerate() {
            let mut mapping = vec![NO_TERM; segment.len()];
            for t in segment.iter() {
                let global_id = match by_string.get(t.term) {
                    Some(&id) => id,
                    None => {
                        let id = terms.len();
                        by_string.insert(t.term.to_string(), id);
                        terms.push(TermInIndex {
                            term: t.term.to_string(),
                            segment_pos_sensitive: vec![NO_TERM; n_segments],
                            segment_pos_insensitive: vec![NO_TERM; n_segments],
                        });
                        id
                    }
                };
                mapping[t.id as usize] = global_id as i32;
                terms[global_id].segment_pos_sensitive[ord] = t.sort_position_sensitive;
                terms[global_id].segment_pos_insensitive[ord] = t.sort_position_insensitive;
            }
            segment_to_global.push(mapping);
        }
        drop(by_string);

        let sorted_sensitive = determine_sort(&terms, &collators, MatchSensitivity::Sensitive);
        let sorted_insensitive = determine_sort(&terms, &collators, MatchSensitivity::Insensitive);
        let term_id2sensitive_pos = invert(
            &terms,
            &sorted_sensitive,
            &collators,
            MatchSensitivity::Sensitive,
        );
        let term_id2insensitive_pos = invert(
            &terms,
            &sorted_insensitive,
            &collators,
            MatchSensitivity::Insensitive,
        );

        let mut result = Self {
            collators,
            num_terms: terms.len(),
            term_id2sensitive_pos,
            term_id2insensitive_pos,
            sensitive_pos2group: Vec::new(),
            insensitive_pos2group: Vec::new(),
            group2term_ids: Vec::new(),
            char_chunks: Vec::new(),
            term_id2char_offset: Vec::new(),
            segment_to_global,
        };
        result.fill_term_groups();
        result.fill_char_data(terms);
        debug!(
            num_terms = result.num_terms,
            segments = n_segments,
            "built global terms"
        );
        result
    }

    /// Group index: sensitive positions are singletons; insensitive
    /// positions share a group per collation-equal run, reusing the
    /// sensitive group where the run has a single member.
    fn fill_term_groups(&mut self) {
        let n = self.num_terms;

        let mut insensitive_pos2term_ids: HashMap<i32, Vec<i32>> = HashMap::new();
        for term_id in 0..n as i32 {
            insensitive_pos2term_ids
                .entry(self.term_id2insensitive_pos[term_id as usize])
                .or_default()
                .push(term_id);
        }
        let groups_above_size_one = insensitive_pos2term_ids
            .values()
            .filter(|ids| ids.len() > 1)
            .count();
        let terms_in_groups_above_size_one: usize = insensitive_pos2term_ids
            .values()
            .filter(|ids| ids.len() > 1)
            .map(Vec::len)
            .sum();

        self.group2term_ids =
            Vec::with_capacity(2 * n + groups_above_size_one + terms_in_groups_above_size_one);
        self.sensitive_pos2group = vec![0; n];
        self.insensitive_pos2group = vec![NO_TERM; n];

        for term_id in 0..n as i32 {
            let position = self.term_id2sensitive_pos[term_id as usize];
            self.sensitive_pos2group[position as usize] = self.group2term_ids.len() as i32;
            self.group2term_ids.push(1);
            self.group2term_ids.push(term_id);
        }

        for (&position, term_ids) in &insensitive_pos2term_ids {
            if term_ids.len() == 1 {
                let sensitive_pos = self.term_id2sensitive_pos[term_ids[0] as usize];
                self.insensitive_pos2group[position as usize] =
                    self.sensitive_pos2group[sensitive_pos as usize];
                continue;
            }
            self.insensitive_pos2group[position as usize] = self.group2term_ids.len() as i32;
            self.group2term_ids.push(term_ids.len() as i32);
            self.group2term_ids.extend_from_slice(term_ids);
        }

        // Not every insensitive position exists; fill the gaps with the
        // last real entry so binary search compares against valid groups.
        let mut last = 0;
        for slot in self.insensitive_pos2group.iter_mut() {
            if *slot != NO_TERM {
                last = *slot;
            } else {
                *slot = last;
            }
        }
    }

    fn fill_char_data(&mut self, terms: Vec<TermInIndex>) {
        self.term_id2char_offset = Vec::with_capacity(terms.len());
        let mut current: Vec<u8> = Vec::new();
        for t in &terms {
            let bytes = t.term.as_bytes();
            if !current.is_empty() && current.len() + bytes.len() > CHUNK_MAX_BYTES {
                self.char_chunks.push(std::mem::take(&mut current));
            }
            let chunk_index = self.char_chunks.len() as u64;
            self.term_id2char_offset
                .push((chunk_index << 32) | current.len() as u64);
            current.extend_from_slice(bytes);
        }
        if !current.is_empty() || self.char_chunks.is_empty() {
            self.char_chunks.push(current);
        }
    }

    /// Chunk index, offset and length for a term's bytes.
    fn offset_and_length(&self, term_id: usize) -> (usize, usize, usize) {
        let packed = self.term_id2char_offset[term_id];
        let chunk = (packed >> 32) as usize;
        let offset = (packed & 0xffff_ffff) as usize;
        let is_last_in_chunk = term_id == self.num_terms - 1
            || (self.term_id2char_offset[term_id + 1] >> 32) as usize != chunk;
        let length = if is_last_in_chunk {
            self.char_chunks[chunk].len() - offset
        } else {
            (self.term_id2char_offset[term_id + 1] & 0xffff_ffff) as usize - offset
        };
        (chunk, offset, length)
    }

    pub fn number_of_terms(&self) -> usize {
        self.num_terms
    }

    /// Term string for a global id.
    pub fn get(&self, term_id: i32) -> Option<&str> {
        if term_id < 0 || term_id as usize >= self.num_terms {
            return None;
        }
        let (chunk, offset, length) = self.offset_and_length(term_id as usize);
        std::str::from_utf8(&self.char_chunks[chunk][offset..offset + length]).ok()
    }

    /// Sort position of a global term id under a sensitivity.
    pub fn id_to_sort_position(&self, term_id: i32, sensitivity: MatchSensitivity) -> i32 {
        if term_id < 0 || term_id as usize >= self.num_terms {
            return NO_TERM;
        }
        match sensitivity {
            MatchSensitivity::Sensitive => self.term_id2sensitive_pos[term_id as usize],
            MatchSensitivity::Insensitive => self.term_id2insensitive_pos[term_id as usize],
        }
    }

    /// Global id of an exact term, or `NO_TERM`.
    pub fn index_of(&self, term: &str) -> i32 {
        match self.group_id(term, MatchSensitivity::Sensitive) {
            Some(group) => self.group2term_ids[group + 1],
            None => NO_TERM,
        }
    }

    /// Append every global id collating equal to `term` under the
    /// sensitivity.
    pub fn index_of_all(&self, results: &mut Vec<i32>, term: &str, sensitivity: MatchSensitivity) {
        match self.group_id(term, sensitivity) {
            Some(group) => {
                let size = self.group2term_ids[group] as usize;
                results.extend_from_slice(&self.group2term_ids[group + 1..group + 1 + size]);
            }
            None => results.push(NO_TERM),
        }
    }

    /// Do all these global ids refer to collation-equal terms?
    pub fn terms_equal(&self, term_ids: &[i32], sensitivity: MatchSensitivity) -> bool {
        if term_ids.len() < 2 {
            return true;
        }
        let expected = self.id_to_sort_position(term_ids[0], sensitivity);
        term_ids[1..]
            .iter()
            .all(|&id| self.id_to_sort_position(id, sensitivity) == expected)
    }

    /// Map a segment term id to its global id. Negative ids (gaps) pass
    /// through unchanged.
    pub fn segment_to_global(&self, ord: usize, segment_term_id: i32) -> i32 {
        if segment_term_id < 0 {
            return segment_term_id;
        }
        self.segment_to_global[ord][segment_term_id as usize]
    }

    /// Map a whole token snippet from segment ids to global ids.
    pub fn segment_ids_to_global(&self, ord: usize, snippet: &[i32]) -> Vec<i32> {
        snippet
            .iter()
            .map(|&id| self.segment_to_global(ord, id))
            .collect()
    }

    fn group_id(&self, term: &str, sensitivity: MatchSensitivity) -> Option<usize> {
        let collator = self.collators.get(sensitivity);
        let pos2group = match sensitivity {
            MatchSensitivity::Sensitive => &self.sensitive_pos2group,
            MatchSensitivity::Insensitive => &self.insensitive_pos2group,
        };
        if pos2group.is_empty() {
            return None;
        }

        let mut l = 0i64;
        let mut r = pos2group.len() as i64 - 1;
        while l <= r {
            let mid = l + (r - l) / 2;
            let group = pos2group[mid as usize] as usize;
            let representative = self.group2term_ids[group + 1];
            let other = self.get(representative)?;
            match collator.compare(term, other) {
                Ordering::Equal => return Some(group),
                Ordering::Less => r = mid - 1,
                Ordering::Greater => l = mid + 1,
            }
        }
        None
    }
}

fn compare_terms(
    a: &TermInIndex,
    b: &TermInIndex,
    collators: &Collators,
    sensitivity: MatchSensitivity,
    key_cache: &RefCell<HashMap<usize, CollationKey>>,
    a_id: usize,
    b_id: usize,
) -> Ordering {
    let (pa, pb) = match sensitivity {
        MatchSensitivity::Sensitive => (&a.segment_pos_sensitive, &b.segment_pos_sensitive),
        MatchSensitivity::Insensitive => (&a.segment_pos_insensitive, &b.segment_pos_insensitive),
    };
    // Any segment containing both terms already knows their order.
    for (&x, &y) in pa.iter().zip(pb.iter()) {
        if x >= 0 && y >= 0 {
            return x.cmp(&y);
        }
    }
    let collator = collators.get(sensitivity);
    let mut cache = key_cache.borrow_mut();
    let ka = cache
        .entry(a_id)
        .or_insert_with(|| collator.collation_key(&a.term))
        .clone();
    let kb = cache
        .entry(b_id)
        .or_insert_with(|| collator.collation_key(&b.term));
    ka.cmp(kb)
}

fn determine_sort(
    terms: &[TermInIndex],
    collators: &Collators,
    sensitivity: MatchSensitivity,
) -> Vec<i32> {
    let key_cache = RefCell::new(HashMap::new());
    let mut sorted: Vec<i32> = (0..terms.len() as i32).collect();
    sorted.sort_by(|&a, &b| {
        compare_terms(
            &terms[a as usize],
            &terms[b as usize],
            collators,
            sensitivity,
            &key_cache,
            a as usize,
            b as usize,
        )
    });
    sorted
}

fn invert(
    terms: &[TermInIndex],
    order: &[i32],
    collators: &Collators,
    sensitivity: MatchSensitivity,
) -> Vec<i32> {
    let key_cache = RefCell::new(HashMap::new());
    let mut result = vec![0i32; order.len()];
    let mut prev_sort_position = -1i32;
    let mut prev_term_id = -1i32;
    for (i, &term_id) in order.iter().enumerate() {
        let mut sort_position = i as i32;
        if prev_term_id >= 0
            && compare_terms(
                &terms[prev_term_id as usize],
                &terms[term_id as usize],
                collators,
                sensitivity,
                &key_cache,
                prev_term_id as usize,
                term_id as usize,
            ) == Ordering::Equal
        {
            sort_position = prev_sort_position;
        } else {
            prev_sort_position = sort_position;
        }
        result[term_id as usize] = sort_position;
        prev_term_id = term_id;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::terms::SegmentTerms;

    fn segment_a() -> SegmentTerms {
        // terms: the(0), The(1); insensitive-equal
        SegmentTerms::new(
            vec!["the".into(), "The".into()],
            vec![1, 0],
            vec![1, 0],
            vec![0, 0],
            vec![0, 1],
        )
    }

    fn segment_b() -> SegmentTerms {
        // terms: cat(0), The(1)
        SegmentTerms::new(
            vec!["cat".into(), "The".into()],
            vec![1, 0],
            vec![1, 0],
            vec![0, 1],
            vec![0, 1],
        )
    }

    #[test]
    fn test_first_seen_global_numbering() {
        let a = segment_a();
        let b = segment_b();
        let global = GlobalTerms::build(Collators::default(), &[&a, &b]);
        assert_eq!(global.number_of_terms(), 3);
        assert_eq!(global.get(0), Some("the"));
        assert_eq!(global.get(1), Some("The"));
        assert_eq!(global.get(2), Some("cat"));
    }

    #[test]
    fn test_insensitive_positions_collapse() {
        let a = segment_a();
        let b = segment_b();
        let global = GlobalTerms::build(Collators::default(), &[&a, &b]);
        let the = global.index_of("the");
        let cap_the = global.index_of("The");
        let cat = global.index_of("cat");
        let pos = |id| global.id_to_sort_position(id, MatchSensitivity::Insensitive);
        assert_eq!(pos(the), pos(cap_the));
        assert!(pos(cat) < pos(the));
    }

    #[test]
    fn test_index_of_all_insensitive_group() {
        let a = segment_a();
        let b = segment_b();
        let global = GlobalTerms::build(Collators::default(), &[&a, &b]);
        let mut ids = Vec::new();
        global.index_of_all(&mut ids, "THE", MatchSensitivity::Insensitive);
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);

        let mut missing = Vec::new();
        global.index_of_all(&mut missing, "dog", MatchSensitivity::Insensitive);
        assert_eq!(missing, vec![NO_TERM]);
    }

    #[test]
    fn test_segment_to_global_roundtrip() {
        let a = segment_a();
        let b = segment_b();
        let global = GlobalTerms::build(Collators::default(), &[&a, &b]);
        // Segment B: cat(0) -> 2, The(1) -> 1
        assert_eq!(global.segment_to_global(1, 0), 2);
        assert_eq!(global.segment_to_global(1, 1), 1);
        assert_eq!(global.segment_to_global(1, NO_TERM), NO_TERM);
        assert_eq!(
            global.segment_ids_to_global(0, &[1, NO_TERM, 0]),
            vec![1, NO_TERM, 0]
        );
    }
}
