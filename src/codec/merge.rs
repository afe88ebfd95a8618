//! Segment merging.
//!
//! A merge is a whole-fields rewrite: the input segments are presented as
//! one postings source with doc ids offset per source, and the regular
//! write pipeline runs over that merged view.

use tracing::info;

use crate::codec::format::{Directory, SegmentInfo};
use crate::codec::writer::SegmentCodecWriter;
use crate::collation::Collators;
use crate::error::Result;
use crate::index::postings::{FieldsSource, PostingsCursor, TermsCursor, NO_MORE_DOCS};

/// Merge the given postings sources into one new segment.
pub fn merge_segments(
    dir: &Directory,
    segment: SegmentInfo,
    collators: Collators,
    sources: &[&dyn FieldsSource],
) -> Result<()> {
    let merged = MergedFieldsSource::new(sources);
    info!(
        segment = %segment.name,
        sources = sources.len(),
        max_doc = merged.max_doc(),
        "merging segments"
    );
    SegmentCodecWriter::new(dir, segment, collators).write(&merged)
}

/// Several postings sources presented as one, with doc ids remapped by a
/// per-source base offset.
pub struct MergedFieldsSource<'a> {
    sources: Vec<&'a dyn FieldsSource>,
    doc_bases: Vec<i32>,
    max_doc: i32,
}

impl<'a> MergedFieldsSource<'a> {
    pub fn new(sources: &[&'a dyn FieldsSource]) -> Self {
        let mut doc_bases = Vec::with_capacity(sources.len());
        let mut base = 0;
        for source in sources {
            doc_bases.push(base);
            base += source.max_doc();
        }
        Self {
            sources: sources.to_vec(),
            doc_bases,
            max_doc: base,
        }
    }
}

impl FieldsSource for MergedFieldsSource<'_> {
    fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for source in &self.sources {
            for field in source.fields() {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields
    }

    fn has_forward_index(&self, field: &str) -> bool {
        self.sources.iter().any(|s| s.has_forward_index(field))
    }

    fn terms(&self, field: &str) -> Result<Option<Box<dyn TermsCursor + '_>>> {
        let mut cursors = Vec::new();
        let mut bases = Vec::new();
        for (source, &base) in self.sources.iter().zip(&self.doc_bases) {
            if let Some(cursor) = source.terms(field)? {
                cursors.push(cursor);
                bases.push(base);
            }
        }
        if cursors.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(MergedTermsCursor {
            alive: vec![false; cursors.len()],
            cursors,
            bases,
            current_term: Vec::new(),
            started: false,
        })))
    }

    fn postings(&self, field: &str, term: &[u8]) -> Result<Option<Box<dyn PostingsCursor + '_>>> {
        let mut parts = Vec::new();
        for (source, &base) in self.sources.iter().zip(&self.doc_bases) {
            if let Some(cursor) = source.postings(field, term)? {
                parts.push((cursor, base));
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ChainedPostingsCursor {
            parts,
            index: 0,
            current_doc: -1,
        })))
    }

    fn doc_freq(&self, field: &str, term: &[u8]) -> i32 {
        self.sources.iter().map(|s| s.doc_freq(field, term)).sum()
    }

    fn max_doc(&self) -> i32 {
        self.max_doc
    }
}

/// K-way union of term cursors in term order; duplicate terms across
/// sources collapse to one.
struct MergedTermsCursor<'a> {
    cursors: Vec<Box<dyn TermsCursor + 'a>>,
    bases: Vec<i32>,
    alive: Vec<bool>,
    current_term: Vec<u8>,
    started: bool,
}

impl TermsCursor for MergedTermsCursor<'_> {
    fn move_next(&mut self) -> bool {
        if !self.started {
            self.started = true;
            for i in 0..self.cursors.len() {
                self.alive[i] = self.cursors[i].move_next();
            }
        } else {
            for i in 0..self.cursors.len() {
                if self.alive[i] && self.cursors[i].term() == self.current_term.as_slice() {
                    self.alive[i] = self.cursors[i].move_next();
                }
            }
        }
        let next = self
            .cursors
            .iter()
            .enumerate()
            .filter(|(i, _)| self.alive[*i])
            .map(|(_, c)| c.term())
            .min();
        match next {
            Some(term) => {
                self.current_term = term.to_vec();
                true
            }
            None => false,
        }
    }

    fn term(&self) -> &[u8] {
        &self.current_term
    }

    fn doc_freq(&self) -> i32 {
        self.cursors
            .iter()
            .enumerate()
            .filter(|(i, c)| self.alive[*i] && c.term() == self.current_term.as_slice())
            .map(|(_, c)| c.doc_freq())
            .sum()
    }

    fn postings(&self) -> Result<Box<dyn PostingsCursor + '_>> {
        let mut parts = Vec::new();
        for (i, cursor) in self.cursors.iter().enumerate() {
            if self.alive[i] && cursor.term() == self.current_term.as_slice() {
                parts.push((cursor.postings()?, self.bases[i]));
            }
        }
        Ok(Box::new(ChainedPostingsCursor {
            parts,
            index: 0,
            current_doc: -1,
        }))
    }
}

/// Concatenation of per-source postings, each shifted by its doc base.
/// Sources are visited in index order, so docs come out ascending.
struct ChainedPostingsCursor<'a> {
    parts: Vec<(Box<dyn PostingsCursor + 'a>, i32)>,
    index: usize,
    current_doc: i32,
}

impl PostingsCursor for ChainedPostingsCursor<'_> {
    fn next_doc(&mut self) -> i32 {
        while self.index < self.parts.len() {
            let (cursor, base) = &mut self.parts[self.index];
            let doc = cursor.next_doc();
            if doc == NO_MORE_DOCS {
                self.index += 1;
                continue;
            }
            self.current_doc = doc + *base;
            return self.current_doc;
        }
        self.current_doc = NO_MORE_DOCS;
        NO_MORE_DOCS
    }

    fn doc_id(&self) -> i32 {
        self.current_doc
    }

    fn freq(&self) -> i32 {
        self.parts
            .get(self.index)
            .map(|(c, _)| c.freq())
            .unwrap_or(0)
    }

    fn next_position(&mut self) -> Result<i32> {
        self.parts[self.index].0.next_position()
    }

    fn payload(&self) -> &[u8] {
        self.parts
            .get(self.index)
            .map(|(c, _)| c.payload())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::buffer::MemoryBuffer;

    #[test]
    fn test_merged_terms_and_postings() {
        let mut a = MemoryBuffer::new();
        a.add_document("contents%word", 0, &["rust", "programming"]);
        let a = a.freeze().unwrap();

        let mut b = MemoryBuffer::new();
        b.add_document("contents%word", 0, &["rust", "language"]);
        let b = b.freeze().unwrap();

        let merged = MergedFieldsSource::new(&[&a, &b]);
        assert_eq!(merged.max_doc(), 2);

        let mut cursor = merged.terms("contents%word").unwrap().unwrap();
        let mut terms = Vec::new();
        while cursor.move_next() {
            terms.push(String::from_utf8(cursor.term().to_vec()).unwrap());
        }
        assert_eq!(terms, vec!["language", "programming", "rust"]);

        assert_eq!(merged.doc_freq("contents%word", b"rust"), 2);
        let mut postings = merged.postings("contents%word", b"rust").unwrap().unwrap();
        assert_eq!(postings.next_doc(), 0);
        assert_eq!(postings.next_doc(), 1); // second source's doc 0, rebased
        assert_eq!(postings.next_doc(), NO_MORE_DOCS);
    }
}
