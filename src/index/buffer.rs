//! In-memory postings accumulation.
//!
//! `MemoryBuffer` collects term occurrences per field while documents are
//! added, then freezes into `MemoryFields`: an immutable postings source
//! with an fst-backed term dictionary. The frozen form is the write input
//! for the segment codec and doubles as the query-time postings source for
//! in-memory corpora.

use std::collections::BTreeMap;

use fst::{Map, MapBuilder};

use crate::error::{EngineError, Result};
use crate::index::postings::{
    encode_payload, FieldsSource, PostingsCursor, TermsCursor, NO_MORE_DOCS,
};

#[derive(Clone, Debug)]
struct BufferedPosting {
    doc: i32,
    /// (position, payload) pairs, sorted at freeze time.
    positions: Vec<(i32, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct FieldBuffer {
    forward_index: bool,
    postings: BTreeMap<Vec<u8>, Vec<BufferedPosting>>,
}

/// Mutable single-writer postings buffer.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    max_doc: i32,
    fields: BTreeMap<String, FieldBuffer>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field and whether it gets a forward index. Fields default
    /// to forward-index-eligible when first touched by a value.
    pub fn create_field(&mut self, field: &str, forward_index: bool) {
        let entry = self.fields.entry(field.to_string()).or_default();
        entry.forward_index = forward_index;
    }

    /// Record one value occurrence with an explicit payload.
    pub fn add_value(&mut self, field: &str, doc: i32, position: i32, term: &str, payload: Vec<u8>) {
        let field_buffer = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FieldBuffer {
                forward_index: true,
                postings: BTreeMap::new(),
            });
        let postings = field_buffer
            .postings
            .entry(term.as_bytes().to_vec())
            .or_default();
        match postings.last_mut() {
            Some(last) if last.doc == doc => last.positions.push((position, payload)),
            _ => postings.push(BufferedPosting {
                doc,
                positions: vec![(position, payload)],
            }),
        }
        self.max_doc = self.max_doc.max(doc + 1);
    }

    /// Record a primary value (the one stored in the forward index).
    pub fn add_token(&mut self, field: &str, doc: i32, position: i32, term: &str) {
        self.add_value(field, doc, position, term, encode_payload(true, None));
    }

    /// Record a secondary value (synonym, stemmed form); inverted-index
    /// only.
    pub fn add_secondary(&mut self, field: &str, doc: i32, position: i32, term: &str) {
        self.add_value(field, doc, position, term, encode_payload(false, None));
    }

    /// Record an inline tag spanning `[start, end)`. The end position
    /// travels in the payload of the start token.
    pub fn add_tag(&mut self, field: &str, doc: i32, start: i32, end: i32, tag: &str) {
        self.add_value(field, doc, start, tag, encode_payload(true, Some(end - start)));
    }

    /// Convenience: index a whole document as primary tokens 0..n.
    pub fn add_document(&mut self, field: &str, doc: i32, tokens: &[&str]) {
        for (position, term) in tokens.iter().enumerate() {
            self.add_token(field, doc, position as i32, term);
        }
    }

    pub fn doc_count(&self) -> i32 {
        self.max_doc
    }

    /// Freeze into an immutable postings source.
    pub fn freeze(self) -> Result<MemoryFields> {
        let mut fields = BTreeMap::new();
        for (name, buffer) in self.fields {
            let mut builder = MapBuilder::memory();
            let mut terms = Vec::with_capacity(buffer.postings.len());
            let mut postings = Vec::with_capacity(buffer.postings.len());
            for (ordinal, (term, mut term_postings)) in buffer.postings.into_iter().enumerate() {
                builder
                    .insert(&term, ordinal as u64)
                    .map_err(|e| EngineError::Config(format!("term dictionary: {e}")))?;
                terms.push(term);
                term_postings.sort_by_key(|p| p.doc);
                for posting in &mut term_postings {
                    posting.positions.sort_by_key(|(position, _)| *position);
                }
                postings.push(term_postings);
            }
            let term_dict = Map::new(
                builder
                    .into_inner()
                    .map_err(|e| EngineError::Config(format!("term dictionary: {e}")))?,
            )
            .map_err(|e| EngineError::Config(format!("term dictionary: {e}")))?;
            fields.insert(
                name,
                FrozenField {
                    forward_index: buffer.forward_index,
                    term_dict,
                    terms,
                    postings,
                },
            );
        }
        Ok(MemoryFields {
            max_doc: self.max_doc,
            fields,
        })
    }
}

struct FrozenField {
    forward_index: bool,
    /// term bytes -> ordinal in `terms`/`postings`
    term_dict: Map<Vec<u8>>,
    terms: Vec<Vec<u8>>,
    postings: Vec<Vec<BufferedPosting>>,
}

/// Immutable postings source over frozen buffer contents.
pub struct MemoryFields {
    max_doc: i32,
    fields: BTreeMap<String, FrozenField>,
}

impl FieldsSource for MemoryFields {
    fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn has_forward_index(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .map(|f| f.forward_index)
            .unwrap_or(false)
    }

    fn terms(&self, field: &str) -> Result<Option<Box<dyn TermsCursor + '_>>> {
        Ok(self.fields.get(field).map(|f| {
            Box::new(MemTermsCursor {
                field: f,
                current: -1,
            }) as Box<dyn TermsCursor>
        }))
    }

    fn postings(&self, field: &str, term: &[u8]) -> Result<Option<Box<dyn PostingsCursor + '_>>> {
        let Some(f) = self.fields.get(field) else {
            return Ok(None);
        };
        Ok(f.term_dict.get(term).map(|ordinal| {
            Box::new(MemPostingsCursor::new(&f.postings[ordinal as usize]))
                as Box<dyn PostingsCursor>
        }))
    }

    fn doc_freq(&self, field: &str, term: &[u8]) -> i32 {
        self.fields
            .get(field)
            .and_then(|f| f.term_dict.get(term))
            .map(|ordinal| {
                self.fields[field].postings[ordinal as usize].len() as i32
            })
            .unwrap_or(0)
    }

    fn max_doc(&self) -> i32 {
        self.max_doc
    }
}

struct MemTermsCursor<'a> {
    field: &'a FrozenField,
    current: i64,
}

impl TermsCursor for MemTermsCursor<'_> {
    fn move_next(&mut self) -> bool {
        if (self.current + 1) as usize >= self.field.terms.len() {
            return false;
        }
        self.current += 1;
        true
    }

    fn term(&self) -> &[u8] {
        &self.field.terms[self.current as usize]
    }

    fn doc_freq(&self) -> i32 {
        self.field.postings[self.current as usize].len() as i32
    }

    fn postings(&self) -> Result<Box<dyn PostingsCursor + '_>> {
        Ok(Box::new(MemPostingsCursor::new(
            &self.field.postings[self.current as usize],
        )))
    }
}

struct MemPostingsCursor<'a> {
    list: &'a [BufferedPosting],
    doc_index: i64,
    position_index: usize,
}

impl<'a> MemPostingsCursor<'a> {
    fn new(list: &'a [BufferedPosting]) -> Self {
        Self {
            list,
            doc_index: -1,
            position_index: 0,
        }
    }

    fn current(&self) -> Option<&'a BufferedPosting> {
        if self.doc_index < 0 {
            return None;
        }
        self.list.get(self.doc_index as usize)
    }
}

impl PostingsCursor for MemPostingsCursor<'_> {
    fn next_doc(&mut self) -> i32 {
        self.doc_index += 1;
        self.position_index = 0;
        match self.current() {
            Some(posting) => posting.doc,
            None => NO_MORE_DOCS,
        }
    }

    fn doc_id(&self) -> i32 {
        self.current().map(|p| p.doc).unwrap_or(NO_MORE_DOCS)
    }

    fn freq(&self) -> i32 {
        self.current().map(|p| p.positions.len() as i32).unwrap_or(0)
    }

    fn next_position(&mut self) -> Result<i32> {
        let posting = self
            .current()
            .ok_or_else(|| EngineError::Query("postings cursor: no current document".into()))?;
        let (position, _) = posting
            .positions
            .get(self.position_index)
            .ok_or_else(|| EngineError::Query("postings cursor: positions exhausted".into()))?;
        self.position_index += 1;
        Ok(*position)
    }

    fn payload(&self) -> &[u8] {
        self.current()
            .and_then(|p| p.positions.get(self.position_index.wrapping_sub(1)))
            .map(|(_, payload)| payload.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::postings::span_end;

    #[test]
    fn test_terms_come_out_sorted() {
        let mut buffer = MemoryBuffer::new();
        buffer.add_document("contents%word", 0, &["the", "big", "cat"]);
        let frozen = buffer.freeze().unwrap();

        let mut cursor = frozen.terms("contents%word").unwrap().unwrap();
        let mut terms = Vec::new();
        while cursor.move_next() {
            terms.push(String::from_utf8(cursor.term().to_vec()).unwrap());
        }
        assert_eq!(terms, vec!["big", "cat", "the"]);
    }

    #[test]
    fn test_postings_cursor() {
        let mut buffer = MemoryBuffer::new();
        buffer.add_document("contents%word", 0, &["a", "b", "a"]);
        buffer.add_document("contents%word", 2, &["a"]);
        let frozen = buffer.freeze().unwrap();

        let mut postings = frozen
            .postings("contents%word", b"a")
            .unwrap()
            .expect("term exists");
        assert_eq!(postings.next_doc(), 0);
        assert_eq!(postings.freq(), 2);
        assert_eq!(postings.next_position().unwrap(), 0);
        assert_eq!(postings.next_position().unwrap(), 2);
        assert_eq!(postings.next_doc(), 2);
        assert_eq!(postings.next_doc(), NO_MORE_DOCS);

        assert_eq!(frozen.doc_freq("contents%word", b"a"), 2);
        assert_eq!(frozen.doc_freq("contents%word", b"zzz"), 0);
        assert_eq!(frozen.max_doc(), 3);
    }

    #[test]
    fn test_tag_payload_carries_end() {
        let mut buffer = MemoryBuffer::new();
        buffer.add_tag("contents%starttag", 0, 2, 5, "s");
        let frozen = buffer.freeze().unwrap();

        let mut postings = frozen
            .postings("contents%starttag", b"s")
            .unwrap()
            .unwrap();
        assert_eq!(postings.next_doc(), 0);
        let position = postings.next_position().unwrap();
        assert_eq!(position, 2);
        assert_eq!(span_end(postings.payload(), position), Some(5));
    }
}
