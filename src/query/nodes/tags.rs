//! Inline tag query: spans reconstructed from payload-encoded end
//! positions on the start token.

use crate::error::Result;
use crate::index::postings::{span_end, PostingsCursor, NO_MORE_DOCS as POSTINGS_NO_MORE_DOCS};
use crate::index::reader::{CorpusReader, SegmentContext};
use crate::query::ast::{SpanQuery, SpanQueryBox, MAX_UNLIMITED};
use crate::query::spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Matches all spans of one inline tag (e.g. all `<s>...</s>` sentences).
/// Empty tags (`end == start`) are valid hits.
#[derive(Clone, Debug)]
pub struct SpanQueryTags {
    field: String,
    tag_name: String,
}

impl SpanQueryTags {
    pub fn new(field: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            tag_name: tag_name.into(),
        }
    }
}

impl SpanQuery for SpanQueryTags {
    fn field(&self) -> &str {
        &self.field
    }

    fn rewrite(&self, _reader: &CorpusReader) -> Result<SpanQueryBox> {
        Ok(self.clone_box())
    }

    fn spans<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<SpansBox<'a>>> {
        let cursor = ctx.postings.postings(&self.field, self.tag_name.as_bytes())?;
        Ok(cursor.map(|cursor| Box::new(TagSpans::new(cursor)) as SpansBox<'a>))
    }

    fn hits_all_same_length(&self) -> bool {
        false
    }

    fn hits_length_min(&self) -> i32 {
        0
    }

    fn hits_length_max(&self) -> i32 {
        MAX_UNLIMITED
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
        false
    }

    fn reverse_matching_cost(&self, reader: &CorpusReader) -> u64 {
        reader.doc_freq(&self.field, &self.tag_name)
    }

    fn clone_box(&self) -> SpanQueryBox {
        Box::new(self.clone())
    }
}

/// Spans over tag postings; the end position travels in the payload of
/// the start token.
pub struct TagSpans<'a> {
    cursor: Box<dyn PostingsCursor + 'a>,
    doc: i32,
    start: i32,
    end: i32,
    positions_left: i32,
}

impl<'a> TagSpans<'a> {
    pub fn new(cursor: Box<dyn PostingsCursor + 'a>) -> Self {
        Self {
            cursor,
            doc: -1,
            start: -1,
            end: -1,
            positions_left: 0,
        }
    }
}

impl Spans for TagSpans<'_> {
    fn next_doc(&mut self) -> Result<i32> {
        let doc = self.cursor.next_doc();
        self.doc = if doc == POSTINGS_NO_MORE_DOCS {
            NO_MORE_DOCS
        } else {
            doc
        };
        self.start = -1;
        self.end = -1;
        self.positions_left = if self.doc == NO_MORE_DOCS {
            0
        } else {
            self.cursor.freq()
        };
        Ok(self.doc)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.positions_left == 0 {
            self.start = NO_MORE_POSITIONS;
            self.end = NO_MORE_POSITIONS;
            return Ok(NO_MORE_POSITIONS);
        }
        self.positions_left -= 1;
        self.start = self.cursor.next_position()?;
        // A tag without an encoded end closes where it opens.
        self.end = span_end(self.cursor.payload(), self.start).unwrap_or(self.start);
        Ok(self.start)
    }

    fn doc_id(&self) -> i32 {
        self.doc
    }

    fn start_position(&self) -> i32 {
        self.start
    }

    fn end_position(&self) -> i32 {
        self.end
    }
}
