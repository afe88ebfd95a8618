//! Random access to the token stream of any document in a segment.

use crate::codec::format::CodecInput;
use crate::codec::reader::TOKENS_INDEX_ENTRY_BYTES;
use crate::codec::tokens;
use crate::error::Result;

/// One entry of the tokens index: where a document's payload lives and how
/// it is encoded.
#[derive(Clone, Copy, Debug)]
pub struct TokensIndexEntry {
    pub offset: u64,
    pub length: i32,
    pub codec_tag: u8,
    pub codec_param: u8,
}

/// Per-thread forward-index view over one `(segment, field)`.
///
/// Cloned from the thread-safe [`super::super::codec::SegmentCodecReader`];
/// the underlying file bytes are shared, the cursors are private.
pub struct ForwardIndexReader {
    tokens_index: CodecInput,
    tokens: CodecInput,
    tokens_index_offset: u64,
    doc_count: i32,
}

impl ForwardIndexReader {
    pub(crate) fn new(
        tokens_index: CodecInput,
        tokens: CodecInput,
        tokens_index_offset: u64,
        doc_count: i32,
    ) -> Self {
        Self {
            tokens_index,
            tokens,
            tokens_index_offset,
            doc_count,
        }
    }

    pub fn doc_count(&self) -> i32 {
        self.doc_count
    }

    fn entry(&mut self, doc: i32) -> Result<TokensIndexEntry> {
        debug_assert!(doc >= 0 && doc < self.doc_count);
        self.tokens_index
            .seek(self.tokens_index_offset + doc as u64 * TOKENS_INDEX_ENTRY_BYTES)?;
        Ok(TokensIndexEntry {
            offset: self.tokens_index.read_i64()? as u64,
            length: self.tokens_index.read_i32()?,
            codec_tag: self.tokens_index.read_u8()?,
            codec_param: self.tokens_index.read_u8()?,
        })
    }

    /// Length of a document in tokens.
    pub fn doc_length(&mut self, doc: i32) -> Result<i32> {
        Ok(self.entry(doc)?.length)
    }

    /// Term ids at positions `[start, end)`, clamped to the document.
    pub fn doc_tokens(&mut self, doc: i32, start: i32, end: i32) -> Result<Vec<i32>> {
        let entry = self.entry(doc)?;
        let start = start.clamp(0, entry.length) as usize;
        let end = end.clamp(0, entry.length) as usize;
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        if start >= end {
            return Ok(out);
        }
        self.tokens.seek(entry.offset)?;
        tokens::read_payload(
            &mut self.tokens,
            entry.codec_tag,
            entry.codec_param,
            start,
            end,
            &mut out,
        )?;
        Ok(out)
    }

    /// The single token at `position`, or `NO_TERM` outside the document.
    pub fn token_at(&mut self, doc: i32, position: i32) -> Result<i32> {
        let tokens = self.doc_tokens(doc, position, position + 1)?;
        Ok(tokens.first().copied().unwrap_or(crate::forward::NO_TERM))
    }
}
