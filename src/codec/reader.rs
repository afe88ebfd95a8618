//! Segment codec reader.
//!
//! Opens and validates the extension files of one segment, then hands out
//! per-field term tables and forward-index views. Construction is
//! two-phase: the extension files (including the delegate name recorded in
//! every header) are opened and checked first; the postings delegate is
//! attached by the caller afterwards. No cycles survive into steady state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::format::{CodecInput, Directory, SegmentInfo};
use crate::codec::writer::FieldHeader;
use crate::codec::{
    segment_file_name, FIELDS_EXT, TERMINDEX_EXT, TERMORDER_EXT, TERMS_EXT, TOKENS_EXT,
    TOKENS_INDEX_EXT,
};
use crate::error::{EngineError, Result};
use crate::forward::reader::ForwardIndexReader;
use crate::forward::terms::SegmentTerms;

/// Bytes per entry in the `.tokensindex` body: i64 offset, i32 length,
/// codec tag byte, codec parameter byte.
pub const TOKENS_INDEX_ENTRY_BYTES: u64 = 14;

/// Immutable, thread-safe reader for one segment's codec files.
#[derive(Debug)]
pub struct SegmentCodecReader {
    segment: SegmentInfo,
    field_order: Vec<String>,
    fields: HashMap<String, FieldHeader>,
    terms_input: CodecInput,
    term_index_input: CodecInput,
    term_order_input: CodecInput,
    tokens_index_input: CodecInput,
    tokens_input: CodecInput,
}

impl SegmentCodecReader {
    /// Open all extension files for a segment, validating each header and
    /// footer. Any mismatch rejects the whole segment.
    pub fn open(dir: &Directory, segment: SegmentInfo) -> Result<Arc<Self>> {
        let mut fields_input = dir.open_input(
            &segment_file_name(&segment.name, &segment.suffix, FIELDS_EXT),
            &segment,
        )?;

        let mut field_order = Vec::new();
        let mut fields = HashMap::new();
        while fields_input.file_pointer() < fields_input.body_end() {
            let header = FieldHeader::read(&mut fields_input)?;
            field_order.push(header.name.clone());
            fields.insert(header.name.clone(), header);
        }

        let open = |ext: &str| {
            dir.open_input(&segment_file_name(&segment.name, &segment.suffix, ext), &segment)
        };
        Ok(Arc::new(Self {
            terms_input: open(TERMS_EXT)?,
            term_index_input: open(TERMINDEX_EXT)?,
            term_order_input: open(TERMORDER_EXT)?,
            tokens_index_input: open(TOKENS_INDEX_EXT)?,
            tokens_input: open(TOKENS_EXT)?,
            segment,
            field_order,
            fields,
        }))
    }

    pub fn segment(&self) -> &SegmentInfo {
        &self.segment
    }

    /// Annotated fields with a forward index, in file order.
    pub fn field_names(&self) -> &[String] {
        &self.field_order
    }

    pub fn field(&self, name: &str) -> Result<&FieldHeader> {
        self.fields
            .get(name)
            .ok_or_else(|| EngineError::UnknownField(name.to_string()))
    }

    /// Number of documents recorded for a field in the tokens index.
    pub fn doc_count(&self, field: &str) -> Result<i32> {
        let header = self.field(field)?;
        let start = header.tokens_index_offset as u64;
        let end = self.next_tokens_index_offset(field)?;
        Ok(((end - start) / TOKENS_INDEX_ENTRY_BYTES) as i32)
    }

    fn next_tokens_index_offset(&self, field: &str) -> Result<u64> {
        let position = self
            .field_order
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| EngineError::UnknownField(field.to_string()))?;
        match self.field_order.get(position + 1) {
            Some(next) => Ok(self.fields[next].tokens_index_offset as u64),
            None => Ok(self.tokens_index_input.body_end() as u64),
        }
    }

    /// Load the term table for one field: term strings and both sort
    /// orders.
    pub fn terms(&self, field: &str) -> Result<SegmentTerms> {
        let header = self.field(field)?;
        let num_terms = header.num_terms as usize;

        let mut term_index = self.term_index_input.clone();
        term_index.seek(header.term_index_offset as u64)?;
        let mut offsets = Vec::with_capacity(num_terms);
        for _ in 0..num_terms {
            offsets.push(term_index.read_i64()? as u64);
        }

        let mut terms_input = self.terms_input.clone();
        let mut terms = Vec::with_capacity(num_terms);
        for offset in offsets {
            terms_input.seek(offset)?;
            terms.push(terms_input.read_string()?);
        }

        let mut order = self.term_order_input.clone();
        order.seek(header.term_order_offset as u64)?;
        let mut read_array = |order: &mut CodecInput| -> Result<Vec<i32>> {
            let mut array = Vec::with_capacity(num_terms);
            for _ in 0..num_terms {
                array.push(order.read_i32()?);
            }
            Ok(array)
        };
        let term_id2insensitive = read_array(&mut order)?;
        let insensitive2term_id = read_array(&mut order)?;
        let term_id2sensitive = read_array(&mut order)?;
        let sensitive2term_id = read_array(&mut order)?;

        Ok(SegmentTerms::new(
            terms,
            term_id2sensitive,
            sensitive2term_id,
            term_id2insensitive,
            insensitive2term_id,
        ))
    }

    /// A fresh forward-index view for one field. Views are cheap (shared
    /// file bytes, private cursors and decode buffer) and single-threaded.
    pub fn forward_reader(&self, field: &str) -> Result<ForwardIndexReader> {
        let header = self.field(field)?;
        Ok(ForwardIndexReader::new(
            self.tokens_index_input.clone(),
            self.tokens_input.clone(),
            header.tokens_index_offset as u64,
            self.doc_count(field)?,
        ))
    }
}
