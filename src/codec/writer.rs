//! Segment codec writer.
//!
//! Builds the forward index from a postings source in two passes. Postings
//! arrive grouped by term, then doc, then position; the forward index needs
//! them grouped by doc, then position. The first pass dumps each term's
//! primary positions per doc into a temporary file and remembers where;
//! the second pass reconstructs every document by scattering term ids into
//! a length-sized array, then packs it with the cheapest tokens codec.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::codec::format::{CodecInput, CodecOutput, Directory, SegmentInfo};
use crate::codec::tokens;
use crate::codec::{
    segment_file_name, FIELDS_EXT, TERMINDEX_EXT, TERMORDER_EXT, TERMS_EXT, TERMVEC_TMP_EXT,
    TOKENS_EXT, TOKENS_INDEX_EXT,
};
use crate::collation::{Collator, Collators, MatchSensitivity};
use crate::error::{EngineError, Result};
use crate::forward::NO_TERM;
use crate::index::postings::{is_primary, FieldsSource, NO_MORE_DOCS};

/// Entry in the `.fields` file: one annotated field with a forward index,
/// and where to find its term table and token streams.
#[derive(Clone, Debug)]
pub struct FieldHeader {
    pub name: String,
    pub num_terms: i32,
    pub term_order_offset: i64,
    pub term_index_offset: i64,
    pub tokens_index_offset: i64,
}

impl FieldHeader {
    fn new(name: String) -> Self {
        Self {
            name,
            num_terms: 0,
            term_order_offset: 0,
            term_index_offset: 0,
            tokens_index_offset: 0,
        }
    }

    pub fn write(&self, out: &mut CodecOutput) -> Result<()> {
        out.write_string(&self.name)?;
        out.write_i32(self.num_terms)?;
        out.write_i64(self.term_order_offset)?;
        out.write_i64(self.term_index_offset)?;
        out.write_i64(self.tokens_index_offset)
    }

    pub fn read(input: &mut CodecInput) -> Result<Self> {
        Ok(Self {
            name: input.read_string()?,
            num_terms: input.read_i32()?,
            term_order_offset: input.read_i64()?,
            term_index_offset: input.read_i64()?,
            tokens_index_offset: input.read_i64()?,
        })
    }
}

/// Writes the codec extension files for one segment. Single-threaded; one
/// writer per segment flush.
pub struct SegmentCodecWriter<'a> {
    dir: &'a Directory,
    segment: SegmentInfo,
    collators: Collators,
}

impl<'a> SegmentCodecWriter<'a> {
    pub fn new(dir: &'a Directory, segment: SegmentInfo, collators: Collators) -> Self {
        Self {
            dir,
            segment,
            collators,
        }
    }

    fn create_output(&self, ext: &str) -> Result<CodecOutput> {
        let name = segment_file_name(&self.segment.name, &self.segment.suffix, ext);
        self.dir.create_output(&name, &self.segment)
    }

    fn open_input(&self, ext: &str) -> Result<CodecInput> {
        let name = segment_file_name(&self.segment.name, &self.segment.suffix, ext);
        self.dir.open_input(&name, &self.segment)
    }

    /// Write all extension files from the given postings source.
    pub fn write(&self, fields: &dyn FieldsSource) -> Result<()> {
        let mut tokens_index_out = self.create_output(TOKENS_INDEX_EXT)?;
        let mut tokens_out = self.create_output(TOKENS_EXT)?;
        let mut term_index_out = self.create_output(TERMINDEX_EXT)?;
        let mut terms_out = self.create_output(TERMS_EXT)?;
        let mut term_order_out = self.create_output(TERMORDER_EXT)?;

        // Doc lengths are shared across fields: every annotation of an
        // annotated field covers the same token positions.
        let mut doc_lengths: HashMap<i32, i32> = HashMap::new();

        // Per field: doc id -> (term id -> offset of that doc's positions
        // in the temporary term vector file).
        let mut staged: Vec<(FieldHeader, BTreeMap<i32, HashMap<i32, u64>>)> = Vec::new();

        {
            let mut termvec_out = self.create_output(TERMVEC_TMP_EXT)?;

            for field_name in fields.fields() {
                if !fields.has_forward_index(&field_name) {
                    continue;
                }
                let mut header = FieldHeader::new(field_name.clone());
                header.term_index_offset = term_index_out.file_pointer() as i64;

                let mut doc_offsets: BTreeMap<i32, HashMap<i32, u64>> = BTreeMap::new();
                let mut terms_list: Vec<String> = Vec::new();

                if let Some(mut terms_cursor) = fields.terms(&field_name)? {
                    let mut term_id: i32 = 0;
                    while terms_cursor.move_next() {
                        let term_string = std::str::from_utf8(terms_cursor.term())
                            .map_err(|_| {
                                EngineError::format(
                                    segment_file_name(
                                        &self.segment.name,
                                        &self.segment.suffix,
                                        TERMS_EXT,
                                    ),
                                    "term is not valid UTF-8",
                                )
                            })?
                            .to_string();
                        term_index_out.write_i64(terms_out.file_pointer() as i64)?;
                        terms_out.write_string(&term_string)?;
                        terms_list.push(term_string);

                        let mut postings = terms_cursor.postings()?;
                        loop {
                            let doc = postings.next_doc();
                            if doc == NO_MORE_DOCS {
                                break;
                            }
                            let offsets = doc_offsets.entry(doc).or_default();
                            offsets.insert(term_id, termvec_out.file_pointer());

                            // Gather the positions where this term is the
                            // primary value, and track the doc length.
                            let n_occurrences = postings.freq();
                            let mut doc_length = doc_lengths.get(&doc).copied().unwrap_or(0);
                            let mut primary_positions = Vec::with_capacity(n_occurrences as usize);
                            for _ in 0..n_occurrences {
                                let position = postings.next_position()?;
                                if position >= doc_length {
                                    doc_length = position + 1;
                                }
                                if is_primary(postings.payload()) {
                                    primary_positions.push(position);
                                }
                            }
                            doc_lengths.insert(doc, doc_length);

                            termvec_out.write_i32(primary_positions.len() as i32)?;
                            for position in primary_positions {
                                termvec_out.write_i32(position)?;
                            }
                        }
                        term_id += 1;
                    }
                }

                let num_terms = terms_list.len();
                let sensitive_order = term_sort_order(
                    &terms_list,
                    self.collators.get(MatchSensitivity::Sensitive),
                );
                let insensitive_order = term_sort_order(
                    &terms_list,
                    self.collators.get(MatchSensitivity::Insensitive),
                );
                let term_id2sensitive = invert(
                    &terms_list,
                    &sensitive_order,
                    self.collators.get(MatchSensitivity::Sensitive),
                );
                let term_id2insensitive = invert(
                    &terms_list,
                    &insensitive_order,
                    self.collators.get(MatchSensitivity::Insensitive),
                );

                header.num_terms = num_terms as i32;
                header.term_order_offset = term_order_out.file_pointer() as i64;
                for &v in &term_id2insensitive {
                    term_order_out.write_i32(v)?;
                }
                for &v in &insensitive_order {
                    term_order_out.write_i32(v)?;
                }
                for &v in &term_id2sensitive {
                    term_order_out.write_i32(v)?;
                }
                for &v in &sensitive_order {
                    term_order_out.write_i32(v)?;
                }

                debug!(field = %header.name, num_terms, "staged forward index field");
                staged.push((header, doc_offsets));
            }
            termvec_out.finish()?;
        }

        // Reverse pass: reconstruct each document from the staged term
        // positions and pack it.
        {
            let mut termvec_in = self.open_input(TERMVEC_TMP_EXT)?;
            for (header, doc_offsets) in &mut staged {
                header.tokens_index_offset = tokens_index_out.file_pointer() as i64;
                for doc in 0..fields.max_doc() {
                    let tokens =
                        document_contents(doc, &doc_lengths, &mut termvec_in, doc_offsets)?;
                    write_tokens_in_doc(&mut tokens_index_out, &mut tokens_out, &tokens)?;
                }
            }
        }
        self.dir.delete_file(&segment_file_name(
            &self.segment.name,
            &self.segment.suffix,
            TERMVEC_TMP_EXT,
        ))?;

        // Fields file last, now that all offsets are known.
        let mut fields_out = self.create_output(FIELDS_EXT)?;
        for (header, _) in &staged {
            header.write(&mut fields_out)?;
        }
        fields_out.finish()?;

        tokens_index_out.finish()?;
        tokens_out.finish()?;
        term_index_out.finish()?;
        terms_out.finish()?;
        term_order_out.finish()?;

        debug!(segment = %self.segment.name, fields = staged.len(), "wrote segment codec files");
        Ok(())
    }
}

/// Reconstruct one document's token array from the staged term positions.
fn document_contents(
    doc: i32,
    doc_lengths: &HashMap<i32, i32>,
    termvec_in: &mut CodecInput,
    doc_offsets: &BTreeMap<i32, HashMap<i32, u64>>,
) -> Result<Vec<i32>> {
    let doc_length = doc_lengths.get(&doc).copied().unwrap_or(0);
    let mut tokens = vec![NO_TERM; doc_length as usize];

    // Docs with no values for this field stay all NO_TERM, like any sparse
    // field (e.g. the annotation storing <p>, <s>, ...).
    if let Some(term_offsets) = doc_offsets.get(&doc) {
        for (&term_id, &offset) in term_offsets {
            termvec_in.seek(offset)?;
            let n_occurrences = termvec_in.read_i32()?;
            for _ in 0..n_occurrences {
                let position = termvec_in.read_i32()?;
                tokens[position as usize] = term_id;
            }
        }
    }
    Ok(tokens)
}

/// Write one document's tokens, choosing the cheapest codec, and record the
/// choice in the tokens index file.
fn write_tokens_in_doc(
    tokens_index_out: &mut CodecOutput,
    tokens_out: &mut CodecOutput,
    tokens: &[i32],
) -> Result<()> {
    let (codec, param) = tokens::choose(tokens);

    tokens_index_out.write_i64(tokens_out.file_pointer() as i64)?;
    tokens_index_out.write_i32(tokens.len() as i32)?;
    tokens_index_out.write_u8(codec.code())?;
    tokens_index_out.write_u8(param)?;

    tokens::write_payload(tokens_out, tokens, codec, param)
}

/// Given a list of terms, return term ids in sort order under the collator.
/// E.g. `["b", "c", "a"]` gives `[2, 0, 1]`. Stable: collation-equal terms
/// keep their id order.
pub(crate) fn term_sort_order(terms: &[String], collator: &Collator) -> Vec<i32> {
    let mut order: Vec<i32> = (0..terms.len() as i32).collect();
    order.sort_by(|&a, &b| collator.compare(&terms[a as usize], &terms[b as usize]));
    order
}

/// Invert a sort order into term id -> sort position, collapsing
/// collation-equal runs to the first position of the run.
pub(crate) fn invert(terms: &[String], order: &[i32], collator: &Collator) -> Vec<i32> {
    let mut result = vec![0i32; order.len()];
    let mut prev_sort_position = -1i32;
    let mut prev_term_id = -1i32;
    for (i, &term_id) in order.iter().enumerate() {
        let mut sort_position = i as i32;
        if prev_term_id >= 0
            && collator.equal(&terms[prev_term_id as usize], &terms[term_id as usize])
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
    use crate::collation::MatchSensitivity;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_term_sort_order() {
        let terms = strings(&["b", "c", "a"]);
        let coll = Collators::default();
        let order = term_sort_order(&terms, coll.get(MatchSensitivity::Sensitive));
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn test_invert_collapses_equal_terms() {
        let terms = strings(&["the", "The", "cat"]);
        let coll = Collators::default();
        let insensitive = coll.get(MatchSensitivity::Insensitive);
        let order = term_sort_order(&terms, insensitive);
        // cat first, then the/The in id order (stable)
        assert_eq!(order, vec![2, 0, 1]);
        let positions = invert(&terms, &order, insensitive);
        assert_eq!(positions[2], 0);
        assert_eq!(positions[0], 1);
        assert_eq!(positions[1], 1); // collates equal to "the"
    }
}
