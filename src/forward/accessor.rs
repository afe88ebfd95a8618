//! Access to the forward index as the NFA matcher sees it: annotations by
//! number, token term ids per position, term predicates expanded to global
//! term id sets.

use std::sync::Arc;

use crate::collation::MatchSensitivity;
use crate::error::Result;
use crate::fieldname;
use crate::forward::reader::ForwardIndexReader;
use crate::forward::{GlobalTerms, NO_TERM};
use crate::index::reader::CorpusReader;

/// Index-level access for NFA compilation: resolves annotation names and
/// expands term predicates to global term ids.
pub trait ForwardIndexAccessor {
    /// Dense number for an annotation name (e.g. `word`), registering it
    /// on first use.
    fn annotation_number(&mut self, annotation: &str) -> usize;

    /// Global term ids collating equal to a literal value.
    fn term_ids_for_literal(
        &self,
        results: &mut Vec<i32>,
        annotation_number: usize,
        value: &str,
        sensitivity: MatchSensitivity,
    );

    /// Global term ids whose term string satisfies a predicate.
    fn term_ids_matching(
        &self,
        results: &mut Vec<i32>,
        annotation_number: usize,
        predicate: &dyn Fn(&str) -> bool,
    );
}

/// One document as a random-access token sequence, per annotation.
pub trait ForwardIndexDocument {
    /// Global term id at a position, or `NO_TERM` outside the document.
    fn token_global_term_id(&mut self, annotation_number: usize, position: i32) -> Result<i32>;

    fn valid_position(&mut self, position: i32) -> Result<bool>;

    /// Term string for a global term id of an annotation.
    fn term_string(&self, annotation_number: usize, global_term_id: i32) -> Option<String>;
}

/// Corpus-backed accessor for one annotated field (e.g. `contents`).
pub struct CorpusForwardIndexAccessor<'a> {
    reader: &'a CorpusReader,
    base_field: String,
    annotations: Vec<String>,
    globals: Vec<Arc<GlobalTerms>>,
}

impl<'a> CorpusForwardIndexAccessor<'a> {
    pub fn new(reader: &'a CorpusReader, base_field: impl Into<String>) -> Self {
        Self {
            reader,
            base_field: base_field.into(),
            annotations: Vec::new(),
            globals: Vec::new(),
        }
    }

    fn codec_field(&self, annotation: &str) -> String {
        fieldname::annotation_field(&self.base_field, annotation, None)
    }

    /// A document view for the NFA to walk, for one segment and doc.
    pub fn document(&self, ord: usize, doc: i32) -> Result<CorpusForwardIndexDocument> {
        let mut readers = Vec::with_capacity(self.annotations.len());
        for annotation in &self.annotations {
            let field = self.codec_field(annotation);
            let segment = self.reader.segment(ord);
            readers.push(segment.forward_reader(&field)?);
        }
        Ok(CorpusForwardIndexDocument {
            readers,
            globals: self.globals.clone(),
            ord,
            doc,
        })
    }

    /// Tear down into the registered annotation names and their global
    /// term tables, for storage in a compiled query node.
    pub fn into_parts(self) -> (String, Vec<String>, Vec<Arc<GlobalTerms>>) {
        (self.base_field, self.annotations, self.globals)
    }
}

impl ForwardIndexAccessor for CorpusForwardIndexAccessor<'_> {
    fn annotation_number(&mut self, annotation: &str) -> usize {
        if let Some(number) = self.annotations.iter().position(|a| a == annotation) {
            return number;
        }
        let field = self.codec_field(annotation);
        // Unknown fields still register; their term lookups find nothing.
        let global = self
            .reader
            .global_terms(&field)
            .unwrap_or_else(|_| Arc::new(GlobalTerms::build(*self.reader.collators(), &[])));
        self.annotations.push(annotation.to_string());
        self.globals.push(global);
        self.annotations.len() - 1
    }

    fn term_ids_for_literal(
        &self,
        results: &mut Vec<i32>,
        annotation_number: usize,
        value: &str,
        sensitivity: MatchSensitivity,
    ) {
        let mut ids = Vec::new();
        self.globals[annotation_number].index_of_all(&mut ids, value, sensitivity);
        results.extend(ids.into_iter().filter(|&id| id != NO_TERM));
    }

    fn term_ids_matching(
        &self,
        results: &mut Vec<i32>,
        annotation_number: usize,
        predicate: &dyn Fn(&str) -> bool,
    ) {
        let global = &self.globals[annotation_number];
        for id in 0..global.number_of_terms() as i32 {
            if let Some(term) = global.get(id) {
                if predicate(term) {
                    results.push(id);
                }
            }
        }
    }
}

/// Corpus-backed document view: per-annotation forward-index readers plus
/// the segment-to-global term id mapping.
pub struct CorpusForwardIndexDocument {
    readers: Vec<ForwardIndexReader>,
    globals: Vec<Arc<GlobalTerms>>,
    ord: usize,
    doc: i32,
}

impl CorpusForwardIndexDocument {
    pub fn from_parts(
        readers: Vec<ForwardIndexReader>,
        globals: Vec<Arc<GlobalTerms>>,
        ord: usize,
        doc: i32,
    ) -> Self {
        Self {
            readers,
            globals,
            ord,
            doc,
        }
    }

    /// Repoint the view at another document of the same segment.
    pub fn set_doc(&mut self, doc: i32) {
        self.doc = doc;
    }
}

impl ForwardIndexDocument for CorpusForwardIndexDocument {
    fn token_global_term_id(&mut self, annotation_number: usize, position: i32) -> Result<i32> {
        if position < 0 {
            return Ok(NO_TERM);
        }
        let segment_id = self.readers[annotation_number].token_at(self.doc, position)?;
        Ok(self.globals[annotation_number].segment_to_global(self.ord, segment_id))
    }

    fn valid_position(&mut self, position: i32) -> Result<bool> {
        if position < 0 {
            return Ok(false);
        }
        let length = self.readers[0].doc_length(self.doc)?;
        Ok(position < length)
    }

    fn term_string(&self, annotation_number: usize, global_term_id: i32) -> Option<String> {
        self.globals[annotation_number]
            .get(global_term_id)
            .map(str::to_string)
    }
}
