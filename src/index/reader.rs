//! Corpus-level reader: the set of open segments.
//!
//! Segment files, codec metadata and global term tables are immutable
//! after construction and shared across threads; the global-terms cache is
//! the only guarded state. Iterators and forward-index views handed out
//! from here are per-thread.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::SegmentCodecReader;
use crate::collation::Collators;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::forward::reader::ForwardIndexReader;
use crate::forward::terms::SegmentTerms;
use crate::forward::GlobalTerms;
use crate::index::postings::FieldsSource;

struct CorpusSegment {
    codec: Arc<SegmentCodecReader>,
    postings: Box<dyn FieldsSource + Send + Sync>,
    terms: RwLock<HashMap<String, Arc<SegmentTerms>>>,
}

/// Everything a span iterator needs from one segment.
pub struct SegmentContext<'a> {
    pub ord: usize,
    pub postings: &'a dyn FieldsSource,
    pub codec: &'a SegmentCodecReader,
}

impl SegmentContext<'_> {
    pub fn max_doc(&self) -> i32 {
        self.postings.max_doc()
    }

    pub fn forward_reader(&self, field: &str) -> Result<ForwardIndexReader> {
        self.codec.forward_reader(field)
    }
}

/// An open corpus: ordered segments plus the lazily built global term
/// tables.
pub struct CorpusReader {
    collators: Collators,
    config: EngineConfig,
    segments: Vec<CorpusSegment>,
    global_terms: RwLock<HashMap<String, Arc<GlobalTerms>>>,
}

impl CorpusReader {
    pub fn new(collators: Collators, config: EngineConfig) -> Self {
        Self {
            collators,
            config,
            segments: Vec::new(),
            global_terms: RwLock::new(HashMap::new()),
        }
    }

    /// Attach one segment: its codec reader and the postings source of the
    /// delegate index.
    pub fn add_segment(
        &mut self,
        codec: Arc<SegmentCodecReader>,
        postings: Box<dyn FieldsSource + Send + Sync>,
    ) {
        self.segments.push(CorpusSegment {
            codec,
            postings,
            terms: RwLock::new(HashMap::new()),
        });
    }

    pub fn collators(&self) -> &Collators {
        &self.collators
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, ord: usize) -> SegmentContext<'_> {
        let segment = &self.segments[ord];
        SegmentContext {
            ord,
            postings: segment.postings.as_ref(),
            codec: &segment.codec,
        }
    }

    /// Term table of one segment for a field. Segments without the field
    /// get an empty table so ordinals stay aligned.
    pub fn segment_terms(&self, ord: usize, field: &str) -> Result<Arc<SegmentTerms>> {
        let segment = &self.segments[ord];
        if let Some(terms) = segment.terms.read().get(field) {
            return Ok(Arc::clone(terms));
        }
        let terms = if segment.codec.field(field).is_ok() {
            Arc::new(segment.codec.terms(field)?)
        } else {
            Arc::new(SegmentTerms::new(
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            ))
        };
        segment
            .terms
            .write()
            .insert(field.to_string(), Arc::clone(&terms));
        Ok(terms)
    }

    /// Global term table for a field, built once and cached.
    pub fn global_terms(&self, field: &str) -> Result<Arc<GlobalTerms>> {
        if let Some(global) = self.global_terms.read().get(field) {
            return Ok(Arc::clone(global));
        }
        let mut per_segment = Vec::with_capacity(self.segments.len());
        for ord in 0..self.segments.len() {
            per_segment.push(self.segment_terms(ord, field)?);
        }
        let refs: Vec<&SegmentTerms> = per_segment.iter().map(Arc::as_ref).collect();
        let global = Arc::new(GlobalTerms::build(self.collators, &refs));
        self.global_terms
            .write()
            .insert(field.to_string(), Arc::clone(&global));
        Ok(global)
    }

    /// Document frequency of a term summed over all segments; the basis of
    /// reverse-matching cost estimates.
    pub fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments
            .iter()
            .map(|s| s.postings.doc_freq(field, term.as_bytes()).max(0) as u64)
            .sum()
    }
}
