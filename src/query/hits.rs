//! Hit materialization.
//!
//! The only place the engine drains an iterator to completion. The loop
//! polls the cancellation token between iterator calls and honours the
//! configured cap; everything upstream stays lazy.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::query::context::{CancelToken, HitQueryContext};
use crate::query::spans::{Spans, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// One query hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hit {
    pub doc: i32,
    pub start: i32,
    pub end: i32,
}

impl Hit {
    pub fn new(doc: i32, start: i32, end: i32) -> Self {
        debug_assert!(start <= end);
        Self { doc, start, end }
    }
}

/// Drain a spans cursor into a vector of hits.
pub fn collect_all(
    spans: &mut dyn Spans,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<Vec<Hit>> {
    let poll_interval = config.cancel_poll_interval.max(1);
    let mut hits = Vec::new();
    let mut calls = 0usize;
    loop {
        if spans.next_doc()? == NO_MORE_DOCS {
            return Ok(hits);
        }
        loop {
            calls += 1;
            if calls % poll_interval == 0 {
                cancel.check()?;
            }
            let start = spans.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                break;
            }
            hits.push(Hit::new(spans.doc_id(), start, spans.end_position()));
            if hits.len() >= config.max_hits_to_collect {
                return Ok(hits);
            }
        }
    }
}

/// Like [`collect_all`], also materializing the capture slots registered
/// in `context` for every hit.
pub fn collect_with_captures(
    spans: &mut dyn Spans,
    context: &HitQueryContext,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<Vec<(Hit, Vec<Option<(i32, i32)>>)>> {
    let poll_interval = config.cancel_poll_interval.max(1);
    let mut hits = Vec::new();
    let mut calls = 0usize;
    loop {
        if spans.next_doc()? == NO_MORE_DOCS {
            return Ok(hits);
        }
        loop {
            calls += 1;
            if calls % poll_interval == 0 {
                cancel.check()?;
            }
            let start = spans.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                break;
            }
            let mut captures = context.make_buffer();
            spans.get_captured_groups(&mut captures);
            hits.push((
                Hit::new(spans.doc_id(), start, spans.end_position()),
                captures,
            ));
            if hits.len() >= config.max_hits_to_collect {
                return Ok(hits);
            }
        }
    }
}
