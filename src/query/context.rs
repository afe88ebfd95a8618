//! Per-query state: capture-group registry and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Registry of named capture groups for one query. Each capture node
/// claims a slot index at registration time; hits materialize their
/// captures into a buffer of that many slots.
#[derive(Debug, Default)]
pub struct HitQueryContext {
    names: Vec<String>,
}

impl HitQueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot for a capture name. Registering the same name twice
    /// returns the same slot.
    pub fn register_capture(&mut self, name: &str) -> usize {
        if let Some(slot) = self.names.iter().position(|n| n == name) {
            return slot;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    pub fn num_captures(&self) -> usize {
        self.names.len()
    }

    pub fn capture_names(&self) -> &[String] {
        &self.names
    }

    /// A fresh buffer sized for this context's slots.
    pub fn make_buffer(&self) -> Vec<Option<(i32, i32)>> {
        vec![None; self.names.len()]
    }
}

/// Cooperative cancellation flag shared between a search driver and the
/// code running the search. Polled between iterator calls; never
/// interrupts an iterator mid-call.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_capture_dedupes() {
        let mut context = HitQueryContext::new();
        let a = context.register_capture("subject");
        let b = context.register_capture("object");
        let a2 = context.register_capture("subject");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(context.num_captures(), 2);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(EngineError::Cancelled)));
    }
}
