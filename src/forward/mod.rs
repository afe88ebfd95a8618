//! Forward index: from `(doc, position)` back to the token at that
//! position, plus the term tables that give those tokens meaning.

pub mod accessor;
pub mod global;
pub mod reader;
pub mod terms;

pub use accessor::{ForwardIndexAccessor, ForwardIndexDocument};
pub use global::GlobalTerms;
pub use reader::ForwardIndexReader;
pub use terms::SegmentTerms;

/// Sentinel term id for a token position without a primary value.
pub const NO_TERM: i32 = -1;
