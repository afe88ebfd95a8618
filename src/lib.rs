//! Concordia: a corpus search engine core.
//!
//! Positional queries (sequences, repetitions, containment) over
//! linguistically annotated text, backed by an inverted-index delegate
//! plus a custom per-segment forward index: for every document the token
//! stream of each annotation, and a term table with case-sensitive and
//! case-insensitive sort orders. Queries evaluate as lazy span iterators;
//! low-selectivity clauses can instead run as an NFA directly against the
//! forward index.

pub mod codec;
pub mod collation;
pub mod config;
pub mod error;
pub mod fieldname;
pub mod forward;
pub mod index;
pub mod nfa;
pub mod query;

pub use codec::{SegmentCodecReader, SegmentCodecWriter};
pub use collation::{Collators, MatchSensitivity};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use forward::{ForwardIndexReader, GlobalTerms, NO_TERM};
pub use index::{CorpusReader, MemoryBuffer, MemoryFields};
pub use query::{CancelToken, Hit, SpanQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
