//! Inverted-index adapter surface.
//!
//! The engine does not implement a general inverted index; it consumes an
//! external postings/terms enumerator through the traits in [`postings`].
//! [`buffer`] provides the in-memory reference implementation used as write
//! input and in tests; [`reader`] aggregates open segments into a corpus
//! level view.

pub mod buffer;
pub mod postings;
pub mod reader;

pub use buffer::{MemoryBuffer, MemoryFields};
pub use postings::{FieldsSource, PostingsCursor, TermsCursor};
pub use reader::CorpusReader;
