//! Segment codec: the custom per-segment extension files holding the
//! forward index and term tables.
//!
//! The codec wraps an external postings source (the "delegate") and writes
//! these files next to it:
//!
//! | extension      | contents                                              |
//! |----------------|-------------------------------------------------------|
//! | `.fields`      | per field: name, term count, offsets into the others  |
//! | `.terms`       | concatenated length-prefixed term strings             |
//! | `.termindex`   | per term: byte offset of its string in `.terms`       |
//! | `.termorder`   | four parallel i32 arrays per field (sort orders)      |
//! | `.tokensindex` | per doc: offset, length, codec tag, codec parameter   |
//! | `.tokens`      | packed per-doc token streams                          |
//!
//! `.termvec.tmp` is write-time scratch and is deleted afterwards.

pub mod format;
pub mod merge;
pub mod reader;
pub mod tokens;
pub mod writer;

pub use reader::SegmentCodecReader;
pub use writer::SegmentCodecWriter;

pub const FIELDS_EXT: &str = "fields";
pub const TERMS_EXT: &str = "terms";
pub const TERMINDEX_EXT: &str = "termindex";
pub const TERMORDER_EXT: &str = "termorder";
pub const TOKENS_INDEX_EXT: &str = "tokensindex";
pub const TOKENS_EXT: &str = "tokens";
pub const TERMVEC_TMP_EXT: &str = "termvec.tmp";

/// File name for a segment extension file, e.g. `_0.tokens`.
pub fn segment_file_name(segment_name: &str, suffix: &str, ext: &str) -> String {
    if suffix.is_empty() {
        format!("{segment_name}.{ext}")
    } else {
        format!("{segment_name}_{suffix}.{ext}")
    }
}
