//! Merging segments re-runs the write pipeline over a combined view.

use concordia::codec::format::{Directory, SegmentInfo};
use concordia::codec::merge::merge_segments;
use concordia::codec::{SegmentCodecReader, SegmentCodecWriter};
use concordia::collation::Collators;
use concordia::index::postings::FieldsSource;
use concordia::index::{MemoryBuffer, MemoryFields};
use concordia::MatchSensitivity;

const WORD: &str = "contents%word";

fn frozen(docs: &[&[&str]]) -> MemoryFields {
    let mut buffer = MemoryBuffer::new();
    for (doc, tokens) in docs.iter().enumerate() {
        buffer.add_document(WORD, doc as i32, tokens);
    }
    buffer.freeze().unwrap()
}

#[test]
fn merged_segment_contains_all_docs_rebased() {
    let first = frozen(&[&["rust", "programming"], &["rust"]]);
    let second = frozen(&[&["rust", "language"]]);

    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();
    let segment = SegmentInfo::new("_m", "MemoryPostings");
    merge_segments(&dir, segment.clone(), Collators::default(), &[&first, &second]).unwrap();

    let reader = SegmentCodecReader::open(&dir, segment).unwrap();
    let terms = reader.terms(WORD).unwrap();
    // Union of both segments' terms: language, programming, rust.
    assert_eq!(terms.len(), 3);
    assert_eq!(terms.get(0), Some("language"));
    assert_eq!(terms.get(1), Some("programming"));
    assert_eq!(terms.get(2), Some("rust"));

    let mut forward = reader.forward_reader(WORD).unwrap();
    assert_eq!(forward.doc_count(), 3);
    // Doc 2 is the second source's doc 0, rebased.
    assert_eq!(forward.doc_tokens(0, 0, 2).unwrap(), vec![2, 1]);
    assert_eq!(forward.doc_tokens(1, 0, 1).unwrap(), vec![2]);
    assert_eq!(forward.doc_tokens(2, 0, 2).unwrap(), vec![2, 0]);
}

#[test]
fn merged_write_equals_direct_write_of_combined_corpus() {
    let first = frozen(&[&["aap", "noot"]]);
    let second = frozen(&[&["mies", "noot"]]);

    let tmp_merged = tempfile::tempdir().unwrap();
    let dir_merged = Directory::open(tmp_merged.path()).unwrap();
    let segment = SegmentInfo::new("_m", "MemoryPostings");
    merge_segments(
        &dir_merged,
        segment.clone(),
        Collators::default(),
        &[&first, &second],
    )
    .unwrap();

    // The same corpus written directly in one segment.
    let combined = frozen(&[&["aap", "noot"], &["mies", "noot"]]);
    let tmp_direct = tempfile::tempdir().unwrap();
    let dir_direct = Directory::open(tmp_direct.path()).unwrap();
    SegmentCodecWriter::new(&dir_direct, SegmentInfo::new("_m", "MemoryPostings"), Collators::default())
        .write(&combined)
        .unwrap();

    let merged = SegmentCodecReader::open(&dir_merged, segment.clone()).unwrap();
    let direct =
        SegmentCodecReader::open(&dir_direct, SegmentInfo::new("_m", "MemoryPostings")).unwrap();

    let merged_terms = merged.terms(WORD).unwrap();
    let direct_terms = direct.terms(WORD).unwrap();
    assert_eq!(merged_terms.len(), direct_terms.len());
    for id in 0..merged_terms.len() as i32 {
        assert_eq!(merged_terms.get(id), direct_terms.get(id));
        for sensitivity in [MatchSensitivity::Sensitive, MatchSensitivity::Insensitive] {
            assert_eq!(
                merged_terms.sort_position(id, sensitivity),
                direct_terms.sort_position(id, sensitivity)
            );
        }
    }

    let mut merged_forward = merged.forward_reader(WORD).unwrap();
    let mut direct_forward = direct.forward_reader(WORD).unwrap();
    assert_eq!(merged_forward.doc_count(), direct_forward.doc_count());
    for doc in 0..merged_forward.doc_count() {
        assert_eq!(
            merged_forward.doc_tokens(doc, 0, i32::MAX).unwrap(),
            direct_forward.doc_tokens(doc, 0, i32::MAX).unwrap()
        );
    }
}

#[test]
fn merged_view_doc_freq_sums_sources() {
    let first = frozen(&[&["x", "y"]]);
    let second = frozen(&[&["x"]]);
    let merged = concordia::codec::merge::MergedFieldsSource::new(&[&first, &second]);
    assert_eq!(merged.doc_freq(WORD, b"x"), 2);
    assert_eq!(merged.doc_freq(WORD, b"y"), 1);
    assert_eq!(merged.max_doc(), 2);
    assert!(merged.has_forward_index(WORD));
}
