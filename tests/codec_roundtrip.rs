//! Write segments through the codec and read them back.

use std::fs;
use std::sync::Arc;

use concordia::codec::format::{Directory, SegmentInfo, FOOTER_LEN};
use concordia::codec::{segment_file_name, SegmentCodecReader, SegmentCodecWriter, TOKENS_EXT};
use concordia::collation::Collators;
use concordia::index::MemoryBuffer;
use concordia::MatchSensitivity;
use concordia::NO_TERM;

const WORD: &str = "contents%word";

fn segment() -> SegmentInfo {
    SegmentInfo::new("_0", "MemoryPostings")
}

fn write_segment(dir: &Directory, buffer: MemoryBuffer) -> Arc<SegmentCodecReader> {
    let frozen = buffer.freeze().unwrap();
    SegmentCodecWriter::new(dir, segment(), Collators::default())
        .write(&frozen)
        .unwrap();
    SegmentCodecReader::open(dir, segment()).unwrap()
}

#[test]
fn single_doc_byte_width_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    // Terms get ids in term order: a=0, b=1, c=2, d=3; the doc spells out
    // token ids [3, 1, 3, 2].
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["d", "b", "d", "c"]);
    let reader = write_segment(&dir, buffer);

    let mut forward = reader.forward_reader(WORD).unwrap();
    assert_eq!(forward.doc_count(), 1);
    assert_eq!(forward.doc_length(0).unwrap(), 4);
    assert_eq!(forward.doc_tokens(0, 0, 4).unwrap(), vec![3, 1, 3, 2]);

    // Max term id 3 fits a byte: the tokens body is exactly those four
    // bytes between header and footer.
    let tokens_file = fs::read(tmp.path().join(segment_file_name("_0", "", TOKENS_EXT))).unwrap();
    let body = &tokens_file[tokens_file.len() - FOOTER_LEN - 4..tokens_file.len() - FOOTER_LEN];
    assert_eq!(body, &[3, 1, 3, 2]);
}

#[test]
fn all_tokens_the_same_uses_single_value() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    // Eight terms so the repeated one gets id 7.
    let mut buffer = MemoryBuffer::new();
    for (id, term) in ["a", "b", "c", "d", "e", "f", "g", "h"].iter().enumerate() {
        buffer.add_token(WORD, 0, id as i32, term);
    }
    for position in 0..1000 {
        buffer.add_token(WORD, 1, position, "h");
    }
    let reader = write_segment(&dir, buffer);

    let mut forward = reader.forward_reader(WORD).unwrap();
    let tokens = forward.doc_tokens(1, 0, 1000).unwrap();
    assert_eq!(tokens.len(), 1000);
    assert!(tokens.iter().all(|&t| t == 7));

    // Doc 0 takes 8 bytes (byte width), doc 1 a single i32.
    let tokens_file = fs::read(tmp.path().join(segment_file_name("_0", "", TOKENS_EXT))).unwrap();
    let header_len = tokens_file.len() - FOOTER_LEN - 8 - 4;
    let doc1 = &tokens_file[header_len + 8..header_len + 12];
    assert_eq!(doc1, &7i32.to_be_bytes());
}

#[test]
fn short_width_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    // More terms than fit a byte id.
    let mut buffer = MemoryBuffer::new();
    let terms: Vec<String> = (0..300).map(|i| format!("term{i:04}")).collect();
    for (position, term) in terms.iter().enumerate() {
        buffer.add_token(WORD, 0, position as i32, term);
    }
    let reader = write_segment(&dir, buffer);

    let mut forward = reader.forward_reader(WORD).unwrap();
    let tokens = forward.doc_tokens(0, 0, 300).unwrap();
    // term strings sort like their ids here, so position == id
    assert_eq!(tokens, (0..300).collect::<Vec<i32>>());
}

#[test]
fn sparse_field_keeps_gaps() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["w0", "w1", "w2", "w3", "w4"]);
    // Tag annotation only touches position 1.
    buffer.add_tag("contents%starttag", 0, 1, 4, "s");
    let reader = write_segment(&dir, buffer);

    let mut tags = reader.forward_reader("contents%starttag").unwrap();
    assert_eq!(
        tags.doc_tokens(0, 0, 5).unwrap(),
        vec![NO_TERM, 0, NO_TERM, NO_TERM, NO_TERM]
    );
}

#[test]
fn empty_doc_and_clamping() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &[]);
    buffer.add_document(WORD, 1, &["only", "two"]);
    let reader = write_segment(&dir, buffer);

    let mut forward = reader.forward_reader(WORD).unwrap();
    assert_eq!(forward.doc_length(0).unwrap(), 0);
    assert_eq!(forward.doc_tokens(0, 0, 10).unwrap(), Vec::<i32>::new());
    // Out-of-range slice clamps to the doc.
    assert_eq!(forward.doc_tokens(1, 1, 99).unwrap().len(), 1);
    assert_eq!(forward.doc_tokens(1, -3, 1).unwrap().len(), 1);
}

#[test]
fn term_table_and_sort_orders() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "The", "cat"]);
    let reader = write_segment(&dir, buffer);

    let terms = reader.terms(WORD).unwrap();
    assert_eq!(terms.len(), 3);
    // Term ids follow byte order: The=0, cat=1, the=2.
    assert_eq!(terms.get(0), Some("The"));
    assert_eq!(terms.get(1), Some("cat"));
    assert_eq!(terms.get(2), Some("the"));

    // Insensitively, "the" and "The" collapse to one sort position.
    let the = terms.sort_position(2, MatchSensitivity::Insensitive);
    let cap_the = terms.sort_position(0, MatchSensitivity::Insensitive);
    let cat = terms.sort_position(1, MatchSensitivity::Insensitive);
    assert_eq!(the, cap_the);
    assert!(cat < the);
    // Sensitively all three are distinct.
    let positions: Vec<i32> = (0..3)
        .map(|id| terms.sort_position(id, MatchSensitivity::Sensitive))
        .collect();
    assert_eq!(positions.len(), 3);
    assert!(positions.iter().all(|&p| p >= 0 && p < 3));
    assert_ne!(positions[0], positions[2]);
}

#[test]
fn writes_are_deterministic() {
    let build = || {
        let mut buffer = MemoryBuffer::new();
        buffer.add_document(WORD, 0, &["the", "big", "cat"]);
        buffer.add_document(WORD, 1, &["big", "bad", "wolf"]);
        buffer.add_tag("contents%starttag", 0, 0, 3, "s");
        buffer
    };

    let tmp_a = tempfile::tempdir().unwrap();
    let tmp_b = tempfile::tempdir().unwrap();
    write_segment(&Directory::open(tmp_a.path()).unwrap(), build());
    write_segment(&Directory::open(tmp_b.path()).unwrap(), build());

    let mut names: Vec<_> = fs::read_dir(tmp_a.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert!(!names.is_empty());
    for name in names {
        let a = fs::read(tmp_a.path().join(&name)).unwrap();
        let b = fs::read(tmp_b.path().join(&name)).unwrap();
        assert_eq!(a, b, "{name:?} differs between identical writes");
    }
}

#[test]
fn corrupted_segment_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b"]);
    let frozen = buffer.freeze().unwrap();
    SegmentCodecWriter::new(&dir, segment(), Collators::default())
        .write(&frozen)
        .unwrap();

    let tokens_path = tmp.path().join(segment_file_name("_0", "", TOKENS_EXT));
    let mut bytes = fs::read(&tokens_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x55;
    fs::write(&tokens_path, bytes).unwrap();

    let err = SegmentCodecReader::open(&dir, segment()).unwrap_err();
    assert!(err.is_segment_fatal());
}

#[test]
fn wrong_segment_identity_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();

    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a"]);
    let frozen = buffer.freeze().unwrap();
    SegmentCodecWriter::new(&dir, segment(), Collators::default())
        .write(&frozen)
        .unwrap();

    // Same files, wrong delegate name.
    let other = SegmentInfo::new("_0", "SomeOtherPostings");
    assert!(SegmentCodecReader::open(&dir, other).is_err());
}
