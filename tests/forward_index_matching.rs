//! NFA matching against the forward index, and the fused
//! anchor-plus-NFA query node.

use concordia::codec::format::{Directory, SegmentInfo};
use concordia::codec::{SegmentCodecReader, SegmentCodecWriter};
use concordia::collation::Collators;
use concordia::forward::accessor::CorpusForwardIndexAccessor;
use concordia::index::MemoryBuffer;
use concordia::nfa::NfaBuilder;
use concordia::query::ast::{SpanQuery, SpanQueryBox};
use concordia::query::context::CancelToken;
use concordia::query::hits::{collect_all, Hit};
use concordia::query::nodes::{
    SpanQueryForwardMatch, SpanQueryRepetition, SpanQuerySequence, SpanQueryTerm,
};
use concordia::{CorpusReader, EngineConfig};

const WORD: &str = "contents%word";

fn corpus_from(buffer: MemoryBuffer) -> (tempfile::TempDir, CorpusReader) {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Directory::open(tmp.path()).unwrap();
    let segment = SegmentInfo::new("_0", "MemoryPostings");
    let frozen = buffer.freeze().unwrap();
    SegmentCodecWriter::new(&dir, segment.clone(), Collators::default())
        .write(&frozen)
        .unwrap();
    let codec = SegmentCodecReader::open(&dir, segment).unwrap();
    let mut reader = CorpusReader::new(Collators::default(), EngineConfig::default());
    reader.add_segment(codec, Box::new(frozen));
    (tmp, reader)
}

fn term(value: &str) -> SpanQueryBox {
    Box::new(SpanQueryTerm::new(WORD, value))
}

fn search(reader: &CorpusReader, query: SpanQueryBox) -> Vec<Hit> {
    let query = query.rewrite(reader).unwrap();
    let mut hits = Vec::new();
    for ord in 0..reader.segment_count() {
        let ctx = reader.segment(ord);
        if let Some(mut spans) = query.spans(&ctx).unwrap() {
            hits.extend(
                collect_all(spans.as_mut(), reader.config(), &CancelToken::new()).unwrap(),
            );
        }
    }
    hits.sort();
    hits
}

/// Compile a query to an NFA over the corpus's global term ids and run it
/// against a document from the forward index.
#[test]
fn nfa_runs_against_forward_index_documents() {
    let mut buffer = MemoryBuffer::new();
    // "a c c e" and a decoy doc.
    buffer.add_document(WORD, 0, &["a", "c", "c", "e"]);
    buffer.add_document(WORD, 1, &["a", "x", "e"]);
    let (_tmp, reader) = corpus_from(buffer);

    // a c* e
    let query: SpanQueryBox = Box::new(SpanQuerySequence::new(vec![
        term("a"),
        Box::new(SpanQueryRepetition::new(term("c"), 0, i32::MAX)),
        term("e"),
    ]));
    let mut accessor = CorpusForwardIndexAccessor::new(&reader, "contents");
    let mut builder = NfaBuilder::new();
    let fragment = query.nfa_fragment(&mut builder, 1).unwrap();
    let mut nfa = builder.finish(fragment);
    nfa.lookup(&mut accessor).unwrap();

    let mut doc0 = accessor.document(0, 0).unwrap();
    assert!(nfa.matches(&mut doc0, 0, 1).unwrap());
    let mut ends = Vec::new();
    nfa.find_matches(&mut doc0, 0, 1, &mut ends).unwrap();
    assert_eq!(ends, vec![4]);

    let mut doc1 = accessor.document(0, 1).unwrap();
    assert!(!nfa.matches(&mut doc1, 0, 1).unwrap());

    // Backward from the "e": e then (c*) then a.
    let mut builder = NfaBuilder::new();
    let fragment = query.nfa_fragment(&mut builder, -1).unwrap();
    let mut nfa_rev = builder.finish(fragment);
    nfa_rev.lookup(&mut accessor).unwrap();
    let mut doc0 = accessor.document(0, 0).unwrap();
    assert!(nfa_rev.matches(&mut doc0, 3, -1).unwrap());
}

#[test]
fn forward_match_extends_anchor_forward() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "cat", "sat"]);
    buffer.add_document(WORD, 1, &["big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    let fused = SpanQueryForwardMatch::compile(
        term("the"),
        Box::new(SpanQuerySequence::new(vec![term("big"), term("cat")])),
        1,
        &reader,
    )
    .unwrap();
    let hits = search(&reader, Box::new(fused));
    assert_eq!(hits, vec![Hit::new(0, 0, 3)]);
}

#[test]
fn forward_match_extends_anchor_backward() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "cat", "sat"]);
    let (_tmp, reader) = corpus_from(buffer);

    let fused = SpanQueryForwardMatch::compile(
        term("cat"),
        Box::new(SpanQuerySequence::new(vec![term("the"), term("big")])),
        -1,
        &reader,
    )
    .unwrap();
    let hits = search(&reader, Box::new(fused));
    assert_eq!(hits, vec![Hit::new(0, 0, 3)]);
}

#[test]
fn forward_match_with_repetition_produces_all_lengths() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    // the big{0,2}: anchor "the" extended by zero, one or two "big"s.
    let fused = SpanQueryForwardMatch::compile(
        term("the"),
        Box::new(SpanQueryRepetition::new(term("big"), 0, 2)),
        1,
        &reader,
    )
    .unwrap();
    let hits = search(&reader, Box::new(fused));
    assert_eq!(
        hits,
        vec![Hit::new(0, 0, 1), Hit::new(0, 0, 2), Hit::new(0, 0, 3)]
    );
}

/// The sequence rewriter fuses an expensive clause with a cheap anchor.
#[test]
fn rewriter_fuses_expensive_clause() {
    let mut buffer = MemoryBuffer::new();
    // "noot" is everywhere, "aap" occurs once.
    for doc in 0..40 {
        buffer.add_document(WORD, doc, &["noot", "noot", "noot"]);
    }
    buffer.add_document(WORD, 40, &["aap", "noot", "mies"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query: SpanQueryBox =
        Box::new(SpanQuerySequence::new(vec![term("aap"), term("noot")]));
    let rewritten = query.rewrite(&reader).unwrap();
    assert!(
        format!("{rewritten:?}").contains("SpanQueryForwardMatch"),
        "expected forward-index fusion, got {rewritten:?}"
    );

    let hits = search(&reader, query);
    assert_eq!(hits, vec![Hit::new(40, 0, 2)]);
}

#[test]
fn insensitive_literal_matches_any_case() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["The", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    // Literal under @i matches the capitalized token.
    let insensitive: SpanQueryBox =
        Box::new(SpanQueryTerm::new("contents%word@i", "the"));
    let mut accessor = CorpusForwardIndexAccessor::new(&reader, "contents");
    let mut builder = NfaBuilder::new();
    let fragment = insensitive.nfa_fragment(&mut builder, 1).unwrap();
    let mut nfa = builder.finish(fragment);
    nfa.lookup(&mut accessor).unwrap();

    let mut doc = accessor.document(0, 0).unwrap();
    assert!(nfa.matches(&mut doc, 0, 1).unwrap());
    assert!(!nfa.matches(&mut doc, 1, 1).unwrap());
}
