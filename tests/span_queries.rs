//! Span-query engine behavior over a real segment.

use roaring::RoaringBitmap;

use concordia::codec::format::{Directory, SegmentInfo};
use concordia::codec::{SegmentCodecReader, SegmentCodecWriter};
use concordia::collation::Collators;
use concordia::index::MemoryBuffer;
use concordia::query::ast::{ensure_sorted_unique, SpanQuery, SpanQueryBox};
use concordia::query::context::{CancelToken, HitQueryContext};
use concordia::query::hits::{collect_all, collect_with_captures, Hit};
use concordia::query::nodes::{
    ContainmentOp, SpanQueryAnd, SpanQueryCapture, SpanQueryContainment, SpanQueryDocFilter,
    SpanQueryNot, SpanQueryOr, SpanQueryRepetition, SpanQuerySequence, SpanQuerySorted,
    SpanQueryTags, SpanQueryTerm,
};
use concordia::{CorpusReader, EngineConfig, EngineError};

const WORD: &str = "contents%word";
const TAGS: &str = "contents%starttag";

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

fn term(value: &str) -> SpanQueryBox {
    Box::new(SpanQueryTerm::new(WORD, value))
}

fn hit(doc: i32, start: i32, end: i32) -> Hit {
    Hit::new(doc, start, end)
}

#[test]
fn term_hits_are_single_tokens() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    assert_eq!(search(&reader, term("big")), vec![hit(0, 1, 2), hit(0, 2, 3)]);
    assert_eq!(search(&reader, term("dog")), vec![]);
}

#[test]
fn sequence_with_repetition() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    // the big{1,2} cat: only both bigs bridge the gap.
    let query: SpanQueryBox = Box::new(SpanQuerySequence::new(vec![
        term("the"),
        Box::new(SpanQueryRepetition::new(term("big"), 1, 2)),
        term("cat"),
    ]));
    assert_eq!(search(&reader, query), vec![hit(0, 0, 4)]);

    // the big{1,1} cat: no match, token 2 is also "big".
    let query: SpanQueryBox = Box::new(SpanQuerySequence::new(vec![
        term("the"),
        Box::new(SpanQueryRepetition::new(term("big"), 1, 1)),
        term("cat"),
    ]));
    assert_eq!(search(&reader, query), vec![]);
}

#[test]
fn sequence_joins_on_adjacency() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b", "a", "b", "b"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query: SpanQueryBox =
        Box::new(SpanQuerySequence::new(vec![term("a"), term("b")]));
    assert_eq!(search(&reader, query), vec![hit(0, 0, 2), hit(0, 2, 4)]);
}

#[test]
fn optional_clause_distributes() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "cat", "the", "big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    // the big{0,1} cat matches both with and without "big".
    let query: SpanQueryBox = Box::new(SpanQuerySequence::new(vec![
        term("the"),
        Box::new(SpanQueryRepetition::new(term("big"), 0, 1)),
        term("cat"),
    ]));
    assert_eq!(search(&reader, query), vec![hit(0, 0, 2), hit(0, 2, 5)]);
}

#[test]
fn or_merges_and_and_intersects() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b", "a"]);
    buffer.add_document(WORD, 1, &["b", "b"]);
    let (_tmp, reader) = corpus_from(buffer);

    let union = search(
        &reader,
        Box::new(SpanQueryOr::new(vec![term("a"), term("b")])),
    );
    assert_eq!(
        union,
        vec![
            hit(0, 0, 1),
            hit(0, 1, 2),
            hit(0, 2, 3),
            hit(1, 0, 1),
            hit(1, 1, 2)
        ]
    );

    // Identical spans in both clauses.
    let same = search(
        &reader,
        Box::new(SpanQueryAnd::new(vec![term("a"), term("a")])),
    );
    assert_eq!(same, vec![hit(0, 0, 1), hit(0, 2, 3)]);

    // Disjoint spans never align.
    let none = search(
        &reader,
        Box::new(SpanQueryAnd::new(vec![term("a"), term("b")])),
    );
    assert_eq!(none, vec![]);
}

#[test]
fn and_output_is_sorted_and_unique() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["x", "y", "x", "y", "x"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query: SpanQueryBox = Box::new(SpanQueryAnd::new(vec![
        Box::new(SpanQueryOr::new(vec![term("x"), term("y")])),
        Box::new(SpanQueryOr::new(vec![term("y"), term("x")])),
    ]));
    let hits = search(&reader, query);
    assert_eq!(hits.len(), 5);
    for pair in hits.windows(2) {
        assert!(pair[0] < pair[1], "output not strictly increasing");
    }
}

#[test]
fn tags_produce_spans_including_empty() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 1, &["one", "two", "three", "four"]);
    buffer.add_tag(TAGS, 1, 0, 3, "s");
    // An empty element between two words.
    buffer.add_tag(TAGS, 1, 2, 2, "milestone");
    let (_tmp, reader) = corpus_from(buffer);

    let sentences = search(&reader, Box::new(SpanQueryTags::new(TAGS, "s")));
    assert_eq!(sentences, vec![hit(1, 0, 3)]);

    // The empty tag is a real hit, not skipped.
    let milestones = search(&reader, Box::new(SpanQueryTags::new(TAGS, "milestone")));
    assert_eq!(milestones, vec![hit(1, 2, 2)]);
}

#[test]
fn containment_filters() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "cat", "sat", "the", "mat"]);
    buffer.add_tag(TAGS, 0, 0, 3, "s");
    let (_tmp, reader) = corpus_from(buffer);

    let sentence = || Box::new(SpanQueryTags::new(TAGS, "s")) as SpanQueryBox;

    // "the" within <s>: only the first one.
    let within = search(
        &reader,
        Box::new(SpanQueryContainment::new(
            term("the"),
            sentence(),
            ContainmentOp::Within,
            false,
        )),
    );
    assert_eq!(within, vec![hit(0, 0, 1)]);

    // Inverted: the one outside.
    let outside = search(
        &reader,
        Box::new(SpanQueryContainment::new(
            term("the"),
            sentence(),
            ContainmentOp::Within,
            true,
        )),
    );
    assert_eq!(outside, vec![hit(0, 3, 4)]);

    // <s> containing "cat".
    let containing = search(
        &reader,
        Box::new(SpanQueryContainment::new(
            sentence(),
            term("cat"),
            ContainmentOp::Containing,
            false,
        )),
    );
    assert_eq!(containing, vec![hit(0, 0, 3)]);

    // <s> starting where "the" starts.
    let starting = search(
        &reader,
        Box::new(SpanQueryContainment::new(
            sentence(),
            term("the"),
            ContainmentOp::StartingAt,
            false,
        )),
    );
    assert_eq!(starting, vec![hit(0, 0, 3)]);

    // <s> ending where "sat" ends.
    let ending = search(
        &reader,
        Box::new(SpanQueryContainment::new(
            sentence(),
            term("sat"),
            ContainmentOp::EndingAt,
            false,
        )),
    );
    assert_eq!(ending, vec![hit(0, 0, 3)]);
}

#[test]
fn not_complements_over_token_universe() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "cat"]);
    buffer.add_document(WORD, 1, &["big", "big"]);
    let (_tmp, reader) = corpus_from(buffer);

    let hits = search(&reader, Box::new(SpanQueryNot::new(term("big"))));
    assert_eq!(hits, vec![hit(0, 0, 1), hit(0, 2, 3)]);
}

#[test]
fn negating_multi_token_clause_is_an_error() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query = SpanQueryNot::new(Box::new(SpanQuerySequence::new(vec![
        term("a"),
        term("b"),
    ])));
    match query.rewrite(&reader) {
        Err(EngineError::Query(_)) => {}
        other => panic!("expected a query error, got {other:?}"),
    }
}

#[test]
fn double_negation_collapses() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b", "a"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query: SpanQueryBox = Box::new(SpanQueryNot::new(Box::new(SpanQueryNot::new(term("a")))));
    assert_eq!(search(&reader, query), vec![hit(0, 0, 1), hit(0, 2, 3)]);
}

#[test]
fn doc_filter_restricts_documents() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a"]);
    buffer.add_document(WORD, 1, &["a"]);
    buffer.add_document(WORD, 2, &["a"]);
    let (_tmp, reader) = corpus_from(buffer);

    let mut docs = RoaringBitmap::new();
    docs.insert(0);
    docs.insert(2);
    let hits = search(&reader, Box::new(SpanQueryDocFilter::new(term("a"), docs)));
    assert_eq!(hits, vec![hit(0, 0, 1), hit(2, 0, 1)]);
}

#[test]
fn sorted_and_unique_are_idempotent() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a", "b", "a", "b"]);
    let (_tmp, reader) = corpus_from(buffer);

    // Duplicate hits via OR of the same clause twice.
    let duplicated = || -> SpanQueryBox {
        Box::new(SpanQueryOr::new(vec![term("a"), term("a")]))
    };
    let plain = search(&reader, duplicated());
    assert_eq!(plain.len(), 4);

    let once = search(&reader, ensure_sorted_unique(duplicated()));
    assert_eq!(once, vec![hit(0, 0, 1), hit(0, 2, 3)]);

    // Wrapping again changes nothing.
    let twice = search(
        &reader,
        ensure_sorted_unique(ensure_sorted_unique(duplicated())),
    );
    assert_eq!(twice, once);

    // An explicit double sort collapses to one pass.
    let double_sorted: SpanQueryBox = Box::new(SpanQuerySorted::new(
        Box::new(SpanQuerySorted::new(duplicated(), false, true)),
        false,
        true,
    ));
    assert_eq!(search(&reader, double_sorted), once);
}

#[test]
fn captures_record_clause_extents() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["the", "big", "cat"]);
    let (_tmp, reader) = corpus_from(buffer);

    let query: SpanQueryBox = Box::new(SpanQuerySequence::new(vec![
        Box::new(SpanQueryCapture::new(term("the"), "subject")),
        term("big"),
    ]));
    let query = query.rewrite(&reader).unwrap();

    let ctx = reader.segment(0);
    let mut spans = query.spans(&ctx).unwrap().expect("segment has hits");
    let mut context = HitQueryContext::new();
    spans.register_captures(&mut context);
    assert_eq!(context.num_captures(), 1);

    let hits = collect_with_captures(
        spans.as_mut(),
        &context,
        reader.config(),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(hits.len(), 1);
    let (hit, captures) = &hits[0];
    assert_eq!((hit.doc, hit.start, hit.end), (0, 0, 2));
    assert_eq!(captures[0], Some((0, 1)));
}

#[test]
fn cancellation_aborts_collection() {
    let mut buffer = MemoryBuffer::new();
    for doc in 0..50 {
        buffer.add_document(WORD, doc, &["a"; 100]);
    }
    let (_tmp, reader) = corpus_from(buffer);

    let query = term("a").rewrite(&reader).unwrap();
    let ctx = reader.segment(0);
    let mut spans = query.spans(&ctx).unwrap().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = collect_all(spans.as_mut(), reader.config(), &cancel);
    assert!(matches!(result, Err(EngineError::Cancelled)));
}

#[test]
fn collection_honours_hit_cap() {
    let mut buffer = MemoryBuffer::new();
    buffer.add_document(WORD, 0, &["a"; 100]);
    let (_tmp, reader) = corpus_from(buffer);

    let mut config = EngineConfig::default();
    config.max_hits_to_collect = 10;
    let query = term("a").rewrite(&reader).unwrap();
    let ctx = reader.segment(0);
    let mut spans = query.spans(&ctx).unwrap().unwrap();
    let hits = collect_all(spans.as_mut(), &config, &CancelToken::new()).unwrap();
    assert_eq!(hits.len(), 10);
}
