//! Positional span-query engine.
//!
//! A query is a tree of [`ast::SpanQuery`] nodes. After [`ast::SpanQuery::rewrite`]
//! the tree is optimized (flattened, cost-ordered, sort/dedupe wrappers
//! inserted only where needed, forward-index fusion applied); each node can
//! then produce a lazy [`spans::Spans`] cursor per segment yielding
//! `(doc, start, end)` triples in its declared order.

pub mod ast;
pub mod context;
pub mod hits;
pub mod nodes;
pub mod spans;

pub use ast::{SpanQuery, MAX_UNLIMITED};
pub use context::{CancelToken, HitQueryContext};
pub use hits::{collect_all, Hit};
pub use spans::{Spans, SpansBox, NO_MORE_DOCS, NO_MORE_POSITIONS};
