//! Concrete span query node implementations.

pub mod and;
pub mod capture;
pub mod containment;
pub mod filter;
pub mod forward_match;
pub mod not;
pub mod or;
pub mod repetition;
pub mod sequence;
pub mod sorted;
pub mod tags;
pub mod term;
pub mod unique;

pub use and::SpanQueryAnd;
pub use capture::SpanQueryCapture;
pub use containment::{ContainmentOp, SpanQueryContainment};
pub use filter::SpanQueryDocFilter;
pub use forward_match::SpanQueryForwardMatch;
pub use not::SpanQueryNot;
pub use or::SpanQueryOr;
pub use repetition::SpanQueryRepetition;
pub use sequence::SpanQuerySequence;
pub use sorted::SpanQuerySorted;
pub use tags::SpanQueryTags;
pub use term::SpanQueryTerm;
pub use unique::SpanQueryUnique;
