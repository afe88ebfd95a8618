//! NFA states, construction and matching.

use std::collections::HashSet;

use regex::Regex;

use crate::collation::MatchSensitivity;
use crate::error::{EngineError, Result};
use crate::fieldname;
use crate::forward::accessor::{ForwardIndexAccessor, ForwardIndexDocument};
use crate::query::ast::MAX_UNLIMITED;

/// What a token state accepts.
#[derive(Clone, Debug)]
pub enum TokenPredicate {
    /// Token collates equal to a literal under the field's sensitivity.
    Literal(String),
    /// Token's term string matches a regex (anchored).
    Regex(String),
    /// Any token.
    Any,
}

impl TokenPredicate {
    pub fn literal(value: &str) -> Self {
        TokenPredicate::Literal(value.to_string())
    }
}

#[derive(Clone, Debug)]
enum NfaState {
    Token {
        /// Annotation-qualified field, e.g. `contents%word@i`.
        field: String,
        predicate: TokenPredicate,
        /// Global term ids accepted; None until lookup, or for `Any`.
        term_ids: Option<HashSet<i32>>,
        annotation_number: usize,
        next: Option<usize>,
    },
    Split {
        targets: Vec<Option<usize>>,
    },
    Match,
}

/// A partially built automaton piece: its entry state and the dangling
/// out-edges still to be patched.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub start: usize,
    dangling: Vec<(usize, usize)>,
}

/// Arena builder for NFA states.
#[derive(Default)]
pub struct NfaBuilder {
    states: Vec<NfaState>,
}

impl NfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// One token-matching state.
    pub fn token(&mut self, field: String, predicate: TokenPredicate) -> Fragment {
        let id = self.states.len();
        self.states.push(NfaState::Token {
            field,
            predicate,
            term_ids: None,
            annotation_number: 0,
            next: None,
        });
        Fragment {
            start: id,
            dangling: vec![(id, 0)],
        }
    }

    /// Non-deterministic fork over the given fragments.
    pub fn alternatives(&mut self, fragments: Vec<Fragment>) -> Fragment {
        let id = self.states.len();
        self.states.push(NfaState::Split {
            targets: fragments.iter().map(|f| Some(f.start)).collect(),
        });
        let dangling = fragments.into_iter().flat_map(|f| f.dangling).collect();
        Fragment {
            start: id,
            dangling,
        }
    }

    /// `first` then `second`.
    pub fn concatenate(&mut self, first: Fragment, second: Fragment) -> Fragment {
        self.patch(&first.dangling, second.start);
        Fragment {
            start: first.start,
            dangling: second.dangling,
        }
    }

    /// `min` to `max` repeats of the fragment produced by `make`.
    /// `min == 0` makes the whole fragment skippable.
    pub fn repeat<F>(&mut self, mut make: F, min: i32, max: i32) -> Result<Fragment>
    where
        F: FnMut(&mut NfaBuilder) -> Result<Fragment>,
    {
        debug_assert!(min >= 0 && max >= 1 && min <= max);

        // Mandatory prefix.
        let mut fragment: Option<Fragment> = None;
        for _ in 0..min {
            let copy = make(self)?;
            fragment = Some(match fragment {
                None => copy,
                Some(prev) => self.concatenate(prev, copy),
            });
        }

        if max == MAX_UNLIMITED {
            // Loop: split between another repeat and the exit. The exit
            // edge is preferred so matching tries the shortest
            // continuation first; find_matches explores both anyway.
            let split = self.states.len();
            self.states.push(NfaState::Split {
                targets: vec![None, None],
            });
            let copy = make(self)?;
            if let NfaState::Split { targets } = &mut self.states[split] {
                targets[0] = Some(copy.start);
            }
            self.patch(&copy.dangling, split);
            return Ok(match fragment {
                Some(prefix) => {
                    self.patch(&prefix.dangling, split);
                    Fragment {
                        start: prefix.start,
                        dangling: vec![(split, 1)],
                    }
                }
                None => Fragment {
                    start: split,
                    dangling: vec![(split, 1)],
                },
            });
        }

        // Bounded tail of optional copies.
        let mut start = fragment.as_ref().map(|f| f.start);
        let mut exits: Vec<(usize, usize)> = fragment.map(|f| f.dangling).unwrap_or_default();
        for _ in 0..(max - min) {
            let copy = make(self)?;
            let split = self.states.len();
            self.states.push(NfaState::Split {
                targets: vec![Some(copy.start), None],
            });
            self.patch(&exits, split);
            exits = copy.dangling;
            exits.push((split, 1));
            start = start.or(Some(split));
        }
        Ok(Fragment {
            start: start.unwrap_or(0),
            dangling: exits,
        })
    }

    fn patch(&mut self, dangling: &[(usize, usize)], target: usize) {
        for &(state, slot) in dangling {
            match &mut self.states[state] {
                NfaState::Token { next, .. } => *next = Some(target),
                NfaState::Split { targets } => targets[slot] = Some(target),
                NfaState::Match => {}
            }
        }
    }

    /// Tie all dangling edges to an accept state and freeze.
    pub fn finish(mut self, fragment: Fragment) -> Nfa {
        let accept = self.states.len();
        self.states.push(NfaState::Match);
        self.patch(&fragment.dangling, accept);
        // Any token edge left unpatched also accepts.
        for state in &mut self.states {
            match state {
                NfaState::Token { next, .. } if next.is_none() => *next = Some(accept),
                NfaState::Split { targets } => {
                    for target in targets.iter_mut() {
                        if target.is_none() {
                            *target = Some(accept);
                        }
                    }
                }
                _ => {}
            }
        }
        Nfa {
            states: self.states,
            start: fragment.start,
        }
    }
}

/// A frozen automaton. After [`Nfa::lookup`] it is pure data and can be
/// cloned per thread.
#[derive(Clone, Debug)]
pub struct Nfa {
    states: Vec<NfaState>,
    start: usize,
}

impl Nfa {
    /// Resolve annotation numbers and expand every token predicate to a
    /// global term id set. Must be called once before matching.
    pub fn lookup(&mut self, accessor: &mut dyn ForwardIndexAccessor) -> Result<()> {
        for index in 0..self.states.len() {
            let NfaState::Token {
                field, predicate, ..
            } = &self.states[index]
            else {
                continue;
            };
            let components = fieldname::parse(field)?;
            let annotation = components
                .annotation
                .clone()
                .ok_or_else(|| EngineError::Config(format!("field has no annotation: {field}")))?;
            let sensitivity = match components.sensitivity.as_deref() {
                Some(suffix) => MatchSensitivity::from_suffix(suffix)?,
                None => MatchSensitivity::Sensitive,
            };
            let annotation_number = accessor.annotation_number(&annotation);

            let ids = match predicate {
                TokenPredicate::Literal(value) => {
                    let mut ids = Vec::new();
                    accessor.term_ids_for_literal(&mut ids, annotation_number, value, sensitivity);
                    Some(ids)
                }
                TokenPredicate::Regex(pattern) => {
                    let anchored = if sensitivity.is_case_sensitive() {
                        format!("^(?:{pattern})$")
                    } else {
                        format!("(?i)^(?:{pattern})$")
                    };
                    let regex = Regex::new(&anchored)
                        .map_err(|e| EngineError::Query(format!("bad term regex: {e}")))?;
                    let mut ids = Vec::new();
                    accessor.term_ids_matching(&mut ids, annotation_number, &|term| {
                        regex.is_match(term)
                    });
                    Some(ids)
                }
                TokenPredicate::Any => None,
            };

            if let NfaState::Token {
                term_ids,
                annotation_number: number,
                ..
            } = &mut self.states[index]
            {
                *term_ids = ids.map(|ids| ids.into_iter().collect());
                *number = annotation_number;
            }
        }
        Ok(())
    }

    /// Can the automaton match starting at `position`, walking in
    /// `direction` (+1 or -1)?
    pub fn matches(
        &self,
        doc: &mut dyn ForwardIndexDocument,
        position: i32,
        direction: i32,
    ) -> Result<bool> {
        let mut results = Vec::new();
        self.run(self.start, doc, position, direction, true, &mut results)?;
        Ok(!results.is_empty())
    }

    /// All final positions of successful matches from `position`. For
    /// direction +1 a final position is the exclusive end; for -1 it is
    /// one before the last matched token.
    pub fn find_matches(
        &self,
        doc: &mut dyn ForwardIndexDocument,
        position: i32,
        direction: i32,
        results: &mut Vec<i32>,
    ) -> Result<()> {
        self.run(self.start, doc, position, direction, false, results)?;
        results.sort_unstable();
        results.dedup();
        Ok(())
    }

    fn run(
        &self,
        state: usize,
        doc: &mut dyn ForwardIndexDocument,
        position: i32,
        direction: i32,
        stop_at_first: bool,
        results: &mut Vec<i32>,
    ) -> Result<bool> {
        match &self.states[state] {
            NfaState::Match => {
                results.push(position);
                Ok(true)
            }
            NfaState::Token {
                term_ids,
                annotation_number,
                next,
                ..
            } => {
                if !doc.valid_position(position)? {
                    return Ok(false);
                }
                let accepted = match term_ids {
                    None => true,
                    Some(ids) => {
                        let id = doc.token_global_term_id(*annotation_number, position)?;
                        ids.contains(&id)
                    }
                };
                if !accepted {
                    return Ok(false);
                }
                match next {
                    Some(next) => self.run(
                        *next,
                        doc,
                        position + direction,
                        direction,
                        stop_at_first,
                        results,
                    ),
                    None => {
                        results.push(position + direction);
                        Ok(true)
                    }
                }
            }
            NfaState::Split { targets } => {
                let mut any = false;
                for target in targets.iter().flatten() {
                    if self.run(*target, doc, position, direction, stop_at_first, results)? {
                        any = true;
                        if stop_at_first {
                            return Ok(true);
                        }
                    }
                }
                Ok(any)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Document over a string: each char is a token whose global term id
    /// is its code point. Mirrors matching against a real forward index.
    struct StringDocument {
        input: Vec<char>,
    }

    impl StringDocument {
        fn new(input: &str) -> Self {
            Self {
                input: input.chars().collect(),
            }
        }
    }

    impl ForwardIndexDocument for StringDocument {
        fn token_global_term_id(&mut self, _annotation: usize, position: i32) -> Result<i32> {
            if position < 0 || position as usize >= self.input.len() {
                return Ok(crate::forward::NO_TERM);
            }
            Ok(self.input[position as usize] as i32)
        }

        fn valid_position(&mut self, position: i32) -> Result<bool> {
            Ok(position >= 0 && (position as usize) < self.input.len())
        }

        fn term_string(&self, _annotation: usize, global_term_id: i32) -> Option<String> {
            char::from_u32(global_term_id as u32).map(|c| c.to_string())
        }
    }

    struct CharAccessor;

    impl ForwardIndexAccessor for CharAccessor {
        fn annotation_number(&mut self, annotation: &str) -> usize {
            assert_eq!(annotation, "word");
            0
        }

        fn term_ids_for_literal(
            &self,
            results: &mut Vec<i32>,
            _annotation_number: usize,
            value: &str,
            _sensitivity: MatchSensitivity,
        ) {
            assert_eq!(value.chars().count(), 1);
            if let Some(c) = value.chars().next() {
                results.push(c as i32);
            }
        }

        fn term_ids_matching(
            &self,
            results: &mut Vec<i32>,
            _annotation_number: usize,
            predicate: &dyn Fn(&str) -> bool,
        ) {
            for c in 'a'..='z' {
                if predicate(&c.to_string()) {
                    results.push(c as i32);
                }
            }
        }
    }

    fn token(builder: &mut NfaBuilder, value: &str) -> Fragment {
        builder.token(
            "contents%word@i".to_string(),
            TokenPredicate::literal(value),
        )
    }

    #[test]
    fn test_nfa_simple_alternatives() {
        // ab|ba
        let mut builder = NfaBuilder::new();
        let a1 = token(&mut builder, "a");
        let b1 = token(&mut builder, "b");
        let ab = builder.concatenate(a1, b1);
        let b2 = token(&mut builder, "b");
        let a2 = token(&mut builder, "a");
        let ba = builder.concatenate(b2, a2);
        let either = builder.alternatives(vec![ab, ba]);
        let mut nfa = builder.finish(either);
        nfa.lookup(&mut CharAccessor).unwrap();

        let mut doc = StringDocument::new("abatoir");
        assert!(nfa.matches(&mut doc, 0, 1).unwrap());
        assert!(nfa.matches(&mut doc, 1, 1).unwrap());
        assert!(!nfa.matches(&mut doc, 2, 1).unwrap());
        assert!(!nfa.matches(&mut doc, 6, 1).unwrap());
    }

    #[test]
    fn test_nfa_repetition() {
        // a c* e
        let mut builder = NfaBuilder::new();
        let a = token(&mut builder, "a");
        let c_star = builder
            .repeat(|b| Ok(token(b, "c")), 0, MAX_UNLIMITED)
            .unwrap();
        let e = token(&mut builder, "e");
        let ac = builder.concatenate(a, c_star);
        let ace = builder.concatenate(ac, e);
        let mut nfa = builder.finish(ace);
        nfa.lookup(&mut CharAccessor).unwrap();

        for (input, expected) in [
            ("access", true),
            ("aces", true),
            ("aether", true),
            ("acquire", false),
            ("cesium", false),
        ] {
            let mut doc = StringDocument::new(input);
            assert_eq!(nfa.matches(&mut doc, 0, 1).unwrap(), expected, "{input}");
        }

        // Backward matching from the last 'a' of "ideaal": e then a.
        let mut doc = StringDocument::new("ideaal");
        assert!(nfa.matches(&mut doc, 3, -1).unwrap());
    }

    #[test]
    fn test_nfa_find_matches_all_ends() {
        // ab? from position 0 of "abc": ends 1 (just a) and 2 (ab).
        let mut builder = NfaBuilder::new();
        let a = token(&mut builder, "a");
        let b_opt = builder.repeat(|b| Ok(token(b, "b")), 0, 1).unwrap();
        let frag = builder.concatenate(a, b_opt);
        let mut nfa = builder.finish(frag);
        nfa.lookup(&mut CharAccessor).unwrap();

        let mut doc = StringDocument::new("abc");
        let mut ends = Vec::new();
        nfa.find_matches(&mut doc, 0, 1, &mut ends).unwrap();
        assert_eq!(ends, vec![1, 2]);
    }

    #[test]
    fn test_nfa_regex_predicate() {
        let mut builder = NfaBuilder::new();
        let frag = builder.token(
            "contents%word@i".to_string(),
            TokenPredicate::Regex("[ab]".to_string()),
        );
        let mut nfa = builder.finish(frag);
        nfa.lookup(&mut CharAccessor).unwrap();

        let mut doc = StringDocument::new("cab");
        assert!(!nfa.matches(&mut doc, 0, 1).unwrap());
        assert!(nfa.matches(&mut doc, 1, 1).unwrap());
        assert!(nfa.matches(&mut doc, 2, 1).unwrap());
    }
}
