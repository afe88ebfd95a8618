//! Collators for the two match sensitivities.
//!
//! A collator defines a total order over term strings. Terms that collate
//! equal under a collator share a sort position in the term tables.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Whether a comparison respects case or folds it away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchSensitivity {
    Sensitive,
    Insensitive,
}

impl MatchSensitivity {
    pub fn is_case_sensitive(self) -> bool {
        matches!(self, MatchSensitivity::Sensitive)
    }

    /// Parse the one-letter field-name suffix ("s" / "i").
    pub fn from_suffix(suffix: &str) -> Result<Self> {
        match suffix {
            "s" => Ok(MatchSensitivity::Sensitive),
            "i" => Ok(MatchSensitivity::Insensitive),
            other => Err(EngineError::UnknownSensitivity(other.to_string())),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            MatchSensitivity::Sensitive => "s",
            MatchSensitivity::Insensitive => "i",
        }
    }
}

/// Sort key for a term under one collator. Comparing keys is equivalent to
/// comparing the terms through the collator, but cheaper when repeated.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey(String);

/// A single collator.
#[derive(Clone, Copy, Debug)]
pub struct Collator {
    sensitivity: MatchSensitivity,
}

impl Collator {
    pub fn new(sensitivity: MatchSensitivity) -> Self {
        Self { sensitivity }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self.sensitivity {
            MatchSensitivity::Sensitive => a.cmp(b),
            MatchSensitivity::Insensitive => {
                let mut ca = a.chars().flat_map(char::to_lowercase);
                let mut cb = b.chars().flat_map(char::to_lowercase);
                loop {
                    match (ca.next(), cb.next()) {
                        (None, None) => return Ordering::Equal,
                        (None, Some(_)) => return Ordering::Less,
                        (Some(_), None) => return Ordering::Greater,
                        (Some(x), Some(y)) => match x.cmp(&y) {
                            Ordering::Equal => continue,
                            other => return other,
                        },
                    }
                }
            }
        }
    }

    pub fn equal(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    pub fn collation_key(&self, term: &str) -> CollationKey {
        match self.sensitivity {
            MatchSensitivity::Sensitive => CollationKey(term.to_string()),
            MatchSensitivity::Insensitive => {
                CollationKey(term.chars().flat_map(char::to_lowercase).collect())
            }
        }
    }
}

/// The pair of collators every segment is written and read with.
#[derive(Clone, Copy, Debug)]
pub struct Collators {
    sensitive: Collator,
    insensitive: Collator,
}

impl Collators {
    pub fn get(&self, sensitivity: MatchSensitivity) -> &Collator {
        match sensitivity {
            MatchSensitivity::Sensitive => &self.sensitive,
            MatchSensitivity::Insensitive => &self.insensitive,
        }
    }
}

impl Default for Collators {
    fn default() -> Self {
        Self {
            sensitive: Collator::new(MatchSensitivity::Sensitive),
            insensitive: Collator::new(MatchSensitivity::Insensitive),
        }
    }
}
