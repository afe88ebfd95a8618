//! Composite field names for annotated fields.
//!
//! A base field (say, `contents`) fans out into one index field per
//! annotation and sensitivity: `contents%word@i`, `contents%lemma@s`, ...
//! Bookkeeping subfields use `#`: `contents%word#fiid`.

use std::sync::OnceLock;

use regex::Regex;

use crate::collation::MatchSensitivity;
use crate::error::{EngineError, Result};

/// Separates the base field name from the annotation name.
pub const ANNOT_SEP: char = '%';

/// Separates the field/annotation name from the sensitivity suffix.
pub const SENSITIVITY_SEP: char = '@';

/// Separates the field/annotation name from a bookkeeping subfield name.
pub const BOOKKEEPING_SEP: char = '#';

/// Annotation used when none was specified.
pub const DEFAULT_MAIN_ANNOT_NAME: &str = "word";

/// Annotation holding inline tags (`<s>`, `<p>`, ...).
pub const TAGS_ANNOT_NAME: &str = "starttag";

/// Annotation for the spaces and punctuation between words.
pub const PUNCTUATION_ANNOT_NAME: &str = "punct";

/// Bookkeeping subfield: content store id.
pub const CONTENT_ID_BOOKKEEP_NAME: &str = "cid";

/// Bookkeeping subfield: forward index id.
pub const FORWARD_INDEX_ID_BOOKKEEP_NAME: &str = "fiid";

/// Bookkeeping subfield: document length in tokens.
pub const LENGTH_TOKENS_BOOKKEEP_NAME: &str = "length_tokens";

/// Components of a parsed composite field name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldNameComponents {
    pub base: String,
    pub annotation: Option<String>,
    pub sensitivity: Option<String>,
    pub bookkeeping: Option<String>,
}

/// Build the index field name for an annotation, with optional sensitivity.
pub fn annotation_field(base: &str, annotation: &str, sensitivity: Option<MatchSensitivity>) -> String {
    debug_assert!(!annotation.is_empty());
    let mut name = if base.is_empty() {
        annotation.to_string()
    } else {
        format!("{}{}{}", base, ANNOT_SEP, annotation)
    };
    if let Some(s) = sensitivity {
        name.push(SENSITIVITY_SEP);
        name.push_str(s.suffix());
    }
    name
}

/// Build a bookkeeping field name, e.g. `contents%word#fiid` or `contents#cid`.
pub fn bookkeeping_field(base: &str, annotation: Option<&str>, bookkeep: &str) -> String {
    let mut name = base.to_string();
    if let Some(annot) = annotation {
        name.push(ANNOT_SEP);
        name.push_str(annot);
    }
    name.push(BOOKKEEPING_SEP);
    name.push_str(bookkeep);
    name
}

/// Parse a composite field name into its components.
///
/// Accepted shapes: `base`, `base%annot`, `base%annot@sens`,
/// `base%annot#bookkeep` and `base#bookkeep`.
pub fn parse(field_name: &str) -> Result<FieldNameComponents> {
    let annot_pos = field_name.find(ANNOT_SEP);
    let sens_pos = field_name.find(SENSITIVITY_SEP);
    let book_pos = field_name.find(BOOKKEEPING_SEP);

    if let Some(ap) = annot_pos {
        let base = field_name[..ap].to_string();
        let rest = &field_name[ap + 1..];
        if let Some(sp) = sens_pos.filter(|&sp| sp > ap) {
            let annotation = field_name[ap + 1..sp].to_string();
            let sensitivity = field_name[sp + 1..].to_string();
            return Ok(FieldNameComponents {
                base,
                annotation: Some(annotation),
                sensitivity: Some(sensitivity),
                bookkeeping: None,
            });
        }
        if let Some(bp) = book_pos {
            if bp > ap {
                let annotation = field_name[ap + 1..bp].to_string();
                let bookkeeping = field_name[bp + 1..].to_string();
                return Ok(FieldNameComponents {
                    base,
                    annotation: Some(annotation),
                    sensitivity: None,
                    bookkeeping: Some(bookkeeping),
                });
            }
        }
        return Ok(FieldNameComponents {
            base,
            annotation: Some(rest.to_string()),
            sensitivity: None,
            bookkeeping: None,
        });
    }

    if sens_pos.is_some() {
        // A sensitivity without an annotation never occurs in a valid index.
        return Err(EngineError::Config(format!(
            "invalid composite field name: {field_name}"
        )));
    }

    if let Some(bp) = book_pos {
        return Ok(FieldNameComponents {
            base: field_name[..bp].to_string(),
            annotation: None,
            sensitivity: None,
            bookkeeping: Some(field_name[bp + 1..].to_string()),
        });
    }

    Ok(FieldNameComponents {
        base: field_name.to_string(),
        annotation: None,
        sensitivity: None,
        bookkeeping: None,
    })
}

/// Base field name: `contents%word@i` and `contents#cid` both give `contents`.
pub fn base_name(field_name: &str) -> &str {
    if let Some(pos) = field_name.find(ANNOT_SEP) {
        return &field_name[..pos];
    }
    if let Some(pos) = field_name.find(BOOKKEEPING_SEP) {
        return &field_name[..pos];
    }
    field_name
}

/// Sensitivity encoded in a composite field name.
pub fn sensitivity(field_name: &str) -> Result<MatchSensitivity> {
    match field_name.find(SENSITIVITY_SEP) {
        Some(pos) => MatchSensitivity::from_suffix(&field_name[pos + 1..]),
        None => Err(EngineError::Config(format!(
            "field name carries no sensitivity: {field_name}"
        ))),
    }
}

/// Is this index field part of an annotated field (as opposed to metadata)?
pub fn is_annotated_field(field_name: &str) -> bool {
    field_name.contains(ANNOT_SEP) || field_name.contains(SENSITIVITY_SEP)
}

/// Historic default: `word` and `lemma` get both sensitivities, all other
/// annotations only the insensitive one.
pub fn default_sensitive_insensitive(annotation: &str) -> bool {
    annotation == DEFAULT_MAIN_ANNOT_NAME || annotation == "lemma"
}

/// The value indexed for an attribute on an inline tag.
///
/// A tag `<s id="123">` indexes two tokens at the same position in the
/// `starttag` annotation: `s` and `@id__123`. Attributes of different start
/// tags at the same token position cannot be told apart; a future format
/// revision would move the tag name into this value.
pub fn tag_attribute_value(name: &str, value: &str) -> String {
    format!("@{}__{}", name.to_lowercase(), value.to_lowercase())
}

fn valid_xml_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z\d\-_.]*$").unwrap())
}

/// Is this a valid XML element name? Field and annotation names should be,
/// so output XML never needs escaping.
pub fn is_valid_xml_element_name(name: &str) -> bool {
    valid_xml_name_regex().is_match(name)
}

/// Replace forbidden characters with underscores and fix up a bad start
/// (digit, dash, or an `xml` prefix).
pub fn sanitize_xml_element_name(name: &str, disallow_dashes: bool) -> String {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();
    let forbidden = FORBIDDEN.get_or_init(|| Regex::new(r"[^\p{L}\d_.\-]").unwrap());
    let mut sanitized = forbidden.replace_all(name, "_").into_owned();
    if disallow_dashes {
        sanitized = sanitized.replace('-', "_");
    }
    let starts_ok = sanitized
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok || sanitized.to_lowercase().starts_with("xml") {
        sanitized.insert(0, '_');
    }
    sanitized
}
