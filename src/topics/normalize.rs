// Corpus normalization — turns raw request values into documents that are
// safe to embed, cluster, and paste into prompts.
//
// Every surviving document ends up between MIN_LENGTH and MAX_LENGTH
// characters. Very short documents break the clustering stage, very long
// ones blow up prompt sizes. The corpus is topped up with numbered
// placeholder documents so clustering always has at least MIN_DOCUMENTS.

use serde_json::Value;
use tracing::{debug, info, warn};

/// Documents shorter than this are padded by repetition.
pub const MIN_LENGTH: usize = 12;
/// Documents longer than this are truncated.
pub const MAX_LENGTH: usize = 3000;
/// Smallest corpus the clustering stage accepts.
pub const MIN_DOCUMENTS: usize = 3;

/// Cleaned, length-bounded documents for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    docs: Vec<String>,
    /// How many of `docs` are synthetic placeholders appended at the end.
    placeholders: usize,
}

impl Corpus {
    pub fn docs(&self) -> &[String] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Number of documents that came from the request. Placeholders always
    /// follow them, so these are `docs()[..real_len()]`.
    pub fn real_len(&self) -> usize {
        self.docs.len() - self.placeholders
    }

    pub fn into_docs(self) -> Vec<String> {
        self.docs
    }
}

/// Build a corpus from raw JSON values of unknown type.
pub fn clean_values(values: &[Value]) -> Corpus {
    let texts: Vec<String> = values.iter().filter_map(coerce_value).collect();
    clean_comments(&texts)
}

/// Build a corpus from raw strings.
pub fn clean_comments<S: AsRef<str>>(comments: &[S]) -> Corpus {
    info!(initial = comments.len(), "Cleaning comments");

    let mut docs = Vec::with_capacity(comments.len().max(MIN_DOCUMENTS));
    for (i, raw) in comments.iter().enumerate() {
        let raw = raw.as_ref();
        match normalize_document(raw) {
            Some(doc) => {
                debug!(
                    index = i,
                    before = raw.chars().count(),
                    after = doc.chars().count(),
                    "Normalized comment"
                );
                docs.push(doc);
            }
            None => debug!(index = i, "Skipping empty comment"),
        }
    }

    let mut placeholders = 0;
    if docs.len() < MIN_DOCUMENTS {
        warn!(
            valid = docs.len(),
            "Too few valid comments, adding placeholder documents"
        );
        while docs.len() < MIN_DOCUMENTS {
            docs.push(format!("placeholder document {}", docs.len()));
            placeholders += 1;
        }
    }

    info!(total = docs.len(), placeholders, "Finished cleaning comments");
    Corpus { docs, placeholders }
}

/// Normalize one document, or `None` when nothing usable remains.
///
/// Applying this to its own output returns the same string.
pub fn normalize_document(raw: &str) -> Option<String> {
    let text = strip_control_chars(raw);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let text = truncate_long_text(text);
    Some(pad_short_text(text.trim_end()))
}

/// Replace ASCII control characters (0x00-0x1F, 0x7F) with spaces.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect()
}

/// Pad a document shorter than MIN_LENGTH with a space and a repeated
/// prefix of itself. The padded text never ends in whitespace.
pub fn pad_short_text(text: &str) -> String {
    let len = text.chars().count();
    if len >= MIN_LENGTH || text.trim().is_empty() {
        return text.to_string();
    }

    let mut padded = String::with_capacity(MIN_LENGTH * 2);
    padded.push_str(text);
    padded.push(' ');
    let mut count = len + 1;
    for c in text.chars().cycle() {
        if count >= MIN_LENGTH && !padded.ends_with(char::is_whitespace) {
            break;
        }
        padded.push(c);
        count += 1;
    }
    padded
}

/// Cap a document at MAX_LENGTH characters.
pub fn truncate_long_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_LENGTH) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Coerce an arbitrary JSON value into text. Falsy values (null, false, 0,
/// empty string, empty array, empty object) are dropped.
fn coerce_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("True".to_string()),
        Value::Number(n) => {
            if n.as_f64() == Some(0.0) {
                None
            } else {
                Some(n.to_string())
            }
        }
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}
