//! Plain-text notes format.
//!
//! Each record is `title\nbody\n` followed by a line of twenty hyphens.
//! Nothing is escaped: a title holding a newline, or a body holding the
//! separator line, will not survive a round trip. `fragile_titles` reports
//! such notes without changing the format.

use std::fmt::Write as _;

use thiserror::Error;

use crate::store::NoteStore;

pub const SEPARATOR: &str = "--------------------";

const EXCERPT_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("record {index} has no line break between title and body: {excerpt:?}")]
    MalformedRecord { index: usize, excerpt: String },
}

pub fn encode(store: &NoteStore) -> String {
    let mut out = String::new();
    for (title, body) in store {
        push_record(&mut out, title, body);
    }
    out
}

fn push_record(out: &mut String, title: &str, body: &str) {
    let _ = write!(out, "{title}\n{body}\n{SEPARATOR}\n");
}

/// Parses a notes file into a fresh store.
///
/// Empty segments are skipped. Duplicate titles overwrite earlier ones in
/// place, so the last body wins.
pub fn decode(text: &str) -> Result<NoteStore, CodecError> {
    let delimiter = format!("\n{SEPARATOR}\n");
    let mut store = NoteStore::new();
    for (index, segment) in text.split(delimiter.as_str()).enumerate() {
        if segment.is_empty() {
            continue;
        }
        let Some((title, body)) = segment.split_once('\n') else {
            return Err(CodecError::MalformedRecord {
                index,
                excerpt: segment.chars().take(EXCERPT_CHARS).collect(),
            });
        };
        store.insert(title, body);
    }
    Ok(store)
}

/// Titles whose record would decode differently from what was encoded.
pub fn fragile_titles(store: &NoteStore) -> Vec<String> {
    let mut fragile = Vec::new();
    let mut record = String::new();
    for (title, body) in store {
        record.clear();
        push_record(&mut record, title, body);
        let intact = match decode(&record) {
            Ok(decoded) => {
                decoded.len() == 1 && decoded.get(title).map(|b| b == body).unwrap_or(false)
            }
            Err(_) => false,
        };
        if !intact {
            fragile.push(title.to_string());
        }
    }
    fragile
}
