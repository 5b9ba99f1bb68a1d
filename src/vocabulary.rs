use serde::{Deserialize, Serialize};

use crate::error::VocabularyParseError;

pub const FIELD_SEPARATOR: char = '|';

/// One glossary row. Pronunciation and part of speech are empty for multi-word phrases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub term: String,
    pub pronunciation: String,
    pub part_of_speech: String,
    pub translation: String,
}

impl VocabularyEntry {
    pub fn new(
        term: impl Into<String>,
        pronunciation: impl Into<String>,
        part_of_speech: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            pronunciation: pronunciation.into(),
            part_of_speech: part_of_speech.into(),
            translation: translation.into(),
        }
    }

    /// Fields in table column order.
    #[must_use]
    pub fn cells(&self) -> [&str; 4] {
        [
            self.term.as_str(),
            self.pronunciation.as_str(),
            self.part_of_speech.as_str(),
            self.translation.as_str(),
        ]
    }
}

/// Parses `term | pronunciation | part-of-speech | translation` lines.
///
/// The whole response is trimmed first; an empty response yields no entries. Every remaining
/// line must have exactly four fields, otherwise the first offending line is reported.
pub fn parse_vocabulary(response: &str) -> Result<Vec<VocabularyEntry>, VocabularyParseError> {
    let body = response.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
        match fields.as_slice() {
            [term, pronunciation, pos, translation] => {
                entries.push(VocabularyEntry::new(*term, *pronunciation, *pos, *translation));
            }
            _ => {
                return Err(VocabularyParseError {
                    line_number: idx + 1,
                    line: line.to_string(),
                    fields: fields.len(),
                })
            }
        }
    }
    Ok(entries)
}
