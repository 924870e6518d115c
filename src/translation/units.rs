/*!
 * Numbered translation units.
 *
 * A numbered unit is one translatable fragment of a page with the ordinal
 * assigned during extraction. Number 0 is always the page title.
 */

use serde::{Deserialize, Serialize};

/// Number reserved for the document title
pub const TITLE_NUMBER: u32 = 0;

/// One translatable fragment of source content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedUnit {
    /// Ordinal assigned during extraction
    pub number: u32,
    /// Source text, never empty
    pub text: String,
}

impl NumberedUnit {
    /// Create a new numbered unit
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Size of the unit as counted against the chunk budget
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether this unit carries the document title
    pub fn is_title(&self) -> bool {
        self.number == TITLE_NUMBER
    }
}

/// A translated fragment as returned by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedUnit {
    /// Number of the source unit this translation belongs to
    pub number: u32,
    /// Translated text
    pub text: String,
}

impl TranslatedUnit {
    /// Create a new translated unit
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Make sure the title is present as unit 0 and the sequence is ordered by number.
///
/// Units with blank text are dropped and duplicate numbers keep their first occurrence.
pub fn normalize_units(title: &str, units: Vec<NumberedUnit>) -> Vec<NumberedUnit> {
    let mut normalized: Vec<NumberedUnit> = Vec::with_capacity(units.len() + 1);
    let title = title.trim();
    let has_title = units.iter().any(|u| u.is_title() && !u.text.trim().is_empty());
    if !has_title && !title.is_empty() {
        normalized.push(NumberedUnit::new(TITLE_NUMBER, title));
    }

    for unit in units {
        if unit.text.trim().is_empty() {
            continue;
        }
        if normalized.iter().any(|u| u.number == unit.number) {
            continue;
        }
        normalized.push(unit);
    }

    normalized.sort_by_key(|u| u.number);
    normalized
}
