/*!
 * Content hashing for source-text deduplication.
 *
 * A unit's identity is the SHA256 digest of its normalized text. When the
 * same text appears several times on one page, every occurrence after the
 * first is salted with its occurrence index so each one keeps its own
 * identity.
 */

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::units::NumberedUnit;

/// A numbered unit together with its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedUnit {
    /// Number of the unit in the current extraction pass
    pub number: u32,
    /// Source text
    pub text: String,
    /// Zero-based index of this text among identical texts on the page
    pub occurrence: u32,
    /// Hex-encoded digest used as the dedup key
    pub text_hash: String,
}

/// Collapse whitespace runs to a single space and trim the ends
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute the SHA256 hash of normalized text
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the hash of one occurrence of a text; occurrence 0 is the plain hash
pub fn hash_with_occurrence(text: &str, occurrence: u32) -> String {
    if occurrence == 0 {
        return hash_text(text);
    }

    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hasher.update([0u8]);
    hasher.update(occurrence.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash every unit, counting occurrences of identical texts in number order
pub fn hash_units(units: &[NumberedUnit]) -> Vec<HashedUnit> {
    let mut ordered: Vec<&NumberedUnit> = units.iter().collect();
    ordered.sort_by_key(|u| u.number);

    let mut seen: HashMap<String, u32> = HashMap::new();
    ordered
        .into_iter()
        .map(|unit| {
            let key = normalize_text(&unit.text);
            let counter = seen.entry(key).or_insert(0);
            let occurrence = *counter;
            *counter += 1;

            HashedUnit {
                number: unit.number,
                text: unit.text.clone(),
                occurrence,
                text_hash: hash_with_occurrence(&unit.text, occurrence),
            }
        })
        .collect()
}
