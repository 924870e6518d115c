//! Language utilities for target language handling
//!
//! Target languages are ISO 639-1 (2-letter) or ISO 639-2 (3-letter) codes,
//! optionally followed by a region subtag (`pt-BR`, `zh_TW`). They are
//! stored in canonical form so that translations of the same language share
//! one key.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn lookup_language(code: &str) -> Option<Language> {
    match code.len() {
        2 => Language::from_639_1(code),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map_or(code, |(_, t)| *t);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Split a language tag into its primary code and optional region subtag
fn split_tag(tag: &str) -> (String, Option<String>) {
    let trimmed = tag.trim();
    match trimmed.split_once(['-', '_']) {
        Some((primary, region)) => (primary.to_lowercase(), Some(region.to_uppercase())),
        None => (trimmed.to_lowercase(), None),
    }
}

fn is_valid_region(region: &str) -> bool {
    (region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()))
        || (region.len() == 3 && region.chars().all(|c| c.is_ascii_digit()))
        || (region.len() == 4 && region.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Normalize a target language tag to its canonical form.
///
/// The primary code becomes ISO 639-1 when one exists, ISO 639-2/T
/// otherwise; the region subtag is kept upper-cased.
pub fn normalize_target_language(tag: &str) -> Result<String> {
    let (primary, region) = split_tag(tag);
    let lang = lookup_language(&primary).ok_or_else(|| anyhow!("Invalid language code: {}", tag))?;

    let code = lang
        .to_639_1()
        .map_or_else(|| lang.to_639_3().to_string(), |c| c.to_string());

    match region {
        Some(region) if is_valid_region(&region) => Ok(format!("{}-{}", code, region)),
        Some(_) => Err(anyhow!("Invalid region subtag in language code: {}", tag)),
        None => Ok(code),
    }
}

/// Check if two language tags represent the same language and region
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_target_language(code1), normalize_target_language(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name of a tag, used in prompts
pub fn get_language_name(tag: &str) -> Result<String> {
    let (primary, _) = split_tag(tag);
    let lang = lookup_language(&primary)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", tag))?;

    Ok(lang.to_name().to_string())
}
