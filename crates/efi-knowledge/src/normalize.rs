//! Input normalization for codes and free-text terms

use crate::error::KnowledgeError;
use once_cell::sync::Lazy;
use regex::Regex;

/// OBD-II style code: system letter, four hex digits, optional two-digit failure type
static DTC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[PBCU][0-9A-F]{4}(-[0-9A-F]{2})?$").expect("DTC pattern is a valid regex")
});

/// Normalize one DTC code (`" p0a80"` → `"P0A80"`)
///
/// # Errors
/// `KnowledgeError::Validation` if the code is not a well-formed DTC
pub fn normalize_dtc(code: &str) -> Result<String, KnowledgeError> {
    let upper = code.trim().to_ascii_uppercase();
    if DTC_PATTERN.is_match(&upper) {
        Ok(upper)
    } else {
        Err(KnowledgeError::Validation(format!(
            "malformed DTC code: {code:?}"
        )))
    }
}

/// Normalize a list of DTC codes, dropping blanks and duplicates
///
/// # Errors
/// `KnowledgeError::Validation` on the first malformed code
pub fn normalize_dtc_codes<S: AsRef<str>>(codes: &[S]) -> Result<Vec<String>, KnowledgeError> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        if code.as_ref().trim().is_empty() {
            continue;
        }
        let normalized = normalize_dtc(code.as_ref())?;
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}

/// Lowercase, trim and collapse inner whitespace
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a list of terms, dropping blanks and duplicates
#[must_use]
pub fn normalize_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let normalized = normalize_term(term.as_ref());
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Split free text into lowercase search tokens (2+ chars)
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.chars().count() < 2 {
            continue;
        }
        let token = raw.to_lowercase();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Normalize an optional field, mapping blank to `None`
#[must_use]
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value.map(normalize_term).filter(|v| !v.is_empty())
}
