//! Query validation
//!
//! Independent of extraction: callers can screen input before doing
//! anything else with it.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tread_core::TreadError;

/// Minimum trimmed length, in characters
pub const MIN_QUERY_CHARS: usize = 2;

/// Maximum raw length, in characters
pub const MAX_QUERY_CHARS: usize = 500;

static MALICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<script.*?>",
        r"(?i)javascript:",
        r"(?i)\bon\w+\s*=",
        r"(?i)eval\s*\(",
        r"(?i)exec\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("built-in pattern must compile"))
    .collect()
});

/// Why a query was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryRejection {
    #[error("query too short")]
    TooShort,
    #[error("query too long ({chars} characters, max {max})", max = MAX_QUERY_CHARS)]
    TooLong { chars: usize },
    #[error("query contains potentially malicious content")]
    Malicious,
}

impl From<QueryRejection> for TreadError {
    fn from(rejection: QueryRejection) -> Self {
        TreadError::validation(rejection.to_string())
    }
}

/// Accept or refuse a raw query
pub fn validate_query(text: &str) -> Result<(), QueryRejection> {
    if text.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(QueryRejection::TooShort);
    }
    let chars = text.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(QueryRejection::TooLong { chars });
    }
    if MALICIOUS_PATTERNS.iter().any(|p| p.is_match(text)) {
        return Err(QueryRejection::Malicious);
    }
    Ok(())
}
