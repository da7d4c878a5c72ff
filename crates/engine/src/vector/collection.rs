//! Collection name validation
//!
//! The name becomes a file stem (`<collection>.tread`) and a key in
//! external services, so path separators and control bytes are refused.

use tread_core::{TreadError, TreadResult};

/// Longest accepted collection name, in bytes
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Validate a collection name
pub fn validate_collection_name(name: &str) -> TreadResult<()> {
    let reject = |reason: &str| {
        Err(TreadError::Config(format!(
            "invalid collection name '{}': {}",
            name, reason
        )))
    };

    if name.is_empty() {
        return reject("cannot be empty");
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return reject("too long");
    }
    if name.contains('/') || name.contains('\\') {
        return reject("cannot contain path separators");
    }
    if name.chars().any(|c| c.is_control()) {
        return reject("cannot contain control characters");
    }
    if name.starts_with('.') || name.starts_with('_') {
        return reject("names starting with '.' or '_' are reserved");
    }
    Ok(())
}
