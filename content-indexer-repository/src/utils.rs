//! Utility functions for the content indexer repository.

use crate::errors::SearchEngineError;

/// Characters OpenSearch refuses in index and alias names.
const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Longest index name the engine accepts, in bytes.
const MAX_INDEX_NAME_BYTES: usize = 255;

/// Validate a physical index or alias name.
///
/// Names must be non-empty, lowercase, at most 255 bytes, must not start with
/// `-`, `_` or `+`, must not be `.` or `..`, and must not contain any of
/// `\ / * ? " < > | , # :` or spaces.
///
/// # Example
///
/// ```
/// use content_indexer_repository::validate_index_name;
///
/// assert!(validate_index_name("articles_v3").is_ok());
/// assert!(validate_index_name("Articles").is_err());
/// ```
pub fn validate_index_name(name: &str) -> Result<(), SearchEngineError> {
    if name.is_empty() {
        return Err(SearchEngineError::validation("Index name is required"));
    }
    if name.len() > MAX_INDEX_NAME_BYTES {
        return Err(SearchEngineError::validation(format!(
            "Index name '{}' is longer than {} bytes",
            name, MAX_INDEX_NAME_BYTES
        )));
    }
    if name == "." || name == ".." {
        return Err(SearchEngineError::validation(format!(
            "Index name '{}' is reserved",
            name
        )));
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(SearchEngineError::validation(format!(
            "Index name '{}' must not start with '-', '_' or '+'",
            name
        )));
    }
    if name.chars().any(|c| c.is_uppercase()) {
        return Err(SearchEngineError::validation(format!(
            "Index name '{}' must be lowercase",
            name
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(SearchEngineError::validation(format!(
            "Index name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Physical index name for one generation of an alias.
///
/// Generations are distinguished by a `_v{version}` suffix, so the alias
/// `articles` is backed over time by `articles_v1`, `articles_v2`, and so on.
pub fn versioned_index_name(alias: &str, version: u64) -> String {
    format!("{}_v{}", alias, version)
}

/// Validate a document identity.
pub fn validate_object_id(object_id: &str) -> Result<(), SearchEngineError> {
    if object_id.trim().is_empty() {
        return Err(SearchEngineError::validation("object_id is required"));
    }
    Ok(())
}
