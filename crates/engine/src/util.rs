//! Internal helpers for template validation.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so creates and edits enforce the same invariants.

use crate::{EngineError, ResultEngine};

pub(crate) fn normalize_category(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(
            "category must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
