//! Internal helpers for input normalization and query building.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every command trims and checks values the same way.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Fresh opaque id (32 lowercase hex chars, never contains `|`).
pub(crate) fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Trim `value` and reject it when empty.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim `value`, mapping blank strings to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Upper-cased, trimmed currency code.
pub(crate) fn normalize_currency(value: &str) -> ResultEngine<String> {
    let code = value.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(EngineError::InvalidInput(
            "currency must not be empty".to_string(),
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::InvalidInput(format!(
            "invalid currency: {code}"
        )));
    }
    Ok(code)
}

/// Escape `value` so it matches literally inside a `LIKE` pattern using `\`
/// as escape character.
pub(crate) fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
