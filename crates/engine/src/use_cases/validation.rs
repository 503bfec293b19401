//! Common validation helpers for use cases.
//!
//! Request input is checked here before any row is read.

use std::fmt::Display;
use std::str::FromStr;

use herotycoon_domain::InvariantViolation;

use crate::infrastructure::ports::RepoError;

/// Longest accepted display name (worlds, guilds, heroes).
pub const MAX_NAME_LENGTH: usize = 64;
/// Longest accepted action kind or policy flag.
pub const MAX_KEY_LENGTH: usize = 32;

/// Validation error type.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field_name} cannot be empty")]
    Empty { field_name: &'static str },

    #[error("{field_name} exceeds maximum length of {max}")]
    TooLong { field_name: &'static str, max: usize },

    #[error("{field_name} is invalid: {reason}")]
    Invalid { field_name: &'static str, reason: String },
}

impl ValidationError {
    pub fn invalid(field_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field_name,
            reason: reason.into(),
        }
    }
}

/// Reject a loaded row whose entity invariants do not hold.
///
/// Nothing is resolved against a corrupt snapshot, so it is never written back.
pub fn require_intact(
    entity_type: &'static str,
    id: impl Display,
    check: Result<(), InvariantViolation>,
) -> Result<(), RepoError> {
    check.map_err(|violation| {
        tracing::error!(entity = entity_type, id = %id, reason = %violation, "Stored snapshot is corrupt");
        RepoError::corrupt(entity_type, id, violation)
    })
}

/// Validate a string is non-empty after trimming.
pub fn require_non_empty(value: &str, field_name: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field_name });
    }
    Ok(())
}

/// Validate a string doesn't exceed max length (in characters, after trimming).
pub fn require_max_length(
    value: &str,
    max: usize,
    field_name: &'static str,
) -> Result<(), ValidationError> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong { field_name, max });
    }
    Ok(())
}

/// Validate an optional string is non-empty if present.
pub fn require_non_empty_if_present(
    value: &Option<String>,
    field_name: &'static str,
) -> Result<(), ValidationError> {
    if let Some(v) = value {
        require_non_empty(v, field_name)?;
    }
    Ok(())
}

/// Non-empty, bounded, trimmed.
pub fn require_name(value: &str, field_name: &'static str) -> Result<String, ValidationError> {
    require_non_empty(value, field_name)?;
    require_max_length(value, MAX_NAME_LENGTH, field_name)?;
    Ok(value.trim().to_string())
}

/// Non-empty, bounded, lowercase identifier (`train`, `no_questing`).
pub fn require_key(value: &str, field_name: &'static str) -> Result<String, ValidationError> {
    require_non_empty(value, field_name)?;
    require_max_length(value, MAX_KEY_LENGTH, field_name)?;
    let key = value.trim().to_ascii_lowercase();
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::invalid(
            field_name,
            "only letters, digits, '_' and '-' are allowed",
        ));
    }
    Ok(key)
}

/// Parse a value with `FromStr`, reporting the parse failure against `field_name`.
pub fn require_parsed<T>(value: &str, field_name: &'static str) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    require_non_empty(value, field_name)?;
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ValidationError::invalid(field_name, e.to_string()))
}
