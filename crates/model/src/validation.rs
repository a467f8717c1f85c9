//! Accumulating validation results with field-scoped messages.
//!
//! Validation never stops at the first problem: every applicable check
//! contributes, and callers surface the whole set at once.

use serde::{Deserialize, Serialize};

/// A single validation failure scoped to a field or path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Structured validation failure raised by [`ValidationResult::must_succeed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", .errors.iter().map(|e| format!("{}: {}", e.field, e.message)).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

/// Accumulator for field-scoped validation messages.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    errors: Vec<FieldError>,
}

impl ValidationResult {
    /// A result with no errors.
    pub fn ok() -> Self {
        ValidationResult::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Fold another result in, prefixing its fields (e.g. `actors.client`).
    pub fn merge(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            let field = if error.field.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{}", error.field)
            };
            self.errors.push(FieldError {
                field,
                message: error.message,
            });
        }
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Raise the accumulated errors as a [`ValidationError`], if any.
    pub fn must_succeed(&self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_succeeds() {
        let result = ValidationResult::ok();
        assert!(result.succeeded());
        assert!(result.must_succeed().is_ok());
    }

    #[test]
    fn errors_accumulate() {
        let mut result = ValidationResult::ok();
        result.add("action", "unknown action 'x'");
        result.add("actor", "unknown actor 'y'");
        assert!(result.failed());
        assert_eq!(result.errors().len(), 2);
    }

    #[test]
    fn must_succeed_raises_all_errors() {
        let mut result = ValidationResult::ok();
        result.add("a", "first");
        result.add("b", "second");
        let err = result.must_succeed().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        let text = err.to_string();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }

    #[test]
    fn merge_prefixes_fields() {
        let mut inner = ValidationResult::ok();
        inner.add("title", "required");
        let mut outer = ValidationResult::ok();
        outer.merge("actors.client", inner);
        assert_eq!(outer.errors()[0].field, "actors.client.title");
    }
}
