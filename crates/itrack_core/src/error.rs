use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across backend layers and exposed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

/// Coarse error taxonomy derived from the `code` prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Forbidden,
    NotFound,
    Transition,
    Unauthenticated,
    BackendUnavailable,
    Internal,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_FAILED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN_SECTOR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn transition(message: impl Into<String>) -> Self {
        Self::new("TRANSITION_REJECTED", message)
    }

    /// Store failure. The store is remote in spirit, so callers may re-submit.
    pub fn db(code: &str, message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(code, message)
            .with_details(err.to_string())
            .with_retryable(true)
    }

    pub fn category(&self) -> ErrorCategory {
        let code = self.code.as_str();
        if code.starts_with("VALIDATION_") {
            ErrorCategory::Validation
        } else if code.starts_with("FORBIDDEN") {
            ErrorCategory::Forbidden
        } else if code.starts_with("NOT_FOUND") {
            ErrorCategory::NotFound
        } else if code.starts_with("TRANSITION_") {
            ErrorCategory::Transition
        } else if code.starts_with("AUTH_") {
            ErrorCategory::Unauthenticated
        } else if code.starts_with("DB_") {
            ErrorCategory::BackendUnavailable
        } else {
            ErrorCategory::Internal
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_code_prefix() {
        assert_eq!(
            AppError::validation("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(AppError::forbidden("x").category(), ErrorCategory::Forbidden);
        assert_eq!(AppError::not_found("x").category(), ErrorCategory::NotFound);
        assert_eq!(
            AppError::transition("x").category(),
            ErrorCategory::Transition
        );
        assert_eq!(
            AppError::new("AUTH_INVALID_CREDENTIALS", "x").category(),
            ErrorCategory::Unauthenticated
        );
        let db = AppError::db("DB_QUERY_FAILED", "x", "disk I/O error");
        assert_eq!(db.category(), ErrorCategory::BackendUnavailable);
        assert!(db.retryable);
        assert_eq!(db.details.as_deref(), Some("disk I/O error"));
        // Only the NOT_FOUND prefix means a missing entity.
        assert_eq!(
            AppError::new("DB_NOT_FOUND", "x").category(),
            ErrorCategory::BackendUnavailable
        );
    }
}
