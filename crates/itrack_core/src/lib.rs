pub mod access;
pub mod analytics;
pub mod audit;
pub mod auth;
pub mod badge;
pub mod db;
pub mod demo;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod normalize;
pub mod profiles;
pub mod repo;
pub mod search;
pub mod service;
pub mod session;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::error::{AppError, ErrorCategory};

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("DB_TEST", "db failed").with_retryable(false);
        assert_eq!(err.code, "DB_TEST");
        assert_eq!(err.message, "db failed");
        assert!(!err.retryable);
        assert_eq!(err.category(), ErrorCategory::BackendUnavailable);
    }
}
