//! Error types for CRM Service
//!
//! Every failure a handler can produce is an `AppError`. Authentication and
//! internal failures collapse to generic messages on the wire; the full
//! detail only goes to the server log.
use std::collections::BTreeMap;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::db::StoreError;

/// Result type for crm-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("identity assertion has no email")]
    MissingEmail,

    #[error("no active invitation for this email")]
    NoInvitation,

    #[error("account deactivated")]
    AccountDeactivated,

    #[error("an unused invitation already exists for this email")]
    DuplicateInvitation,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationErrors),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("identity provider error: {0}")]
    OAuthProvider(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Login-time rejections. These are never distinguished to the caller.
    pub fn is_login_rejection(&self) -> bool {
        matches!(
            self,
            AppError::MissingEmail | AppError::NoInvitation | AppError::AccountDeactivated
        )
    }

    /// Errors whose detail must stay server-side.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::OAuthProvider(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }
}

/// Flatten validator output into `{field: [message, ...]}`.
pub fn field_errors(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated
            | AppError::MissingEmail
            | AppError::NoInvitation
            | AppError::AccountDeactivated => StatusCode::UNAUTHORIZED,
            AppError::DuplicateInvitation | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidArgument(_) | AppError::ValidationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::OAuthProvider(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::Unauthenticated => json!({ "message": "Authentication required" }),
            AppError::MissingEmail | AppError::NoInvitation | AppError::AccountDeactivated => {
                json!({ "message": "Authentication failed" })
            }
            AppError::ValidationFailed(errors) => json!({
                "message": "Validation failed",
                "errors": field_errors(errors),
            }),
            err if err.is_internal() => {
                tracing::error!(error = %err, "Request failed with internal error");
                json!({ "message": "Internal server error" })
            }
            other => json!({ "message": other.to_string() }),
        };

        HttpResponse::build(status).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::NotFound => AppError::NotFound("record"),
            StoreError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::OAuthProvider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email)]
        email: String,
        #[validate(length(min = 1, message = "must not be empty"))]
        name: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NoInvitation.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::DuplicateInvitation.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("customer").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidArgument("limit".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_login_rejections_are_not_distinguished() {
        assert!(AppError::NoInvitation.is_login_rejection());
        assert!(AppError::AccountDeactivated.is_login_rejection());
        assert!(AppError::MissingEmail.is_login_rejection());
        assert!(!AppError::Unauthenticated.is_login_rejection());
    }

    #[test]
    fn test_field_errors_lists_each_field() {
        let probe = Probe {
            email: "not-an-email".to_string(),
            name: String::new(),
        };
        let errors = probe.validate().unwrap_err();
        let fields = field_errors(&errors);

        assert!(fields.contains_key("email"));
        assert_eq!(fields["name"], vec!["must not be empty".to_string()]);
    }

    #[test]
    fn test_store_error_conversion() {
        let err: AppError = StoreError::Conflict("customers_email_key".into()).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = StoreError::Database("connection reset".into()).into();
        assert!(err.is_internal());
    }
}
