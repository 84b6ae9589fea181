use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::admin::AdminServiceError;
use super::auth::{AuthError, OtpError};
use super::loans::LoanServiceError;
use super::profile::ProfileError;
use super::repository::RepositoryError;
use super::risk::RiskServiceError;

const INTERNAL: &str = "Internal server error";

/// HTTP failure rendered as `{"message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        error!(error = %err, "repository failure");
        Self::internal()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailRequired
            | AuthError::MissingFields
            | AuthError::UserExists
            | AuthError::InvalidCredentials
            | AuthError::Otp(OtpError::NotRequested | OtpError::Expired | OtpError::Invalid) => {
                Self::bad_request(err.to_string())
            }
            AuthError::Otp(OtpError::TooManyAttempts) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string())
            }
            AuthError::UserNotFound => Self::not_found(err.to_string()),
            AuthError::Mail(mail) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, mail.to_string()),
            AuthError::Repository(repository) => repository.into(),
            AuthError::Password(_) | AuthError::Token(_) => {
                error!(error = %err, "credential processing failed");
                Self::internal()
            }
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => Self::not_found(err.to_string()),
            ProfileError::Repository(repository) => repository.into(),
        }
    }
}

impl From<LoanServiceError> for ApiError {
    fn from(err: LoanServiceError) -> Self {
        match err {
            LoanServiceError::InvalidSubmission => Self::bad_request(err.to_string()),
            LoanServiceError::NotFound => Self::not_found(err.to_string()),
            LoanServiceError::Prediction(ref cause) => {
                error!(error = %cause, "prediction forwarding failed");
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            LoanServiceError::Repository(repository) => repository.into(),
        }
    }
}

impl From<RiskServiceError> for ApiError {
    fn from(err: RiskServiceError) -> Self {
        match err {
            RiskServiceError::NotFound => Self::not_found(err.to_string()),
            RiskServiceError::NoPredictionData => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            RiskServiceError::Prediction(ref cause) => {
                error!(error = %cause, "risk analysis call failed");
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            RiskServiceError::Repository(repository) => repository.into(),
        }
    }
}

impl From<AdminServiceError> for ApiError {
    fn from(err: AdminServiceError) -> Self {
        match err {
            AdminServiceError::InvalidStatus => Self::bad_request(err.to_string()),
            AdminServiceError::NotFound => Self::not_found(err.to_string()),
            AdminServiceError::Repository(repository) => repository.into(),
        }
    }
}
