use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use journal_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
}

/// Failures of the category store itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The title uniqueness constraint rejected an insert.
    #[error("category title already exists: {0}")]
    DuplicateTitle(String),

    #[error("invalid category: {0}")]
    Invalid(String),

    #[error("corrupt category record {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error(transparent)]
    Common(#[from] CommonError),
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier unreachable: {0}")]
    Unavailable(String),

    #[error("no content received from classifier")]
    EmptyResponse,
}

/// Rejections of the classifier's raw output.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("classifier returned invalid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("classifier output does not match the verdict schema: {reason}")]
    SchemaViolation { reason: String, raw: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("category id missing for existing category")]
    MissingCategoryReference,

    #[error("category title {title:?} violated uniqueness twice; store is inconsistent")]
    StoreInconsistent { title: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the HTTP layer can answer with besides success.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    RateLimited(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Classifier(_)
            | ApiError::Validation(_)
            | ApiError::Resolution(_)
            | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "categorization failed");
            let body = format!("Failed to categorize entry: {self}");
            return (status, body).into_response();
        }
        warn!(status = status.as_u16(), error = %self, "request rejected");
        (status, self.to_string()).into_response()
    }
}
