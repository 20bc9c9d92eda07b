use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::report::{ExportError, InvalidMonth, SummaryError};
use crate::store::StoreError;

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "already checked in")]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error(transparent)]
    Month(#[from] InvalidMonth),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// What the caller sees. Store and internal failures are not echoed.
    fn public_message(&self) -> String {
        match self {
            Self::Store(StoreError::DuplicateSuccess { .. }) => "already checked in".into(),
            Self::Store(_) => "attendance records are unavailable, please try again".into(),
            Self::Export(ExportError::Render { .. }) => "export failed, please try again".into(),
            Self::Summary(SummaryError::Http(_) | SummaryError::Status { .. } | SummaryError::UnexpectedResponse) => {
                "summary generation failed, please try again".into()
            }
            Self::Internal(_) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Month(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(StoreError::DuplicateSuccess { .. }) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Export(ExportError::NothingToExport) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Export(ExportError::Render { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Summary(SummaryError::NothingToSummarize) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Summary(SummaryError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Summary(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }
        HttpResponse::build(status).json(ErrorBody {
            message: self.public_message(),
        })
    }
}
