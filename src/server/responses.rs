use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::domain::ports::StoreError;
use crate::outbound::webhook::ProcessError;

/// Body returned when a pass could not run at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Top-level failure of a trigger request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Delivery store is not configured: {0}")]
    Unconfigured(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unconfigured(_)
            | ApiError::Process(ProcessError::Store(StoreError::Configuration(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Process(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
