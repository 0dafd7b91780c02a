//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use waypoint_core::application::RunError;
use waypoint_types::error::FailureKind;

use crate::http::response::{ApiErrorDetail, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// A run, inspection or pointer operation failed.
    Run(RunError),
    /// The request itself is malformed (bad payload, bad body).
    Validation(String),
}

impl From<RunError> for AppError {
    fn from(e: RunError) -> Self {
        AppError::Run(e)
    }
}

/// Status code for a failure kind.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::BadRequest => StatusCode::BAD_REQUEST,
        FailureKind::Misconfiguration => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, ApiErrorDetail) {
        match self {
            AppError::Run(RunError::Action { action_id, source }) => {
                let mut details = json!({ "action_id": action_id });
                if let Some(diagnostic) = &source.diagnostic {
                    details["diagnostic"] = diagnostic.clone();
                }
                (
                    status_for(source.kind),
                    ApiErrorDetail {
                        code: source.kind.as_str().to_string(),
                        message: source.message.clone(),
                        details: Some(details),
                    },
                )
            }
            AppError::Run(e @ RunError::UnknownPointer(id)) => (
                status_for(e.kind()),
                ApiErrorDetail {
                    code: "UNKNOWN_ACTION".to_string(),
                    message: e.to_string(),
                    details: Some(json!({ "action_id": id })),
                },
            ),
            AppError::Run(e @ RunError::Storage(_)) => {
                tracing::error!(error = %e, "storage failure while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorDetail {
                        code: "INTERNAL_ERROR".to_string(),
                        message: e.to_string(),
                        details: None,
                    },
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.parts();
        let body = ApiResponse::error(detail, Uuid::now_v7().to_string());
        let body = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
