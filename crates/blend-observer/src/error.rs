//! Error types for the HTTP API.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blend_core::BlendError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The submitted tables failed validation.
    #[error("invalid dataset: {} issue(s)", .0.len())]
    InvalidDataset(Vec<String>),

    /// The run or search itself failed.
    #[error(transparent)]
    Blend(#[from] BlendError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidDataset(_)
            | Self::Blend(BlendError::UndefinedBlend | BlendError::SearchExhausted { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Blend(BlendError::Configuration { .. }) => StatusCode::BAD_REQUEST,
            Self::Blend(BlendError::Computation { .. }) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        if let (Self::InvalidDataset(issues), Some(map)) = (&self, body.as_object_mut()) {
            map.insert("errors".to_owned(), serde_json::json!(issues));
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_errors_map_by_kind() {
        let cases = [
            (BlendError::configuration("bad"), StatusCode::BAD_REQUEST),
            (BlendError::computation("nan"), StatusCode::INTERNAL_SERVER_ERROR),
            (BlendError::UndefinedBlend, StatusCode::UNPROCESSABLE_ENTITY),
            (
                BlendError::SearchExhausted { evaluations: 3 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ObserverError::from(err).status(), status);
        }
    }

    #[test]
    fn invalid_dataset_is_unprocessable() {
        let err = ObserverError::InvalidDataset(vec!["silos table is empty".to_owned()]);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "invalid dataset: 1 issue(s)");
    }
}
