use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("Metrics are not enabled for app {app}")]
    MetricsNotConfigured { app: String },

    #[error("Metrics backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed composite key: {key:?}")]
    MalformedCompositeKey { key: String },

    #[error("Malformed store response: {0}")]
    MalformedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeasureError {
    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MeasureError::BackendUnavailable(_))
    }
}

impl From<reqwest::Error> for MeasureError {
    fn from(err: reqwest::Error) -> Self {
        MeasureError::BackendUnavailable(err.to_string())
    }
}

impl IntoResponse for MeasureError {
    fn into_response(self) -> Response {
        let status = match self {
            MeasureError::MetricsNotConfigured { .. } => StatusCode::NOT_FOUND,
            MeasureError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            MeasureError::MalformedCompositeKey { .. } => StatusCode::BAD_GATEWAY,
            MeasureError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            MeasureError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MeasureError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MeasureError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, MeasureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = MeasureError::MetricsNotConfigured { app: "foo".into() }.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = MeasureError::BackendUnavailable("timeout".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = MeasureError::InvalidRequest("bad range".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = MeasureError::MalformedResponse("truncated".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_only_backend_errors_are_transient() {
        assert!(MeasureError::BackendUnavailable("x".into()).is_transient());
        assert!(!MeasureError::MetricsNotConfigured { app: "foo".into() }.is_transient());
        assert!(!MeasureError::MalformedResponse("x".into()).is_transient());
    }
}
