use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::images::store::ImageError;

/// Error surface of the HTTP API. Every variant renders as a JSON
/// `{"message": ...}` body; clients identify errors by message string only.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    /// 500 with the raw error text interpolated, e.g. "Login error: <cause>".
    pub fn unexpected(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Unexpected(format!("{context}: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(%status, message = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::NotAnImage | ImageError::TooLarge => ApiError::Validation(e.to_string()),
            ImageError::Io(_) => ApiError::Unexpected(format!("Error uploading image: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_message(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        v["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn validation_maps_to_400_with_message_body() {
        let resp = ApiError::Validation("Missing required fields".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(resp).await, "Missing required fields");
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let resp = ApiError::NotFound("User not found".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_message(resp).await, "User not found");
    }

    #[tokio::test]
    async fn unexpected_interpolates_cause_into_500() {
        let resp = ApiError::unexpected("Login error", "pool timed out").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_message(resp).await, "Login error: pool timed out");
    }

    #[tokio::test]
    async fn image_rejections_are_client_errors() {
        let resp = ApiError::from(ImageError::NotAnImage).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = ApiError::from(ImageError::TooLarge).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
