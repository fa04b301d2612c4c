//! Error types for the relay boundary.
//!
//! Collaborator clients report their own error types ([`AssistantError`],
//! [`StoreError`]); the relay folds them into [`RelayError`], which is the
//! only error the HTTP layer ever renders.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::assistant::AssistantError;
use crate::store::StoreError;

/// Error surfaced by relay operations and HTTP handlers.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Any failure talking to the assistant service.
    #[error(transparent)]
    Assistant(#[from] AssistantError),

    /// Any failure talking to the document store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Request failed validation before any collaborator was contacted.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or invalid bearer token.
    #[error("Not authenticated")]
    Unauthorized,

    /// Caller is authenticated but may not act on the target resource.
    #[error("{0}")]
    Forbidden(String),
}

impl RelayError {
    /// HTTP status this error maps to.
    ///
    /// Every collaborator failure collapses into a plain 500, whatever step
    /// of the relay chain produced it.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Assistant(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "detail": self.to_string() }));
        let mut response = (status, body).into_response();
        if matches!(self, Self::Unauthorized) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
