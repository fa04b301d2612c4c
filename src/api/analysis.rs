//! `/analysis` endpoints.

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::AppState;
use crate::error::RelayError;
use crate::security::Caller;
use crate::session::{AnalysisRequest, AnalysisResponse};

/// Query string of `GET /analysis`.
#[derive(Debug, Deserialize)]
pub struct ListAnalysisQuery {
    #[serde(default)]
    pub thread_id: String,
}

/// POST /analysis - Submit a message and return the session's messages.
pub async fn create_analysis(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, RelayError> {
    tracing::info!(
        user_id = %req.user_id,
        thread_id = ?req.thread_id,
        assistant_id = %req.assistant_id,
        "Received analysis request"
    );

    if let Caller::User(ctx) = &caller {
        if ctx.user_id != req.user_id {
            warn!(
                name: "relay.user.mismatch",
                token_user = %ctx.user_id,
                token_email = ?ctx.claims.email,
                user_id = %req.user_id,
                "Request user_id differs from the bearer token"
            );
            return Err(RelayError::Forbidden(
                "user_id does not match the authenticated user".to_string(),
            ));
        }
    }

    state
        .relay
        .create_or_continue(&req)
        .await
        .map(Json)
        .inspect_err(|e| log_failure("create", e))
}

/// GET /analysis?thread_id= - Return a session's messages.
pub async fn list_analysis(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListAnalysisQuery>,
) -> Result<Json<AnalysisResponse>, RelayError> {
    state
        .relay
        .list_analysis(&query.thread_id, caller.user_id())
        .await
        .map(Json)
        .inspect_err(|e| log_failure("list", e))
}

fn log_failure(operation: &str, err: &RelayError) {
    error!(
        name: "relay.request.failed",
        operation,
        status = err.status().as_u16(),
        error = %err,
        "Analysis request failed"
    );
}
