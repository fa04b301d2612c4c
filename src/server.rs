use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use tracing::{info, warn};

use crate::AppState;
use crate::api::{analysis, docs};
use crate::assistant::OpenAiAssistantClient;
use crate::config::{AppConfig, PersistenceConfig, StoreProvider};
use crate::security::{Authenticator, auth_middleware};
use crate::session::SessionRelay;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, ServiceAccountKey, TokenSource};

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    config.validate()?;

    let assistant_settings = config.assistant_settings();
    info!(
        name: "config.loaded",
        base_url = %assistant_settings.base_url,
        provider = ?assistant_settings.provider,
        run_policy = ?config.assistant.run_policy,
        store = ?config.persistence.provider,
        jwt_required = config.security.jwt_required,
        "Configuration loaded"
    );
    if assistant_settings.api_key.is_none() {
        warn!("No assistant API key configured; requests will be unauthenticated");
    }

    let assistant = Arc::new(OpenAiAssistantClient::new(assistant_settings));
    let store = build_store(&config.persistence).await?;
    let relay = Arc::new(SessionRelay::new(assistant, store, config.relay_settings()));
    let auth = Arc::new(Authenticator::new(
        &config.security.jwt_secret,
        config.security.jwt_required,
    ));

    let state = AppState {
        relay,
        auth,
        config: Arc::clone(&config),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Build the configured document store provider.
pub async fn build_store(config: &PersistenceConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.provider {
        StoreProvider::Memory => {
            warn!("Using in-memory document store; session bindings will not survive restarts");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreProvider::Firestore => {
            let http = reqwest::Client::new();

            if let Some(host) = &config.emulator_host {
                let project_id = config
                    .project_id
                    .clone()
                    .context("persistence.project_id is required with the Firestore emulator")?;
                info!(name: "store.emulator", host = %host, project_id = %project_id, "Using Firestore emulator");
                return Ok(Arc::new(FirestoreStore::emulator(http, host, project_id)?));
            }

            let mut key = ServiceAccountKey::load(&config.credentials_path).await?;
            if let Some(project_id) = &config.project_id {
                key.project_id.clone_from(project_id);
            }
            let tokens = TokenSource::new(http.clone(), key)?;
            Ok(Arc::new(FirestoreStore::new(http, tokens)?))
        }
    }
}

/// Assemble the router: public routes, guarded `/analysis`, and the
/// cross-cutting layers.
pub fn build_router(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    let guarded = Router::new()
        .route(
            "/analysis",
            post(analysis::create_analysis).get(analysis::list_analysis),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(docs::open_docs))
        .route("/docs", get(docs::docs))
        .route("/health", get(docs::health))
        .merge(guarded)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => (
                            StatusCode::REQUEST_TIMEOUT,
                            Json(json!({ "detail": "Request timed out" })),
                        )
                            .into_response(),
                    }
                }
            },
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(name: "server.stopping", "Shutdown signal received");
}
