//! Analysis Relay
//!
//! A small HTTP relay that forwards user messages to a thread-based
//! assistant API and remembers each user's conversation thread in a
//! document store.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server (`POST /analysis`, `GET /analysis`)
//! - **Session Relay**: session bootstrap and create-message / run / list chain
//! - **Assistant**: `OpenAI` Assistants v2 client behind a trait
//! - **Store**: Firestore (or in-memory) user documents behind a trait
//!
//! # Modules
//!
//! - [`api`]: HTTP handlers
//! - [`assistant`]: assistant service trait and `OpenAI` client
//! - [`session`]: request/response types and the relay
//! - [`store`]: document store trait and providers
//! - [`security`]: bearer-token authentication

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod security;
pub mod server;
pub mod session;
pub mod store;

use crate::config::AppConfig;

use security::Authenticator;
use session::SessionRelay;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Session relay with its injected collaborators.
    pub relay: Arc<SessionRelay>,
    /// Bearer-token verifier.
    pub auth: Arc<Authenticator>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
