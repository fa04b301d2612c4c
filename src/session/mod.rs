//! Conversation sessions and the relay that drives them.
//!
//! A session is an assistant thread bound to one user. The binding lives in
//! the user's document; the conversation itself lives in the assistant
//! service. [`SessionRelay`] orchestrates both.
//!
//! # Architecture
//!
//! - [`AnalysisRequest`] / [`AnalysisResponse`]: the relay's wire contract
//! - [`Message`]: a message as returned to clients
//! - [`SessionRelay`]: session bootstrap and message relay
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use analysis_relay::assistant::{AssistantSettings, OpenAiAssistantClient, Provider};
//! use analysis_relay::session::{RelaySettings, SessionRelay};
//! use analysis_relay::store::MemoryStore;
//!
//! let assistant = OpenAiAssistantClient::new(AssistantSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: None,
//!     provider: Provider::OpenAI,
//!     page_size: 100,
//! });
//! let relay = SessionRelay::new(
//!     Arc::new(assistant),
//!     Arc::new(MemoryStore::new()),
//!     RelaySettings::default(),
//! );
//! assert_eq!(relay.settings().thread_field, "thread_id");
//! ```

mod relay;

pub use relay::{RelaySettings, RunPolicy, SessionRelay};

use serde::{Deserialize, Serialize};

use crate::assistant::{MessageRole, RawMessage, TextContent};
use crate::error::RelayError;

/// Input of `POST /analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub assistant_id: String,
    /// Existing session; absent or empty starts a new one.
    #[serde(default)]
    pub thread_id: Option<String>,
    pub content: String,
    pub user_id: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl AnalysisRequest {
    /// Reject requests missing a required value.
    pub fn validate(&self) -> Result<(), RelayError> {
        for (name, value) in [
            ("assistant_id", &self.assistant_id),
            ("content", &self.content),
            ("user_id", &self.user_id),
        ] {
            if value.trim().is_empty() {
                return Err(RelayError::InvalidRequest(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// The supplied session id, if it names one.
    pub fn existing_thread(&self) -> Option<&str> {
        self.thread_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// A thread message as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub created_at: i64,
    pub object: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: Vec<TextContent>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            created_at: raw.created_at,
            object: raw.object,
            thread_id: raw.thread_id,
            role: raw.role,
            content: raw.content,
        }
    }
}

/// Full message list of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub object: String,
    pub data: Vec<Message>,
}
