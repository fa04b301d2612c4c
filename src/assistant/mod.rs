//! Assistant service abstraction.
//!
//! The relay talks to a stateful, thread-based assistant API. This module
//! defines the [`AssistantService`] seam the relay depends on, the wire
//! records it exchanges, and the `OpenAI` Assistants implementation.
//!
//! # Overview
//!
//! - [`AssistantService`]: threads, messages and runs
//! - [`OpenAiAssistantClient`]: `reqwest` client for the Assistants v2 REST API
//! - [`Provider`]: URL/auth differences between `OpenAI` and Azure `OpenAI`

pub mod openai;
pub mod provider;

pub use openai::{AssistantSettings, OpenAiAssistantClient};
pub use provider::Provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by an [`AssistantService`].
#[derive(Error, Debug)]
pub enum AssistantError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Assistant API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A run reached a terminal status other than `completed`.
    #[error("Run {run_id} ended with status {status:?}")]
    RunFailed {
        /// Run identifier.
        run_id: String,
        /// Terminal status the run settled in.
        status: RunStatus,
    },

    /// A run did not settle within the configured window.
    #[error("Run {run_id} did not complete in time")]
    RunTimeout {
        /// Run identifier.
        run_id: String,
    },
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user.
    User,
    /// The assistant.
    Assistant,
}

impl MessageRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A conversation thread as issued by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: i64,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether the run will make no further progress without outside help.
    ///
    /// `requires_action` counts: the relay never submits tool outputs.
    #[must_use]
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }
}

/// A triggered execution of an assistant against a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
}

/// Text payload of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
    /// Kept absent when the service omitted it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<serde_json::Value>>,
}

/// One content item of a message. Non-text items keep their payload in
/// `extra` so they pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextValue>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TextContent {
    /// Plain text content item.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(TextValue {
                value: value.into(),
                annotations: Some(Vec::new()),
            }),
            extra: serde_json::Map::new(),
        }
    }
}

/// Message record exactly as the service returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub created_at: i64,
    pub object: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: Vec<TextContent>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One page of a message listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub object: String,
    pub data: Vec<RawMessage>,
    #[serde(default)]
    pub first_id: Option<String>,
    #[serde(default)]
    pub last_id: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Full message history of a thread, in service order.
#[derive(Debug, Clone)]
pub struct MessageList {
    /// Envelope type reported by the service (`"list"`).
    pub object: String,
    pub data: Vec<RawMessage>,
}

/// Thread-based assistant service consumed by the relay.
#[async_trait]
pub trait AssistantService: Send + Sync + std::fmt::Debug {
    /// Open a new, empty thread.
    async fn create_thread(&self) -> Result<Thread, AssistantError>;

    /// Append a message to a thread.
    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<RawMessage, AssistantError>;

    /// Start an assistant run on a thread. Returns as soon as the run is
    /// accepted; the run itself proceeds asynchronously.
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError>;

    /// Fetch the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    /// Fetch every message of a thread.
    async fn list_messages(&self, thread_id: &str) -> Result<MessageList, AssistantError>;
}
