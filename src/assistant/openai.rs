//! `OpenAI` Assistants v2 REST client.
//!
//! Implements [`AssistantService`] over `/threads`, `/threads/{id}/messages`
//! and `/threads/{id}/runs`.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use super::{
    AssistantError, AssistantService, MessageList, MessagePage, MessageRole, Provider, RawMessage,
    Run, Thread,
};

/// Beta header required by the thread endpoints.
const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// Connection settings for the assistant API.
#[derive(Clone)]
pub struct AssistantSettings {
    /// Base URL (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// API key; requests go out unauthenticated when absent.
    pub api_key: Option<String>,
    /// Provider type (detected from `base_url`).
    pub provider: Provider,
    /// Page size used when walking a thread's messages.
    pub page_size: u32,
}

impl std::fmt::Debug for AssistantSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Client for the `OpenAI` Assistants thread API.
#[derive(Clone)]
pub struct OpenAiAssistantClient {
    http: reqwest::Client,
    settings: AssistantSettings,
}

impl std::fmt::Debug for OpenAiAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl OpenAiAssistantClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(settings: AssistantSettings) -> Self {
        Self::with_client(settings, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    #[must_use]
    pub fn with_client(settings: AssistantSettings, http: reqwest::Client) -> Self {
        Self { http, settings }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = self
            .settings
            .provider
            .build_url(&self.settings.base_url, path);
        let mut rb = self
            .http
            .request(method, url)
            .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1);

        if let Some(key) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", key)
            } else {
                rb.bearer_auth(key)
            };
        }
        rb
    }

    async fn send<T: DeserializeOwned>(rb: reqwest::RequestBuilder) -> Result<T, AssistantError> {
        let response = rb.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            Ok(serde_json::from_slice(&body)?)
        } else {
            Err(AssistantError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            })
        }
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

#[async_trait]
impl AssistantService for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        Self::send(self.request(Method::POST, "/threads").json(&json!({}))).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<RawMessage, AssistantError> {
        let body = json!({ "role": role.as_str(), "content": content });
        let path = format!("/threads/{thread_id}/messages");
        Self::send(self.request(Method::POST, &path).json(&body)).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        let mut body = json!({ "assistant_id": assistant_id });
        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }
        let path = format!("/threads/{thread_id}/runs");
        Self::send(self.request(Method::POST, &path).json(&body)).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let path = format!("/threads/{thread_id}/runs/{run_id}");
        Self::send(self.request(Method::GET, &path)).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<MessageList, AssistantError> {
        let path = format!("/threads/{thread_id}/messages");
        let limit = self.settings.page_size.to_string();
        let mut after: Option<String> = None;
        let mut data = Vec::new();

        let object = loop {
            let mut rb = self
                .request(Method::GET, &path)
                .query(&[("limit", limit.as_str())]);
            if let Some(cursor) = &after {
                rb = rb.query(&[("after", cursor.as_str())]);
            }

            let page: MessagePage = Self::send(rb).await?;
            data.extend(page.data);

            match page.last_id {
                Some(last) if page.has_more && after.as_deref() != Some(last.as_str()) => {
                    after = Some(last);
                }
                Some(last) if page.has_more => {
                    warn!(
                        name: "assistant.messages.cursor_stalled",
                        thread_id,
                        cursor = %last,
                        "Message listing cursor did not advance; stopping"
                    );
                    break page.object;
                }
                _ => break page.object,
            }
        };

        Ok(MessageList { object, data })
    }
}
