//! Session bootstrap and message relay.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{AnalysisRequest, AnalysisResponse, Message};
use crate::assistant::{AssistantError, AssistantService, MessageRole, Run, RunStatus};
use crate::error::RelayError;
use crate::store::DocumentStore;

/// What the relay does between starting a run and listing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPolicy {
    /// List immediately. The listing may not yet contain the run's reply.
    #[default]
    FireAndForget,
    /// Poll the run until it settles, then list.
    AwaitCompletion {
        poll_interval: Duration,
        timeout: Duration,
    },
}

/// Relay behaviour knobs.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Collection holding one document per user.
    pub users_collection: String,
    /// Field of the user document that stores the session id.
    pub thread_field: String,
    /// Require a supplied session id to be the one persisted for the user.
    pub verify_thread_owner: bool,
    pub run_policy: RunPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            users_collection: "users".to_string(),
            thread_field: "thread_id".to_string(),
            verify_thread_owner: true,
            run_policy: RunPolicy::FireAndForget,
        }
    }
}

/// Resolves a user's session and relays messages to the assistant service.
///
/// Holds no per-request state; clone the `Arc` around it freely.
#[derive(Debug)]
pub struct SessionRelay {
    assistant: Arc<dyn AssistantService>,
    store: Arc<dyn DocumentStore>,
    settings: RelaySettings,
}

impl SessionRelay {
    #[must_use]
    pub fn new(
        assistant: Arc<dyn AssistantService>,
        store: Arc<dyn DocumentStore>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            assistant,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Submit `request.content` to the user's session and return the
    /// session's full message list.
    ///
    /// Without a session id a new thread is created and bound to the user
    /// before anything is posted to it. With one, nothing is written to the
    /// store.
    pub async fn create_or_continue(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, RelayError> {
        request.validate()?;

        let thread_id = match request.existing_thread() {
            Some(id) => {
                self.authorize_thread(&request.user_id, id).await?;
                id.to_string()
            }
            None => self.bootstrap(&request.user_id).await?,
        };

        self.assistant
            .create_message(&thread_id, MessageRole::User, &request.content)
            .await?;
        info!(
            name: "relay.message.submitted",
            thread_id = %thread_id,
            "User message submitted"
        );

        let run = self
            .assistant
            .create_run(
                &thread_id,
                &request.assistant_id,
                request.instructions.as_deref(),
            )
            .await?;
        info!(
            name: "relay.run.started",
            thread_id = %thread_id,
            run_id = %run.id,
            assistant_id = %request.assistant_id,
            "Assistant run started"
        );

        self.settle(&thread_id, run).await?;
        self.fetch(&thread_id).await
    }

    /// Full message list of a session.
    ///
    /// `owner` is the authenticated caller, if any; when present and owner
    /// verification is on, the session must be the caller's.
    pub async fn list_analysis(
        &self,
        thread_id: &str,
        owner: Option<&str>,
    ) -> Result<AnalysisResponse, RelayError> {
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return Err(RelayError::InvalidRequest(
                "thread_id must not be empty".to_string(),
            ));
        }
        if let Some(owner) = owner {
            self.authorize_thread(owner, thread_id).await?;
        }
        self.fetch(thread_id).await
    }

    /// Create a thread and bind it to the user. The binding is durable
    /// before the id is handed back.
    async fn bootstrap(&self, user_id: &str) -> Result<String, RelayError> {
        let thread = self.assistant.create_thread().await?;
        info!(
            name: "relay.session.created",
            user_id,
            thread_id = %thread.id,
            "Session created"
        );

        self.store
            .set_field(
                &self.settings.users_collection,
                user_id,
                &self.settings.thread_field,
                &thread.id,
            )
            .await?;
        info!(
            name: "relay.session.persisted",
            user_id,
            thread_id = %thread.id,
            "Session bound to user"
        );

        Ok(thread.id)
    }

    async fn authorize_thread(&self, user_id: &str, thread_id: &str) -> Result<(), RelayError> {
        if !self.settings.verify_thread_owner {
            return Ok(());
        }

        let bound = self
            .store
            .get_field(
                &self.settings.users_collection,
                user_id,
                &self.settings.thread_field,
            )
            .await?;

        if bound.as_deref() == Some(thread_id) {
            Ok(())
        } else {
            warn!(
                name: "relay.session.rejected",
                user_id,
                thread_id,
                "Session does not belong to user"
            );
            Err(RelayError::Forbidden(format!(
                "thread {thread_id} does not belong to user {user_id}"
            )))
        }
    }

    async fn settle(&self, thread_id: &str, run: Run) -> Result<(), AssistantError> {
        let RunPolicy::AwaitCompletion {
            poll_interval,
            timeout,
        } = self.settings.run_policy
        else {
            return Ok(());
        };

        let run_id = run.id.clone();
        let poll = async {
            let mut run = run;
            while !run.status.is_settled() {
                tokio::time::sleep(poll_interval).await;
                run = self.assistant.retrieve_run(thread_id, &run.id).await?;
            }
            Ok::<_, AssistantError>(run)
        };

        let run = tokio::time::timeout(timeout, poll)
            .await
            .map_err(move |_elapsed| AssistantError::RunTimeout { run_id })??;

        if run.status == RunStatus::Completed {
            info!(
                name: "relay.run.completed",
                thread_id,
                run_id = %run.id,
                "Assistant run completed"
            );
            Ok(())
        } else {
            Err(AssistantError::RunFailed {
                run_id: run.id,
                status: run.status,
            })
        }
    }

    async fn fetch(&self, thread_id: &str) -> Result<AnalysisResponse, RelayError> {
        let list = self.assistant.list_messages(thread_id).await?;
        info!(
            name: "relay.messages.listed",
            thread_id,
            count = list.data.len(),
            "Messages listed"
        );

        Ok(AnalysisResponse {
            object: list.object,
            data: list.data.into_iter().map(Message::from).collect(),
        })
    }
}
