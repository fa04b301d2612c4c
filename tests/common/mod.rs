//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use analysis_relay::AppState;
use analysis_relay::assistant::{
    AssistantError, AssistantService, MessageList, MessageRole, RawMessage, Run, RunStatus,
    TextContent, Thread,
};
use analysis_relay::config::{
    AppConfig, AssistantConfig, PersistenceConfig, RunPolicyKind, SecurityConfig, ServerConfig,
    StoreProvider,
};
use analysis_relay::security::Authenticator;
use analysis_relay::session::{RelaySettings, SessionRelay};
use analysis_relay::store::{DocumentStore, MemoryStore, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const JWT_SECRET: &str = "integration-secret";

#[derive(Debug, Default)]
struct FakeState {
    next_thread: usize,
    next_message: usize,
    next_run: usize,
    threads: HashMap<String, Vec<RawMessage>>,
    runs: HashMap<String, Run>,
    /// Statuses handed out by successive `retrieve_run` calls.
    run_script: VecDeque<RunStatus>,
    fail_on: Option<&'static str>,
    calls: Vec<String>,
}

/// Faithful in-memory stand-in for the assistant thread API.
///
/// Runs start `queued`; each `retrieve_run` pops the next scripted status
/// (default `completed`). A run that completes appends an assistant reply
/// echoing the last user message.
#[derive(Debug, Default)]
pub struct FakeAssistant {
    state: Mutex<FakeState>,
}

impl FakeAssistant {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `operation` fail.
    pub async fn fail_on(&self, operation: &'static str) {
        self.state.lock().await.fail_on = Some(operation);
    }

    pub async fn script_run(&self, statuses: &[RunStatus]) {
        self.state.lock().await.run_script = statuses.iter().copied().collect();
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn thread_count(&self) -> usize {
        self.state.lock().await.threads.len()
    }

    async fn enter(&self, operation: &'static str, thread_id: &str) -> Result<(), AssistantError> {
        let mut state = self.state.lock().await;
        state.calls.push(if thread_id.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}:{thread_id}")
        });
        if state.fail_on == Some(operation) {
            return Err(AssistantError::Api {
                status: 500,
                message: format!("injected {operation} failure"),
            });
        }
        Ok(())
    }
}

fn not_found(thread_id: &str) -> AssistantError {
    AssistantError::Api {
        status: 404,
        message: format!("No thread found with id '{thread_id}'."),
    }
}

fn message(state: &mut FakeState, thread_id: &str, role: MessageRole, text: &str) -> RawMessage {
    state.next_message += 1;
    RawMessage {
        id: format!("msg_{}", state.next_message),
        created_at: 1_700_000_000 + state.next_message as i64,
        object: "thread.message".to_string(),
        thread_id: thread_id.to_string(),
        role,
        content: vec![TextContent::text(text)],
        assistant_id: None,
        run_id: None,
        attachments: Vec::new(),
        metadata: serde_json::json!({}),
    }
}

#[async_trait]
impl AssistantService for FakeAssistant {
    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        self.enter("create_thread", "").await?;
        let mut state = self.state.lock().await;
        state.next_thread += 1;
        let id = format!("t{}", state.next_thread);
        state.threads.insert(id.clone(), Vec::new());
        Ok(Thread {
            id,
            object: "thread".to_string(),
            created_at: 1_700_000_000,
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<RawMessage, AssistantError> {
        self.enter("create_message", thread_id).await?;
        let mut state = self.state.lock().await;
        if !state.threads.contains_key(thread_id) {
            return Err(not_found(thread_id));
        }
        let msg = message(&mut state, thread_id, role, content);
        state
            .threads
            .get_mut(thread_id)
            .expect("thread checked above")
            .push(msg.clone());
        Ok(msg)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        _instructions: Option<&str>,
    ) -> Result<Run, AssistantError> {
        self.enter("create_run", thread_id).await?;
        let mut state = self.state.lock().await;
        if !state.threads.contains_key(thread_id) {
            return Err(not_found(thread_id));
        }
        state.next_run += 1;
        let run = Run {
            id: format!("run_{}", state.next_run),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status: RunStatus::Queued,
        };
        state.runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.enter("retrieve_run", thread_id).await?;
        let mut state = self.state.lock().await;
        let status = state.run_script.pop_front().unwrap_or(RunStatus::Completed);
        let mut run = state
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| not_found(thread_id))?;

        if run.status != RunStatus::Completed && status == RunStatus::Completed {
            let last_user = state.threads[thread_id]
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .and_then(|m| m.content[0].text.as_ref())
                .map(|t| t.value.clone())
                .unwrap_or_default();
            let reply = message(
                &mut state,
                thread_id,
                MessageRole::Assistant,
                &format!("Echo: {last_user}"),
            );
            state
                .threads
                .get_mut(thread_id)
                .expect("run belongs to a thread")
                .push(reply);
        }

        run.status = status;
        state.runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<MessageList, AssistantError> {
        self.enter("list_messages", thread_id).await?;
        let state = self.state.lock().await;
        let messages = state.threads.get(thread_id).ok_or_else(|| not_found(thread_id))?;
        // Newest first, like the real API.
        Ok(MessageList {
            object: "list".to_string(),
            data: messages.iter().rev().cloned().collect(),
        })
    }
}

/// [`MemoryStore`] wrapper that counts calls and can refuse writes.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    writes: AtomicUsize,
    reads: AtomicUsize,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Bind a thread to a user without counting it as a relay write.
    pub async fn seed(&self, user_id: &str, thread_id: &str) {
        self.inner
            .set_field("users", user_id, "thread_id", thread_id)
            .await
            .expect("memory store never fails");
    }

    pub async fn bound_thread(&self, user_id: &str) -> Option<String> {
        self.inner
            .get_field("users", user_id, "thread_id")
            .await
            .expect("memory store never fails")
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn set_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "injected write failure".to_string(),
            });
        }
        self.inner.set_field(collection, document, field, value).await
    }

    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_field(collection, document, field).await
    }
}

pub fn relay(
    assistant: &Arc<FakeAssistant>,
    store: &Arc<CountingStore>,
    settings: RelaySettings,
) -> SessionRelay {
    SessionRelay::new(
        Arc::clone(assistant) as Arc<dyn AssistantService>,
        Arc::clone(store) as Arc<dyn DocumentStore>,
        settings,
    )
}

pub fn test_config(jwt_required: bool) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        },
        security: SecurityConfig {
            jwt_required,
            jwt_secret: JWT_SECRET.to_string(),
            verify_thread_owner: true,
        },
        assistant: AssistantConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            api_version: None,
            run_policy: RunPolicyKind::FireAndForget,
            poll_interval_ms: 10,
            run_timeout_secs: 5,
            page_size: 100,
        },
        persistence: PersistenceConfig {
            provider: StoreProvider::Memory,
            credentials_path: "serviceAccountKey.json".to_string(),
            project_id: None,
            emulator_host: None,
            users_collection: "users".to_string(),
            thread_field: "thread_id".to_string(),
        },
    }
}

pub fn app_state(
    assistant: &Arc<FakeAssistant>,
    store: &Arc<CountingStore>,
    jwt_required: bool,
) -> AppState {
    app_state_from(assistant, store, test_config(jwt_required))
}

pub fn app_state_from(
    assistant: &Arc<FakeAssistant>,
    store: &Arc<CountingStore>,
    config: AppConfig,
) -> AppState {
    let relay = relay(assistant, store, config.relay_settings());
    AppState {
        relay: Arc::new(relay),
        auth: Arc::new(Authenticator::new(
            &config.security.jwt_secret,
            config.security.jwt_required,
        )),
        config: Arc::new(config),
    }
}
