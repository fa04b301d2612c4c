mod common;

use std::time::Duration;

use analysis_relay::assistant::{AssistantError, MessageRole, RunStatus};
use analysis_relay::error::RelayError;
use analysis_relay::session::{AnalysisRequest, AnalysisResponse, RelaySettings, RunPolicy};
use common::{CountingStore, FakeAssistant, relay};

fn request(thread_id: Option<&str>, content: &str) -> AnalysisRequest {
    AnalysisRequest {
        assistant_id: "a1".to_string(),
        thread_id: thread_id.map(ToString::to_string),
        content: content.to_string(),
        user_id: "u1".to_string(),
        instructions: None,
    }
}

fn texts(response: &AnalysisResponse) -> Vec<String> {
    response
        .data
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| c.text.as_ref().map(|t| t.value.clone()))
        .collect()
}

fn await_completion() -> RelaySettings {
    RelaySettings {
        run_policy: RunPolicy::AwaitCompletion {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        },
        ..RelaySettings::default()
    }
}

#[tokio::test]
async fn new_session_is_created_bound_and_used() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let response = relay
        .create_or_continue(&request(Some(""), "hello"))
        .await
        .unwrap();

    assert_eq!(store.writes(), 1);
    assert_eq!(store.bound_thread("u1").await.as_deref(), Some("t1"));
    assert_eq!(
        assistant.calls().await,
        vec![
            "create_thread",
            "create_message:t1",
            "create_run:t1",
            "list_messages:t1"
        ]
    );

    assert_eq!(response.object, "list");
    assert!(response.data.iter().all(|m| m.thread_id == "t1"));
    assert!(texts(&response).contains(&"hello".to_string()));
}

#[tokio::test]
async fn absent_thread_id_behaves_like_empty() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    relay.create_or_continue(&request(None, "hi")).await.unwrap();

    assert_eq!(assistant.thread_count().await, 1);
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn existing_session_is_never_written() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let first = relay
        .create_or_continue(&request(None, "first"))
        .await
        .unwrap();
    let thread_id = first.data[0].thread_id.clone();
    assert_eq!(store.writes(), 1);

    let second = relay
        .create_or_continue(&request(Some(&thread_id), "second"))
        .await
        .unwrap();

    assert_eq!(store.writes(), 1, "continuing a session must not write");
    assert_eq!(assistant.thread_count().await, 1);
    let texts = texts(&second);
    assert!(texts.contains(&"first".to_string()));
    assert!(texts.contains(&"second".to_string()));
}

#[tokio::test]
async fn listing_is_idempotent() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let created = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap();

    let once = relay.list_analysis("t1", Some("u1")).await.unwrap();
    let twice = relay.list_analysis("t1", Some("u1")).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.data, created.data);
}

#[tokio::test]
async fn failed_thread_creation_leaves_user_document_untouched() {
    let assistant = FakeAssistant::new();
    assistant.fail_on("create_thread").await;
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let err = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Assistant(_)));
    assert_eq!(err.status().as_u16(), 500);
    assert!(err.to_string().contains("injected create_thread failure"));
    assert_eq!(store.writes(), 0);
    assert_eq!(store.bound_thread("u1").await, None);
}

#[tokio::test]
async fn failed_binding_stops_before_any_message() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    store.fail_writes();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let err = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Store(_)));
    assert_eq!(err.status().as_u16(), 500);
    // The thread exists upstream but nothing was posted to it.
    assert_eq!(assistant.calls().await, vec!["create_thread"]);
}

#[tokio::test]
async fn failure_after_binding_keeps_the_binding() {
    let assistant = FakeAssistant::new();
    assistant.fail_on("create_message").await;
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let err = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap_err();

    assert_eq!(err.status().as_u16(), 500);
    assert_eq!(store.bound_thread("u1").await.as_deref(), Some("t1"));
}

#[tokio::test]
async fn foreign_thread_is_rejected_before_submission() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    store.seed("u1", "t-mine").await;
    let relay = relay(&assistant, &store, RelaySettings::default());

    let err = relay
        .create_or_continue(&request(Some("t-someone-else"), "hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Forbidden(_)));
    assert!(assistant.calls().await.is_empty());

    let err = relay
        .list_analysis("t-someone-else", Some("u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Forbidden(_)));
}

#[tokio::test]
async fn owner_check_can_be_disabled() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(
        &assistant,
        &store,
        RelaySettings {
            verify_thread_owner: false,
            ..RelaySettings::default()
        },
    );

    relay.create_or_continue(&request(None, "seed")).await.unwrap();

    let mut other = request(Some("t1"), "from another user");
    other.user_id = "u2".to_string();
    let response = relay.create_or_continue(&other).await.unwrap();

    assert_eq!(store.reads(), 0);
    assert_eq!(store.writes(), 1);
    assert!(texts(&response).contains(&"from another user".to_string()));
}

#[tokio::test]
async fn anonymous_listing_skips_owner_check() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());
    relay.create_or_continue(&request(None, "hello")).await.unwrap();
    let reads_before = store.reads();

    relay.list_analysis("t1", None).await.unwrap();

    assert_eq!(store.reads(), reads_before);
}

#[tokio::test]
async fn invalid_requests_touch_nothing() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let mut req = request(None, "   ");
    let err = relay.create_or_continue(&req).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidRequest(_)));

    req.content = "hello".to_string();
    req.assistant_id = String::new();
    let err = relay.create_or_continue(&req).await.unwrap_err();
    assert_eq!(err.to_string(), "assistant_id must not be empty");

    let err = relay.list_analysis("", None).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidRequest(_)));

    assert!(assistant.calls().await.is_empty());
    assert_eq!(store.writes() + store.reads(), 0);
}

#[tokio::test]
async fn fire_and_forget_may_list_before_the_reply() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, RelaySettings::default());

    let response = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap();

    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0].role, MessageRole::User);
    assert!(
        !assistant
            .calls()
            .await
            .iter()
            .any(|c| c.starts_with("retrieve_run"))
    );
}

#[tokio::test]
async fn await_completion_lists_the_reply() {
    let assistant = FakeAssistant::new();
    assistant
        .script_run(&[RunStatus::InProgress, RunStatus::Completed])
        .await;
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, await_completion());

    let response = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap();

    // Newest first.
    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[0].role, MessageRole::Assistant);
    assert_eq!(texts(&response)[0], "Echo: hello");

    let polls = assistant
        .calls()
        .await
        .iter()
        .filter(|c| c.starts_with("retrieve_run"))
        .count();
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn await_completion_reports_failed_runs() {
    let assistant = FakeAssistant::new();
    assistant.script_run(&[RunStatus::Failed]).await;
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, await_completion());

    let err = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelayError::Assistant(AssistantError::RunFailed {
            status: RunStatus::Failed,
            ..
        })
    ));
    assert_eq!(err.status().as_u16(), 500);
}

#[tokio::test(start_paused = true)]
async fn await_completion_gives_up_after_timeout() {
    let assistant = FakeAssistant::new();
    assistant.script_run(&[RunStatus::InProgress; 1000]).await;
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, await_completion());

    let err = relay
        .create_or_continue(&request(None, "hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelayError::Assistant(AssistantError::RunTimeout { .. })
    ));
}

#[tokio::test]
async fn scenario_new_user_then_fetch() {
    let assistant = FakeAssistant::new();
    let store = CountingStore::new();
    let relay = relay(&assistant, &store, await_completion());

    let req: AnalysisRequest = serde_json::from_value(serde_json::json!({
        "assistant_id": "a1",
        "thread_id": "",
        "content": "hello",
        "user_id": "u1",
        "instructions": null
    }))
    .unwrap();

    let posted = relay.create_or_continue(&req).await.unwrap();
    assert_eq!(store.bound_thread("u1").await.as_deref(), Some("t1"));
    assert!(texts(&posted).iter().any(|t| t.contains("hello")));

    let fetched = relay.list_analysis("t1", Some("u1")).await.unwrap();
    assert_eq!(fetched.data, posted.data);
}
