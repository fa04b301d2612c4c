//! Landing redirect, endpoint reference and health probe.

use axum::{
    Json,
    response::{Html, Redirect},
};
use serde_json::{Value, json};

const DOCS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Analysis Relay API</title>
</head>
<body>
    <h1>Analysis Relay API</h1>

    <h2>POST /analysis</h2>
    <p>Submit a message to the caller's assistant thread. Omit
    <code>thread_id</code> (or send it empty) to start a new thread, which is
    remembered for the user.</p>
    <pre>{
  "assistant_id": "asst_...",
  "thread_id": "thread_... | null",
  "content": "message text",
  "user_id": "user id",
  "instructions": "optional run instructions"
}</pre>
    <p>Returns the full message list of the thread:
    <code>{"object": "list", "data": [Message, ...]}</code>.</p>

    <h2>GET /analysis?thread_id=...</h2>
    <p>Returns the full message list of an existing thread.</p>

    <h2>Errors</h2>
    <p>Every error body is <code>{"detail": "..."}</code>. 401 missing or
    invalid bearer token, 403 thread or user mismatch, 422 invalid input,
    500 any upstream failure.</p>
</body>
</html>
"#;

/// GET / - Redirect to the API reference.
pub async fn open_docs() -> Redirect {
    Redirect::temporary("/docs")
}

/// GET /docs - Static API reference.
pub async fn docs() -> Html<&'static str> {
    Html(DOCS_HTML)
}

/// GET /health - Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
