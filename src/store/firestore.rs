//! Cloud Firestore provider over the REST API.
//!
//! Field writes are `PATCH` requests with an `updateMask`, which upserts the
//! document and touches only the masked field.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{DocumentStore, StoreError, TokenSource};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// [`DocumentStore`] backed by Cloud Firestore (default database).
#[derive(Debug)]
pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    /// `None` talks to the emulator, which needs no token.
    auth: Option<TokenSource>,
}

impl FirestoreStore {
    /// Production Firestore, authenticated as the token source's service account.
    pub fn new(http: reqwest::Client, auth: TokenSource) -> Result<Self, StoreError> {
        let project_id = auth.project_id().to_string();
        Self::with_base_url(http, FIRESTORE_BASE_URL, project_id, Some(auth))
    }

    /// Local Firestore emulator at `host` (e.g. `127.0.0.1:8080`).
    pub fn emulator(
        http: reqwest::Client,
        host: &str,
        project_id: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::with_base_url(http, &format!("http://{host}"), project_id.into(), None)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        base_url: &str,
        project_id: String,
        auth: Option<TokenSource>,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Credentials(format!("invalid Firestore URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Credentials(format!(
                "invalid Firestore URL {base_url}"
            )));
        }
        Ok(Self {
            http,
            base_url,
            project_id,
            auth,
        })
    }

    fn document_url(&self, collection: &str, document: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
                document,
            ]);
        }
        url
    }

    async fn authorize(
        &self,
        rb: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        match &self.auth {
            Some(auth) => Ok(rb.bearer_auth(auth.token().await?)),
            None => Ok(rb),
        }
    }

    async fn error_from(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
            .unwrap_or(body);
        StoreError::Api { status, message }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn set_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let url = self.document_url(collection, document);
        let body = json!({ "fields": { field: { "stringValue": value } } });
        let rb = self
            .http
            .patch(url)
            .query(&[("updateMask.fieldPaths", field)])
            .json(&body);

        let response = self.authorize(rb).await?.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        debug!(
            name: "store.field.written",
            collection,
            document,
            field,
            "Firestore field written"
        );
        Ok(())
    }

    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        let url = self.document_url(collection, document);
        let rb = self.http.get(url).query(&[("mask.fieldPaths", field)]);

        let response = self.authorize(rb).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let doc: Value = response.json().await?;
        Ok(doc["fields"][field]["stringValue"]
            .as_str()
            .map(ToString::to_string))
    }
}
