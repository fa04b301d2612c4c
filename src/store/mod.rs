//! Per-user document persistence.
//!
//! The relay only needs to write and read one string field on a user's
//! document. [`DocumentStore`] is that seam; providers:
//!
//! - [`FirestoreStore`]: Google Cloud Firestore over REST
//! - [`MemoryStore`]: in-process map, for local runs and tests

pub mod credentials;
pub mod firestore;
pub mod memory;

pub use credentials::{ServiceAccountKey, TokenSource};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Error returned by a [`DocumentStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Document store error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the store.
        message: String,
    },

    /// Service-account credentials are missing or unusable.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Signing the token assertion failed.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Schemaless keyed document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Write `field = value` on `collection/document`, creating the document
    /// if needed and leaving its other fields untouched.
    async fn set_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Read a string field. Missing document or field is `None`.
    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError>;
}
