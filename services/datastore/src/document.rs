//! Versioned documents and the store interface

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use types::errors::StoreError;
use uuid::Uuid;

/// A stored document with its optimistic-locking version
///
/// The version is owned by the store and bumped on every successful write;
/// payloads never carry their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub value: serde_json::Value,
    pub version: u64,
    /// Unix nanoseconds of the last write
    pub updated_at: i64,
}

impl Document {
    /// Deserialize the payload into a domain type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.value.clone()).map_err(|e| StoreError::Serde(e.to_string()))
    }
}

/// Encode a domain value into a document payload.
pub fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serde(e.to_string()))
}

/// Generic CRUD plus change subscription over a document store
///
/// `compare_and_swap` is the single update primitive: callers read a
/// document, transform the decoded payload, and write back against the
/// version they read. Losing the race returns `VersionConflict` so the
/// caller can re-read authoritative state and retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by collection and id.
    async fn get(&self, collection: &str, id: Uuid) -> Result<Document, StoreError>;

    /// Create a document at version 1. Fails if the id already exists.
    async fn insert(
        &self,
        collection: &str,
        id: Uuid,
        value: serde_json::Value,
        now: i64,
    ) -> Result<u64, StoreError>;

    /// Replace a document's payload if its version still matches.
    /// Returns the new version.
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        value: serde_json::Value,
        now: i64,
    ) -> Result<u64, StoreError>;

    /// All documents in a collection matching the predicate.
    async fn query(
        &self,
        collection: &str,
        predicate: &(dyn for<'a> Fn(&'a Document) -> bool + Sync),
    ) -> Result<Vec<Document>, StoreError>;

    /// Subscribe to changes of a single document.
    ///
    /// Every successful insert or compare-and-swap publishes the full new
    /// document; subscribers always see complete state, never deltas. The
    /// receiver may be obtained before the document exists.
    fn watch(&self, collection: &str, id: Uuid) -> broadcast::Receiver<Document>;
}
