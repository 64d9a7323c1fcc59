//! In-memory reference implementation of the document store

use crate::document::{Document, DocumentStore};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use types::errors::StoreError;
use uuid::Uuid;

/// Capacity of each per-document change feed. Subscribers that lag past this
/// skip straight to newer states, which is safe because every event is a
/// full document.
const CHANNEL_CAPACITY: usize = 64;

type DocKey = (String, Uuid);

/// DashMap-backed document store with per-document broadcast feeds
pub struct MemoryStore {
    docs: DashMap<DocKey, Document>,
    feeds: DashMap<DocKey, broadcast::Sender<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            feeds: DashMap::new(),
        }
    }

    fn feed(&self, key: &DocKey) -> broadcast::Sender<Document> {
        self.feeds
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn publish(&self, key: &DocKey, doc: Document) {
        if let Some(tx) = self.feeds.get(key) {
            // Send only fails when nobody is listening.
            let _ = tx.send(doc);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: Uuid) -> Result<Document, StoreError> {
        self.docs
            .get(&(collection.to_string(), id))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })
    }

    async fn insert(
        &self,
        collection: &str,
        id: Uuid,
        value: serde_json::Value,
        now: i64,
    ) -> Result<u64, StoreError> {
        let key = (collection.to_string(), id);
        let doc = Document {
            value,
            version: 1,
            updated_at: now,
        };
        match self.docs.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            }),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(doc.clone());
                self.publish(&key, doc);
                Ok(1)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        value: serde_json::Value,
        now: i64,
    ) -> Result<u64, StoreError> {
        let key = (collection.to_string(), id);
        let doc = match self.docs.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Vacant(_) => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id,
                })
            }
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.version != expected_version {
                    return Err(StoreError::VersionConflict {
                        expected: expected_version,
                        actual: current.version,
                    });
                }
                let doc = Document {
                    value,
                    version: expected_version + 1,
                    updated_at: now,
                };
                occupied.insert(doc.clone());
                doc
            }
        };
        let version = doc.version;
        self.publish(&key, doc);
        Ok(version)
    }

    async fn query(
        &self,
        collection: &str,
        predicate: &(dyn for<'a> Fn(&'a Document) -> bool + Sync),
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .filter(|doc| predicate(doc))
            .collect())
    }

    fn watch(&self, collection: &str, id: Uuid) -> broadcast::Receiver<Document> {
        self.feed(&(collection.to_string(), id)).subscribe()
    }
}
