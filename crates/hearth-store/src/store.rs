//! The document store contract.
//!
//! The client core talks to storage only through [`DocumentStore`], so a
//! hosted backend can stand in for the local SQLite [`Database`].

use async_trait::async_trait;
use serde_json::Value;

use crate::database::Database;
use crate::documents::Document;
use crate::error::Result;
use crate::live::{spawn_live_query, OnChange, OnError, Subscription};
use crate::query::Query;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document, `None` if absent.
    async fn read(&self, path: &str) -> Result<Option<Document>>;

    /// Create or replace the document at `path`.
    async fn write(&self, path: &str, data: Value) -> Result<()>;

    /// Create the document at `path`, failing with
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) if
    /// one is already there.
    async fn create(&self, path: &str, data: Value) -> Result<()>;

    /// Shallow-merge `partial` into the existing document at `path`.
    async fn update(&self, path: &str, partial: Value) -> Result<()>;

    /// Insert into `collection` under a generated id.
    async fn append(&self, collection: &str, data: Value) -> Result<Document>;

    /// One-shot query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Start a live query.  Deliveries stop when the handle is dropped.
    fn subscribe(&self, query: Query, on_change: OnChange, on_error: OnError)
        -> Result<Subscription>;
}

#[async_trait]
impl DocumentStore for Database {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        self.get_document(path)
    }

    async fn write(&self, path: &str, data: Value) -> Result<()> {
        self.put_document(path, data)
    }

    async fn create(&self, path: &str, data: Value) -> Result<()> {
        self.insert_document(path, data)
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        self.merge_document(path, partial)
    }

    async fn append(&self, collection: &str, data: Value) -> Result<Document> {
        self.append_document(collection, data)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.run_query(query)
    }

    fn subscribe(
        &self,
        query: Query,
        on_change: OnChange,
        on_error: OnError,
    ) -> Result<Subscription> {
        spawn_live_query(self.clone(), query, on_change, on_error)
    }
}
