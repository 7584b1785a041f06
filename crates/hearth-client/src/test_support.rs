//! Test doubles shared by the unit tests.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use hearth_store::{
    Database, Document, DocumentStore, OnChange, OnError, Query, Result, StoreError, Subscription,
};

/// A [`DocumentStore`] over a real [`Database`] whose writes, reads, and live
/// queries can be made to fail on demand.
pub struct FlakyStore {
    db: Database,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_paths: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_paths: Mutex::new(None),
        }
    }

    /// Fail every write.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Fail every read, query, and newly opened live query.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Fail writes whose path contains `fragment`.
    pub fn fail_paths_containing(&self, fragment: Option<&str>) {
        *self.fail_paths.lock().unwrap() = fragment.map(str::to_string);
    }

    fn check_write(&self, path: &str) -> Result<()> {
        let path_blocked = self
            .fail_paths
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|fragment| path.contains(fragment));
        if self.fail_writes.load(Ordering::SeqCst) || path_blocked {
            return Err(unavailable(path));
        }
        Ok(())
    }

    fn check_read(&self, path: &str) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable(path));
        }
        Ok(())
    }
}

fn unavailable(path: &str) -> StoreError {
    StoreError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!("store unavailable for {path}"),
    ))
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        self.check_read(path)?;
        self.db.read(path).await
    }

    async fn write(&self, path: &str, data: Value) -> Result<()> {
        self.check_write(path)?;
        self.db.write(path, data).await
    }

    async fn create(&self, path: &str, data: Value) -> Result<()> {
        self.check_write(path)?;
        self.db.create(path, data).await
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        self.check_write(path)?;
        self.db.update(path, partial).await
    }

    async fn append(&self, collection: &str, data: Value) -> Result<Document> {
        self.check_write(collection)?;
        self.db.append(collection, data).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.check_read(&query.collection)?;
        self.db.query(query).await
    }

    fn subscribe(
        &self,
        query: Query,
        on_change: OnChange,
        on_error: OnError,
    ) -> Result<Subscription> {
        if !self.fail_reads.load(Ordering::SeqCst) {
            return self.db.subscribe(query, on_change, on_error);
        }

        // Report the failure once, then idle until cancelled.
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            on_error(unavailable(&query.collection));
            token.cancelled().await;
        });
        Ok(Subscription::new(cancel, task))
    }
}
