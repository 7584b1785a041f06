//! Live queries.
//!
//! A live query delivers the full current result set of a [`Query`] once when
//! it is set up and again after every write to the queried collection.  There
//! is no incremental diff: each delivery is the complete window.
//!
//! Delivery runs on a tokio task owned by the returned [`Subscription`].
//! Dropping the handle (or calling [`Subscription::unsubscribe`]) cancels the
//! task; nothing is delivered after cancellation has been observed.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::database::Database;
use crate::documents::Document;
use crate::error::{Result, StoreError};
use crate::query::Query;

/// Callback receiving each full result set.
pub type OnChange = Box<dyn Fn(Vec<Document>) + Send + Sync + 'static>;

/// Callback receiving read failures.  The subscription stays active.
pub type OnError = Box<dyn Fn(StoreError) + Send + Sync + 'static>;

/// A write notification on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: String,
    pub path: String,
}

impl Change {
    pub fn new(collection: &str, path: &str) -> Self {
        Self {
            collection: collection.to_string(),
            path: path.to_string(),
        }
    }
}

/// Handle to an active live query.
#[must_use = "dropping a Subscription stops its deliveries"]
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a delivery task.  `cancel` must be observed by the task before
    /// every delivery.
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop deliveries.  Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Spawn the delivery task for a live query.  Requires a tokio runtime.
pub(crate) fn spawn_live_query(
    db: Database,
    query: Query,
    on_change: OnChange,
    on_error: OnError,
) -> Result<Subscription> {
    query.validate()?;

    // Subscribe to the feed before the initial read so no write in between
    // can be missed.
    let mut feed = db.changes();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tracing::debug!(collection = %query.collection, "live query started");

    let task = tokio::spawn(async move {
        deliver(&db, &query, &token, &on_change, &on_error);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                change = feed.recv() => match change {
                    Ok(change) if change.collection == query.collection => {
                        deliver(&db, &query, &token, &on_change, &on_error);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            collection = %query.collection,
                            skipped,
                            "live query lagged, re-reading"
                        );
                        deliver(&db, &query, &token, &on_change, &on_error);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::debug!(collection = %query.collection, "live query stopped");
    });

    Ok(Subscription::new(cancel, task))
}

fn deliver(
    db: &Database,
    query: &Query,
    token: &CancellationToken,
    on_change: &OnChange,
    on_error: &OnError,
) {
    let result = db.run_query(query);
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(documents) => on_change(documents),
        Err(e) => {
            tracing::warn!(collection = %query.collection, error = %e, "live query read failed");
            on_error(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn collect(
        db: &Database,
        query: Query,
    ) -> (Subscription, mpsc::UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = spawn_live_query(
            db.clone(),
            query,
            Box::new(move |docs| {
                let _ = tx.send(docs.into_iter().map(|d| d.id).collect());
            }),
            Box::new(|_| {}),
        )
        .unwrap();
        (sub, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<String>>) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("feed closed")
    }

    #[tokio::test]
    async fn delivers_initial_and_updated_sets() {
        let db = Database::open_in_memory().unwrap();
        db.put_document("items/a", json!({})).unwrap();

        let (_sub, mut rx) = collect(&db, Query::new("items"));
        assert_eq!(next(&mut rx).await, ["a"]);

        db.put_document("items/b", json!({})).unwrap();
        assert_eq!(next(&mut rx).await, ["a", "b"]);
    }

    #[tokio::test]
    async fn ignores_other_collections() {
        let db = Database::open_in_memory().unwrap();
        let (_sub, mut rx) = collect(&db, Query::new("items"));
        assert!(next(&mut rx).await.is_empty());

        db.put_document("other/x", json!({})).unwrap();
        db.put_document("items/a", json!({})).unwrap();
        assert_eq!(next(&mut rx).await, ["a"]);
    }

    #[tokio::test]
    async fn dropping_stops_delivery() {
        let db = Database::open_in_memory().unwrap();
        let (sub, mut rx) = collect(&db, Query::new("items"));
        next(&mut rx).await;
        assert!(sub.is_active());

        sub.unsubscribe();
        db.put_document("items/a", json!({})).unwrap();

        // The sender lives inside the aborted task, so the channel closes
        // without another delivery.
        let after = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("channel should close");
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn unsupported_query_fails_up_front() {
        let db = Database::open_in_memory().unwrap();
        let query = Query::new("items")
            .where_array_contains("members", "u1")
            .order_by("createdAt", crate::query::Direction::Ascending);
        let result = spawn_live_query(db, query, Box::new(|_| {}), Box::new(|_| {}));
        assert!(matches!(result, Err(StoreError::UnsupportedQuery(_))));
    }
}
