//! Public user directory.
//!
//! A searchable projection of user profiles (uid and username only), kept in
//! the public `userDirectory` collection.  Written once at registration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use hearth_shared::constants::{MAX_SEARCH_RESULTS, MIN_SEARCH_LEN};
use hearth_shared::UserId;
use hearth_store::{to_body, DirectoryEntry, Direction, DocumentStore, Paths, Query};

use crate::commands::decode_all;
use crate::error::Result;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Publish (or replace) the entry for `entry.uid`.
    async fn publish(&self, entry: &DirectoryEntry) -> Result<()>;

    async fn lookup(&self, uid: &UserId) -> Result<Option<DirectoryEntry>>;

    /// Entries whose username starts with `needle`, ignoring case.
    ///
    /// Needles shorter than two characters yield nothing.  The requester is
    /// never part of the result.
    async fn search(&self, needle: &str, requester: &UserId) -> Result<Vec<DirectoryEntry>>;
}

/// [`UserDirectory`] over a [`DocumentStore`].
#[derive(Clone)]
pub struct StoreDirectory {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
}

impl StoreDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, paths: Paths) -> Self {
        Self { store, paths }
    }
}

#[async_trait]
impl UserDirectory for StoreDirectory {
    async fn publish(&self, entry: &DirectoryEntry) -> Result<()> {
        self.store
            .write(&self.paths.directory_entry(&entry.uid), to_body(entry)?)
            .await?;
        debug!(uid = %entry.uid, "Directory entry published");
        Ok(())
    }

    async fn lookup(&self, uid: &UserId) -> Result<Option<DirectoryEntry>> {
        match self.store.read(&self.paths.directory_entry(uid)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn search(&self, needle: &str, requester: &UserId) -> Result<Vec<DirectoryEntry>> {
        let needle = needle.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        // One extra row covers the requester matching their own prefix.
        let query = Query::new(self.paths.user_directory())
            .where_starts_with("usernameLower", needle)
            .order_by("usernameLower", Direction::Ascending)
            .limit(MAX_SEARCH_RESULTS + 1);

        let mut entries: Vec<DirectoryEntry> = decode_all(self.store.query(&query).await?);
        entries.retain(|entry| &entry.uid != requester);
        entries.truncate(MAX_SEARCH_RESULTS);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use hearth_store::Database;

    use super::*;

    async fn directory_with(names: &[(&str, &str)]) -> StoreDirectory {
        let db = Database::open_in_memory().unwrap();
        let directory = StoreDirectory::new(Arc::new(db), Paths::new("test"));
        for (uid, name) in names {
            directory
                .publish(&DirectoryEntry::new(UserId::from(*uid), *name))
                .await
                .unwrap();
        }
        directory
    }

    #[tokio::test]
    async fn prefix_search_ignores_case_and_requester() {
        let directory =
            directory_with(&[("u1", "Alpha"), ("u2", "alfred"), ("u3", "Beta")]).await;

        let found = directory.search("AL", &UserId::from("u1")).await.unwrap();
        let names: Vec<_> = found.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["alfred"]);
    }

    #[tokio::test]
    async fn short_needles_return_nothing() {
        let directory = directory_with(&[("u1", "Alpha")]).await;
        assert!(directory.search("a", &UserId::from("u9")).await.unwrap().is_empty());
        assert!(directory.search("  ", &UserId::from("u9")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_are_capped() {
        let names: Vec<(String, String)> = (0..30)
            .map(|i| (format!("u{i}"), format!("user{i:02}")))
            .collect();
        let borrowed: Vec<(&str, &str)> = names
            .iter()
            .map(|(uid, name)| (uid.as_str(), name.as_str()))
            .collect();
        let directory = directory_with(&borrowed).await;

        let found = directory.search("user", &UserId::from("u0")).await.unwrap();
        assert_eq!(found.len(), MAX_SEARCH_RESULTS);
        assert!(found.iter().all(|e| e.uid.as_str() != "u0"));
    }

    #[tokio::test]
    async fn lookup_and_republish() {
        let directory = directory_with(&[("u1", "Alpha")]).await;
        directory
            .publish(&DirectoryEntry::new(UserId::from("u1"), "Alphonse"))
            .await
            .unwrap();

        let entry = directory.lookup(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(entry.username, "Alphonse");
        assert!(directory.lookup(&UserId::from("nope")).await.unwrap().is_none());
    }
}
