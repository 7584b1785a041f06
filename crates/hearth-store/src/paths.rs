//! Store path helpers and the application's path layout.
//!
//! A path is a `/`-separated list of non-empty segments.  Collections have an
//! odd number of segments, documents an even number; a document's collection
//! is its path minus the last segment.
//!
//! ```text
//! apps/{app}/public/data/friendRequests/{requestId}
//! apps/{app}/public/data/groups/{channelId}
//! apps/{app}/public/data/groups/{channelId}/messages/{messageId}
//! apps/{app}/public/data/userDirectory/{uid}
//! apps/{app}/users/{uid}/friends/{friendUid}
//! apps/{app}/users/{uid}/profile/main
//! ```

use hearth_shared::constants::DEFAULT_APP_ID;
use hearth_shared::{ChannelId, RequestId, UserId};

use crate::error::{Result, StoreError};

/// Split a document path into `(collection, doc_id)`.
pub fn split_document_path(path: &str) -> Result<(&str, &str)> {
    let segments = checked_segments(path)?;
    if segments % 2 != 0 {
        return Err(StoreError::InvalidPath(format!(
            "{path} is a collection path, expected a document"
        )));
    }
    // checked_segments guarantees at least one '/'.
    match path.rsplit_once('/') {
        Some((collection, id)) => Ok((collection, id)),
        None => Err(StoreError::InvalidPath(path.to_string())),
    }
}

/// Validate a collection path.
pub fn check_collection_path(path: &str) -> Result<()> {
    let segments = checked_segments(path)?;
    if segments % 2 == 0 {
        return Err(StoreError::InvalidPath(format!(
            "{path} is a document path, expected a collection"
        )));
    }
    Ok(())
}

fn checked_segments(path: &str) -> Result<usize> {
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(path.split('/').count())
}

/// Path layout for one application namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    app_id: String,
}

impl Paths {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn public(&self) -> String {
        format!("apps/{}/public/data", self.app_id)
    }

    fn private(&self, uid: &UserId) -> String {
        format!("apps/{}/users/{}", self.app_id, uid)
    }

    // -- public collections ---------------------------------------------

    pub fn friend_requests(&self) -> String {
        format!("{}/friendRequests", self.public())
    }

    pub fn friend_request(&self, id: &RequestId) -> String {
        format!("{}/{}", self.friend_requests(), id)
    }

    pub fn groups(&self) -> String {
        format!("{}/groups", self.public())
    }

    pub fn group(&self, id: &ChannelId) -> String {
        format!("{}/{}", self.groups(), id)
    }

    pub fn messages(&self, channel: &ChannelId) -> String {
        format!("{}/messages", self.group(channel))
    }

    pub fn message(&self, channel: &ChannelId, message_id: &str) -> String {
        format!("{}/{}", self.messages(channel), message_id)
    }

    pub fn user_directory(&self) -> String {
        format!("{}/userDirectory", self.public())
    }

    pub fn directory_entry(&self, uid: &UserId) -> String {
        format!("{}/{}", self.user_directory(), uid)
    }

    // -- private per-user collections -----------------------------------

    pub fn friends(&self, owner: &UserId) -> String {
        format!("{}/friends", self.private(owner))
    }

    pub fn friend(&self, owner: &UserId, friend: &UserId) -> String {
        format!("{}/{}", self.friends(owner), friend)
    }

    pub fn profile(&self, owner: &UserId) -> String {
        format!("{}/profile/main", self.private(owner))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(DEFAULT_APP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_paths_split() {
        let (collection, id) = split_document_path("a/b/c/d").unwrap();
        assert_eq!(collection, "a/b/c");
        assert_eq!(id, "d");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(split_document_path("a/b/c").is_err());
        assert!(split_document_path("a//b").is_err());
        assert!(split_document_path("").is_err());
        assert!(check_collection_path("a/b").is_err());
        assert!(check_collection_path("a/b/c").is_ok());
    }

    #[test]
    fn layout_produces_valid_paths() {
        let paths = Paths::new("app");
        let uid = UserId::from("u1");
        let channel = ChannelId::from("c1");

        assert_eq!(
            paths.friend(&uid, &UserId::from("u2")),
            "apps/app/users/u1/friends/u2"
        );
        assert_eq!(
            paths.message(&channel, "m1"),
            "apps/app/public/data/groups/c1/messages/m1"
        );

        for doc in [
            paths.friend_request(&RequestId::from("r1")),
            paths.group(&channel),
            paths.message(&channel, "m1"),
            paths.directory_entry(&uid),
            paths.friend(&uid, &UserId::from("u2")),
            paths.profile(&uid),
        ] {
            split_document_path(&doc).unwrap();
        }
        for collection in [
            paths.friend_requests(),
            paths.groups(),
            paths.messages(&channel),
            paths.user_directory(),
            paths.friends(&uid),
        ] {
            check_collection_path(&collection).unwrap();
        }
    }
}
