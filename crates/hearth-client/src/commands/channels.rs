use std::sync::Arc;

use tracing::info;

use hearth_shared::{ChannelId, CurrentUser, UserId};
use hearth_store::{
    models::now_millis, to_body, Channel, ChannelKind, Document, DocumentStore, FriendRequest,
    Paths, Query, StoreError,
};

use crate::commands::{created_or_kept, decode_all};
use crate::error::{ClientError, Result};

/// Group creation, DM creation and channel visibility.
#[derive(Clone)]
pub struct Channels {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
}

impl Channels {
    pub fn new(store: Arc<dyn DocumentStore>, paths: Paths) -> Self {
        Self { store, paths }
    }

    /// Create a group channel owned by `me`, with `me` as its only member.
    pub async fn create_group(&self, me: &CurrentUser, name: &str) -> Result<Channel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Group name cannot be empty."));
        }

        let channel = Channel {
            id: ChannelId::new(),
            name: name.to_string(),
            kind: ChannelKind::Group,
            members: vec![me.uid.clone()],
            owner_id: me.uid.clone(),
            created_at: Some(now_millis()),
        };

        let path = self.paths.group(&channel.id);
        self.store.create(&path, to_body(&channel)?).await?;

        info!(channel_id = %channel.id, name = %channel.name, "Group created");
        Ok(channel)
    }

    /// Make sure the DM channel for an accepted request exists.
    ///
    /// The channel lives at the pair's canonical id, so repeated or crossed
    /// calls converge on one record.  An existing channel is returned as is.
    pub async fn ensure_direct(&self, request: &FriendRequest) -> Result<Channel> {
        let id = ChannelId::direct(&request.sender_id, &request.receiver_id);
        let path = self.paths.group(&id);

        let channel = Channel {
            id: id.clone(),
            name: format!("{} & {}", request.sender_username, request.receiver_username),
            kind: ChannelKind::Dm,
            members: vec![request.sender_id.clone(), request.receiver_id.clone()],
            owner_id: request.receiver_id.clone(),
            created_at: Some(now_millis()),
        };

        if created_or_kept(self.store.create(&path, to_body(&channel)?).await)? {
            info!(channel_id = %id, "Direct channel created");
            return Ok(channel);
        }

        match self.store.read(&path).await? {
            Some(doc) => Ok(doc.decode()?),
            None => Err(StoreError::NotFound.into()),
        }
    }

    pub async fn get(&self, id: &ChannelId) -> Result<Option<Channel>> {
        match self.store.read(&self.paths.group(id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Channels visible to `uid`.  No ordering: the store cannot combine it
    /// with the membership filter, see [`sort_channels`].
    pub fn membership_query(&self, uid: &UserId) -> Query {
        Query::new(self.paths.groups()).where_array_contains("members", uid)
    }

    /// One-shot, display-ordered list of the channels visible to `uid`.
    pub async fn list(&self, uid: &UserId) -> Result<Vec<Channel>> {
        let docs = self.store.query(&self.membership_query(uid)).await?;
        Ok(channels_from_documents(docs))
    }

    /// Message to post in a freshly created DM.
    pub fn welcome_text(request: &FriendRequest) -> String {
        format!(
            "{} and {} are now friends. Say hi!",
            request.sender_username, request.receiver_username
        )
    }
}

/// Decode and display-order a channel result set.
pub fn channels_from_documents(documents: Vec<Document>) -> Vec<Channel> {
    let mut channels: Vec<Channel> = decode_all(documents);
    sort_channels(&mut channels);
    channels
}

/// Newest first; a missing creation time sorts as 0 (oldest).  Ties are
/// broken by id so the order is stable across deliveries.
pub fn sort_channels(channels: &mut [Channel]) {
    channels.sort_by(|a, b| {
        b.created_at_or_zero()
            .cmp(&a.created_at_or_zero())
            .then_with(|| a.id.cmp(&b.id))
    });
}
