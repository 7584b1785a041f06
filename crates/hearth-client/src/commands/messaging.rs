use std::sync::Arc;

use tracing::info;

use hearth_shared::{ChannelId, CurrentUser};
use hearth_store::{
    models::now_millis, to_body, Direction, Document, DocumentStore, Message, MessageKind, Paths,
    Query,
};

use crate::commands::{created_or_kept, decode_all};
use crate::error::{ClientError, Result};

/// Appending to and reading channel message logs.
#[derive(Clone)]
pub struct Messaging {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
    window: usize,
}

impl Messaging {
    pub fn new(store: Arc<dyn DocumentStore>, paths: Paths, window: usize) -> Self {
        Self {
            store,
            paths,
            window,
        }
    }

    /// Newest `window` messages, newest first.  Reverse with
    /// [`window_from_documents`] for display.
    pub fn window_query(&self, channel: &ChannelId) -> Query {
        Query::new(self.paths.messages(channel))
            .order_by("timestamp", Direction::Descending)
            .limit(self.window)
    }

    /// One-shot read of the current window, oldest first.
    pub async fn recent(&self, channel: &ChannelId) -> Result<Vec<Message>> {
        let docs = self.store.query(&self.window_query(channel)).await?;
        Ok(window_from_documents(docs))
    }

    /// Append a user message.
    ///
    /// Text that is empty after trimming is a silent no-op and returns
    /// `Ok(None)` without touching the store.  Only members of the channel
    /// may post.
    pub async fn send(
        &self,
        me: &CurrentUser,
        channel: &ChannelId,
        content: &str,
        kind: MessageKind,
    ) -> Result<Option<Message>> {
        let content = match kind {
            MessageKind::Text => {
                if content.trim().is_empty() {
                    return Ok(None);
                }
                content.to_string()
            }
            MessageKind::Gif => {
                let url = content.trim();
                if url.is_empty() {
                    return Err(ClientError::validation("Pick a GIF to send."));
                }
                url.to_string()
            }
            MessageKind::System => {
                return Err(ClientError::Forbidden(
                    "System messages cannot be sent directly.".into(),
                ));
            }
        };

        let group = self
            .store
            .read(&self.paths.group(channel))
            .await?
            .ok_or_else(|| ClientError::validation("Channel not found."))?;
        let group: hearth_store::Channel = group.decode()?;
        if !group.is_member(&me.uid) {
            return Err(ClientError::Forbidden(
                "You are not a member of this channel.".into(),
            ));
        }

        let mut message = Message {
            id: String::new(),
            sender_id: me.uid.clone(),
            sender_username: me.username.clone(),
            content,
            kind,
            timestamp: now_millis(),
        };

        let doc = self
            .store
            .append(&self.paths.messages(channel), to_body(&message)?)
            .await?;
        message.id = doc.id;

        info!(msg_id = %message.id, channel = %channel, kind = ?kind, "Message sent");
        Ok(Some(message))
    }

    /// Write a system message at a fixed id, at most once.
    ///
    /// Returns `true` if this call wrote it.
    pub async fn post_system_once(
        &self,
        channel: &ChannelId,
        message_id: &str,
        sender: &CurrentUser,
        content: &str,
    ) -> Result<bool> {
        let message = Message {
            id: message_id.to_string(),
            sender_id: sender.uid.clone(),
            sender_username: sender.username.clone(),
            content: content.to_string(),
            kind: MessageKind::System,
            timestamp: now_millis(),
        };
        let path = self.paths.message(channel, message_id);
        Ok(created_or_kept(self.store.create(&path, to_body(&message)?).await)?)
    }
}

/// Turn a newest-first window into display order (oldest first).
pub fn window_from_documents(documents: Vec<Document>) -> Vec<Message> {
    let mut messages: Vec<Message> = decode_all(documents);
    messages.reverse();
    messages
}

/// Text input state for one channel view.
///
/// The draft survives a failed text send so nothing typed is lost; GIF sends
/// never touch it.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Send the draft as a text message.  The draft is cleared only on
    /// success.
    pub async fn send_text(
        &mut self,
        messaging: &Messaging,
        me: &CurrentUser,
        channel: &ChannelId,
    ) -> Result<Option<Message>> {
        let sent = messaging
            .send(me, channel, &self.draft, MessageKind::Text)
            .await?;
        if sent.is_some() {
            self.draft.clear();
        }
        Ok(sent)
    }

    pub async fn send_gif(
        &self,
        messaging: &Messaging,
        me: &CurrentUser,
        channel: &ChannelId,
        url: &str,
    ) -> Result<Option<Message>> {
        messaging.send(me, channel, url, MessageKind::Gif).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use hearth_store::{Database, StoreError};

    use super::*;
    use crate::commands::channels::Channels;
    use crate::test_support::FlakyStore;

    const APP: &str = "test";

    async fn setup() -> (Database, Messaging, ChannelId) {
        let db = Database::open_in_memory().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let channels = Channels::new(store.clone(), Paths::new(APP));
        let group = channels.create_group(&me(), "Team").await.unwrap();
        (db, Messaging::new(store, Paths::new(APP), 50), group.id)
    }

    fn me() -> CurrentUser {
        CurrentUser::new("u1", "Alpha")
    }

    fn message_count(db: &Database, channel: &ChannelId) -> usize {
        db.run_query(&Query::new(Paths::new(APP).messages(channel)))
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn whitespace_text_is_a_silent_no_op() {
        let (db, messaging, channel) = setup().await;
        for content in ["", "   ", "\n\t"] {
            let sent = messaging
                .send(&me(), &channel, content, MessageKind::Text)
                .await
                .unwrap();
            assert!(sent.is_none());
        }
        assert_eq!(message_count(&db, &channel), 0);
    }

    #[tokio::test]
    async fn send_appends_text_and_gif() {
        let (db, messaging, channel) = setup().await;
        let text = messaging
            .send(&me(), &channel, "hello", MessageKind::Text)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(text.kind, MessageKind::Text);
        assert!(!text.id.is_empty());

        let gif = messaging
            .send(&me(), &channel, " https://media/x.gif ", MessageKind::Gif)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gif.content, "https://media/x.gif");

        let window = messaging.recent(&channel).await.unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "hello");
        assert_eq!(message_count(&db, &channel), 2);
    }

    #[tokio::test]
    async fn non_members_cannot_post() {
        let (_db, messaging, channel) = setup().await;
        let stranger = CurrentUser::new("u9", "Zed");
        let result = messaging
            .send(&stranger, &channel, "hi", MessageKind::Text)
            .await;
        assert!(matches!(result, Err(ClientError::Forbidden(_))));
    }

    #[tokio::test]
    async fn system_messages_are_not_user_sendable() {
        let (_db, messaging, channel) = setup().await;
        let result = messaging
            .send(&me(), &channel, "hi", MessageKind::System)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn window_is_latest_fifty_ascending() {
        let (db, messaging, channel) = setup().await;
        let collection = Paths::new(APP).messages(&channel);
        // Insert out of timestamp order.
        for i in (0..60).rev() {
            db.append_document(
                &collection,
                json!({
                    "senderId": "u1",
                    "senderUsername": "Alpha",
                    "content": format!("m{i}"),
                    "type": "text",
                    "timestamp": 1_000 + i,
                }),
            )
            .unwrap();
        }

        let window = messaging.recent(&channel).await.unwrap();
        assert_eq!(window.len(), 50);
        assert_eq!(window.first().unwrap().content, "m10");
        assert_eq!(window.last().unwrap().content, "m59");
        assert!(window.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn system_message_is_written_once() {
        let (db, messaging, channel) = setup().await;
        assert!(messaging
            .post_system_once(&channel, "welcome", &me(), "hi")
            .await
            .unwrap());
        assert!(!messaging
            .post_system_once(&channel, "welcome", &me(), "hi")
            .await
            .unwrap());
        assert_eq!(message_count(&db, &channel), 1);
    }

    #[tokio::test]
    async fn composer_clears_draft_on_success() {
        let (_db, messaging, channel) = setup().await;
        let mut composer = Composer::new();
        composer.set_draft("hello");

        composer.send_text(&messaging, &me(), &channel).await.unwrap();
        assert_eq!(composer.draft(), "");
    }

    #[tokio::test]
    async fn composer_keeps_draft_on_failure() {
        let (db, _messaging, channel) = setup().await;
        let flaky = Arc::new(FlakyStore::new(db));
        let messaging = Messaging::new(flaky.clone(), Paths::new(APP), 50);
        flaky.fail_writes(true);

        let mut composer = Composer::new();
        composer.set_draft("don't lose me");
        let err = composer
            .send_text(&messaging, &me(), &channel)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Io(_))));
        assert!(err.notice().is_error());
        assert_eq!(composer.draft(), "don't lose me");

        flaky.fail_writes(false);
        composer.send_text(&messaging, &me(), &channel).await.unwrap();
        assert_eq!(composer.draft(), "");
    }

    #[tokio::test]
    async fn composer_leaves_whitespace_draft_alone() {
        let (_db, messaging, channel) = setup().await;
        let mut composer = Composer::new();
        composer.set_draft("   ");
        let sent = composer.send_text(&messaging, &me(), &channel).await.unwrap();
        assert!(sent.is_none());
        assert_eq!(composer.draft(), "   ");
    }
}
