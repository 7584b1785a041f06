//! Friend-request lifecycle.
//!
//! Per unordered pair of users the relationship moves through
//! `NoRelation -> RequestPending(direction) -> Friends`, or back to
//! `NoRelation` when the receiver declines.  `Friends` is terminal.
//!
//! The store offers no cross-document transactions, so accepting a request
//! is an idempotent sequence keyed by the request id: status, both edges, the
//! DM channel, the welcome message.  Every step after the status update
//! either creates its record or finds it already there, so re-running an
//! interrupted accept finishes the job without duplicating anything.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use hearth_shared::constants::WELCOME_MESSAGE_ID;
use hearth_shared::{CurrentUser, Notice, RequestId, UserId};
use hearth_store::{
    models::now_millis, to_body, DocumentStore, FriendEdge, FriendRequest, Paths, Query,
    RequestStatus,
};

use crate::commands::channels::Channels;
use crate::commands::messaging::Messaging;
use crate::commands::{created_or_kept, decode_all};
use crate::error::{ClientError, Result};

/// How the signed-in user relates to another user, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Friend,
    /// A request from the signed-in user is awaiting an answer.
    Pending,
    /// Eligible for a new request.
    AddFriend,
}

/// Classify `target` against the current friends list and sent requests.
pub fn classify(target: &UserId, friends: &[FriendEdge], sent: &[FriendRequest]) -> Relation {
    if friends.iter().any(|edge| &edge.uid == target) {
        Relation::Friend
    } else if sent
        .iter()
        .any(|req| req.is_pending() && &req.receiver_id == target)
    {
        Relation::Pending
    } else {
        Relation::AddFriend
    }
}

#[derive(Clone)]
pub struct Friends {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
    channels: Channels,
    messaging: Messaging,
}

impl Friends {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        paths: Paths,
        channels: Channels,
        messaging: Messaging,
    ) -> Self {
        Self {
            store,
            paths,
            channels,
            messaging,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn sent_pending_query(&self, uid: &UserId) -> Query {
        Query::new(self.paths.friend_requests())
            .where_eq("senderId", uid)
            .where_eq("status", RequestStatus::Pending.as_str())
    }

    pub fn received_pending_query(&self, uid: &UserId) -> Query {
        Query::new(self.paths.friend_requests())
            .where_eq("receiverId", uid)
            .where_eq("status", RequestStatus::Pending.as_str())
    }

    pub fn friends_query(&self, uid: &UserId) -> Query {
        Query::new(self.paths.friends(uid))
    }

    /// The pending request between `a` and `b`, in either direction.
    pub async fn pending_between(&self, a: &UserId, b: &UserId) -> Result<Option<FriendRequest>> {
        for (sender, receiver) in [(a, b), (b, a)] {
            let query = Query::new(self.paths.friend_requests())
                .where_eq("senderId", sender)
                .where_eq("receiverId", receiver)
                .where_eq("status", RequestStatus::Pending.as_str())
                .limit(1);
            let found: Vec<FriendRequest> = decode_all(self.store.query(&query).await?);
            if let Some(request) = found.into_iter().next() {
                return Ok(Some(request));
            }
        }
        Ok(None)
    }

    pub async fn list_friends(&self, uid: &UserId) -> Result<Vec<FriendEdge>> {
        Ok(decode_all(self.store.query(&self.friends_query(uid)).await?))
    }

    pub async fn get_request(&self, id: &RequestId) -> Result<Option<FriendRequest>> {
        match self.store.read(&self.paths.friend_request(id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// `NoRelation -> RequestPending(me -> target)`.
    ///
    /// An existing friendship or pending request in either direction makes
    /// this a no-op reported as an informational notice.
    pub async fn send_request(
        &self,
        me: &CurrentUser,
        target: &UserId,
        target_username: &str,
    ) -> Result<Notice> {
        if target.as_str().trim().is_empty() {
            return Err(ClientError::validation("Pick a user to add."));
        }
        if target == &me.uid {
            return Err(ClientError::validation(
                "You cannot send a friend request to yourself.",
            ));
        }

        if self
            .store
            .read(&self.paths.friend(&me.uid, target))
            .await?
            .is_some()
        {
            return Ok(Notice::info(format!(
                "You are already friends with {target_username}."
            )));
        }

        if let Some(existing) = self.pending_between(&me.uid, target).await? {
            debug!(request_id = %existing.id, "Pending request already exists");
            return Ok(if existing.sender_id == me.uid {
                Notice::info(format!("Request already sent to {target_username}."))
            } else {
                Notice::info(format!("{target_username} has already sent you a request."))
            });
        }

        let request = FriendRequest {
            id: RequestId::new(),
            sender_id: me.uid.clone(),
            sender_username: me.username.clone(),
            receiver_id: target.clone(),
            receiver_username: target_username.to_string(),
            status: RequestStatus::Pending,
            created_at: now_millis(),
        };
        self.store
            .create(&self.paths.friend_request(&request.id), to_body(&request)?)
            .await?;

        info!(request_id = %request.id, from = %me.uid, to = %target, "Friend request sent");
        Ok(Notice::success(format!(
            "Friend request sent to {target_username}."
        )))
    }

    /// `RequestPending(sender -> me) -> Friends`.
    ///
    /// Safe to call again on an already accepted request: the remaining steps
    /// are completed and nothing is duplicated.
    pub async fn accept(&self, me: &CurrentUser, id: &RequestId) -> Result<Notice> {
        let request = self.load_for_receiver(me, id).await?;

        match request.status {
            RequestStatus::Declined => {
                return Err(ClientError::validation("This request was already declined."));
            }
            RequestStatus::Pending => {
                // Resolve the request before any edge exists.
                self.store
                    .update(
                        &self.paths.friend_request(id),
                        json!({ "status": RequestStatus::Accepted.as_str() }),
                    )
                    .await?;
                info!(request_id = %id, "Friend request accepted");
            }
            RequestStatus::Accepted => {
                debug!(request_id = %id, "Resuming accept of an accepted request");
            }
        }

        let since = now_millis();
        let edges = [
            (
                &request.receiver_id,
                FriendEdge {
                    uid: request.sender_id.clone(),
                    username: request.sender_username.clone(),
                    since: Some(since),
                },
            ),
            (
                &request.sender_id,
                FriendEdge {
                    uid: request.receiver_id.clone(),
                    username: request.receiver_username.clone(),
                    since: Some(since),
                },
            ),
        ];
        for (owner, edge) in &edges {
            let path = self.paths.friend(owner, &edge.uid);
            if created_or_kept(self.store.create(&path, to_body(edge)?).await)? {
                debug!(owner = %owner, friend = %edge.uid, "Friend edge created");
            }
        }

        let channel = self.channels.ensure_direct(&request).await?;
        let system = CurrentUser {
            uid: request.receiver_id.clone(),
            username: request.receiver_username.clone(),
        };
        if self
            .messaging
            .post_system_once(
                &channel.id,
                WELCOME_MESSAGE_ID,
                &system,
                &Channels::welcome_text(&request),
            )
            .await?
        {
            debug!(channel_id = %channel.id, "Welcome message posted");
        }

        Ok(Notice::success(format!(
            "You are now friends with {}.",
            request.sender_username
        )))
    }

    /// `RequestPending(sender -> me) -> NoRelation`.  Only the status changes.
    pub async fn decline(&self, me: &CurrentUser, id: &RequestId) -> Result<Notice> {
        let request = self.load_for_receiver(me, id).await?;

        match request.status {
            RequestStatus::Pending => {
                self.store
                    .update(
                        &self.paths.friend_request(id),
                        json!({ "status": RequestStatus::Declined.as_str() }),
                    )
                    .await?;
                info!(request_id = %id, "Friend request declined");
                Ok(Notice::info(format!(
                    "Declined the request from {}.",
                    request.sender_username
                )))
            }
            RequestStatus::Declined => Ok(Notice::info(format!(
                "The request from {} was already declined.",
                request.sender_username
            ))),
            RequestStatus::Accepted => {
                Err(ClientError::validation("This request was already accepted."))
            }
        }
    }

    async fn load_for_receiver(&self, me: &CurrentUser, id: &RequestId) -> Result<FriendRequest> {
        let request = self
            .get_request(id)
            .await?
            .ok_or_else(|| ClientError::validation("Friend request not found."))?;
        if request.receiver_id != me.uid {
            return Err(ClientError::Forbidden(
                "Only the recipient can respond to this request.".into(),
            ));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use hearth_shared::ChannelId;
    use hearth_store::{Channel, ChannelKind, Database, Message, MessageKind};

    use super::*;
    use crate::test_support::FlakyStore;

    const APP: &str = "test";

    fn friends_over(store: Arc<dyn DocumentStore>) -> Friends {
        let paths = Paths::new(APP);
        let channels = Channels::new(store.clone(), paths.clone());
        let messaging = Messaging::new(store.clone(), paths.clone(), 50);
        Friends::new(store, paths, channels, messaging)
    }

    fn setup() -> (Database, Friends) {
        let db = Database::open_in_memory().unwrap();
        let friends = friends_over(Arc::new(db.clone()));
        (db, friends)
    }

    fn alpha() -> CurrentUser {
        CurrentUser::new("u1", "Alpha")
    }

    fn beta() -> CurrentUser {
        CurrentUser::new("u2", "Beta")
    }

    fn all_requests(db: &Database) -> Vec<FriendRequest> {
        decode_all(
            db.run_query(&Query::new(Paths::new(APP).friend_requests()))
                .unwrap(),
        )
    }

    fn all_channels(db: &Database) -> Vec<Channel> {
        decode_all(db.run_query(&Query::new(Paths::new(APP).groups())).unwrap())
    }

    fn messages_in(db: &Database, channel: &ChannelId) -> Vec<Message> {
        decode_all(
            db.run_query(&Query::new(Paths::new(APP).messages(channel)))
                .unwrap(),
        )
    }

    async fn sent_request(db: &Database, friends: &Friends) -> RequestId {
        friends
            .send_request(&alpha(), &beta().uid, "Beta")
            .await
            .unwrap();
        all_requests(db).remove(0).id
    }

    #[tokio::test]
    async fn repeat_send_is_an_informational_no_op() {
        let (db, friends) = setup();

        let first = friends
            .send_request(&alpha(), &beta().uid, "Beta")
            .await
            .unwrap();
        assert_eq!(first, Notice::success("Friend request sent to Beta."));

        let again = friends
            .send_request(&alpha(), &beta().uid, "Beta")
            .await
            .unwrap();
        assert_eq!(again, Notice::info("Request already sent to Beta."));

        let requests = all_requests(&db);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Pending);
        assert_eq!(requests[0].sender_id, alpha().uid);
        assert_eq!(requests[0].receiver_username, "Beta");
    }

    #[tokio::test]
    async fn reverse_send_is_also_blocked() {
        let (db, friends) = setup();
        sent_request(&db, &friends).await;

        let notice = friends
            .send_request(&beta(), &alpha().uid, "Alpha")
            .await
            .unwrap();
        assert_eq!(notice, Notice::info("Alpha has already sent you a request."));
        assert_eq!(all_requests(&db).len(), 1);
    }

    #[tokio::test]
    async fn self_and_blank_targets_are_rejected() {
        let (db, friends) = setup();
        assert!(matches!(
            friends.send_request(&alpha(), &alpha().uid, "Alpha").await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            friends.send_request(&alpha(), &UserId::from(" "), "?").await,
            Err(ClientError::Validation(_))
        ));
        assert!(all_requests(&db).is_empty());
    }

    #[tokio::test]
    async fn accept_creates_edges_dm_and_welcome() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;

        let notice = friends.accept(&beta(), &id).await.unwrap();
        assert_eq!(notice, Notice::success("You are now friends with Alpha."));

        let request = friends.get_request(&id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Accepted);

        let paths = Paths::new(APP);
        let a_side = db.get_document(&paths.friend(&alpha().uid, &beta().uid)).unwrap();
        let b_side = db.get_document(&paths.friend(&beta().uid, &alpha().uid)).unwrap();
        assert_eq!(a_side.unwrap().decode::<FriendEdge>().unwrap().username, "Beta");
        assert_eq!(b_side.unwrap().decode::<FriendEdge>().unwrap().username, "Alpha");

        let channels = all_channels(&db);
        assert_eq!(channels.len(), 1);
        let dm = &channels[0];
        assert_eq!(dm.kind, ChannelKind::Dm);
        let mut members = dm.members.clone();
        members.sort();
        assert_eq!(members, vec![alpha().uid, beta().uid]);

        let messages = messages_in(&db, &dm.id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::System);
    }

    #[tokio::test]
    async fn accept_is_idempotent() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;

        friends.accept(&beta(), &id).await.unwrap();
        friends.accept(&beta(), &id).await.unwrap();

        assert_eq!(friends.list_friends(&alpha().uid).await.unwrap().len(), 1);
        assert_eq!(friends.list_friends(&beta().uid).await.unwrap().len(), 1);
        let channels = all_channels(&db);
        assert_eq!(channels.len(), 1);
        assert_eq!(messages_in(&db, &channels[0].id).len(), 1);
    }

    #[tokio::test]
    async fn interrupted_accept_can_be_resumed() {
        let db = Database::open_in_memory().unwrap();
        let flaky = Arc::new(FlakyStore::new(db.clone()));
        let friends = friends_over(flaky.clone());
        let id = sent_request(&db, &friends).await;

        // Channel creation fails after the status and edges are written.
        flaky.fail_paths_containing(Some("/groups/"));
        assert!(matches!(
            friends.accept(&beta(), &id).await,
            Err(ClientError::Store(_))
        ));
        assert_eq!(
            friends.get_request(&id).await.unwrap().unwrap().status,
            RequestStatus::Accepted
        );
        assert_eq!(friends.list_friends(&alpha().uid).await.unwrap().len(), 1);
        assert!(all_channels(&db).is_empty());

        flaky.fail_paths_containing(None);
        friends.accept(&beta(), &id).await.unwrap();

        assert_eq!(friends.list_friends(&alpha().uid).await.unwrap().len(), 1);
        assert_eq!(friends.list_friends(&beta().uid).await.unwrap().len(), 1);
        let channels = all_channels(&db);
        assert_eq!(channels.len(), 1);
        assert_eq!(messages_in(&db, &channels[0].id).len(), 1);
    }

    #[tokio::test]
    async fn only_receiver_may_respond() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;

        assert!(matches!(
            friends.accept(&alpha(), &id).await,
            Err(ClientError::Forbidden(_))
        ));
        assert!(matches!(
            friends.decline(&CurrentUser::new("u3", "Gamma"), &id).await,
            Err(ClientError::Forbidden(_))
        ));
        assert!(friends.get_request(&id).await.unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn decline_writes_no_edges_or_channels() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;

        friends.decline(&beta(), &id).await.unwrap();

        let request = friends.get_request(&id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Declined);
        assert!(friends.list_friends(&alpha().uid).await.unwrap().is_empty());
        assert!(friends.list_friends(&beta().uid).await.unwrap().is_empty());
        assert!(all_channels(&db).is_empty());

        // A declined request can no longer be accepted.
        assert!(matches!(
            friends.accept(&beta(), &id).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn declined_request_does_not_block_a_new_one() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;
        friends.decline(&beta(), &id).await.unwrap();

        let notice = friends
            .send_request(&alpha(), &beta().uid, "Beta")
            .await
            .unwrap();
        assert_eq!(notice, Notice::success("Friend request sent to Beta."));

        let requests = all_requests(&db);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests.iter().filter(|r| r.is_pending()).count(), 1);
    }

    #[tokio::test]
    async fn friends_cannot_send_again() {
        let (db, friends) = setup();
        let id = sent_request(&db, &friends).await;
        friends.accept(&beta(), &id).await.unwrap();

        let notice = friends
            .send_request(&beta(), &alpha().uid, "Alpha")
            .await
            .unwrap();
        assert_eq!(notice, Notice::info("You are already friends with Alpha."));
        assert_eq!(all_requests(&db).len(), 1);
    }

    #[test]
    fn classify_prefers_friendship_then_pending() {
        let target = UserId::from("u2");
        let edge = FriendEdge {
            uid: target.clone(),
            username: "Beta".into(),
            since: None,
        };
        let pending = FriendRequest {
            id: RequestId::from("r1"),
            sender_id: UserId::from("u1"),
            sender_username: "Alpha".into(),
            receiver_id: target.clone(),
            receiver_username: "Beta".into(),
            status: RequestStatus::Pending,
            created_at: 0,
        };

        assert_eq!(classify(&target, &[edge.clone()], &[pending.clone()]), Relation::Friend);
        assert_eq!(classify(&target, &[], &[pending.clone()]), Relation::Pending);
        assert_eq!(classify(&target, &[], &[]), Relation::AddFriend);

        let declined = FriendRequest {
            status: RequestStatus::Declined,
            ..pending
        };
        assert_eq!(classify(&target, &[], &[declined]), Relation::AddFriend);
    }
}
