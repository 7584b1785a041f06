//! A signed-in chat session.
//!
//! [`ChatSession`] owns the live subscriptions for the signed-in user's sent
//! requests, received requests, friends and channels, plus at most one
//! message subscription for the open channel.  Derived state is published
//! through `watch` receivers.  Read failures publish an empty set and emit an
//! error notice; the session stays usable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use hearth_shared::{ChannelId, CurrentUser, Notice, RequestId, UserId};
use hearth_store::{
    Channel, Document, DocumentStore, FriendEdge, FriendRequest, Message, OnChange, OnError,
    Query, Subscription,
};

use crate::commands::channels::{channels_from_documents, Channels};
use crate::commands::decode_all;
use crate::commands::friends::{classify, Friends, Relation};
use crate::commands::messaging::{window_from_documents, Composer, Messaging};
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::search::{GifPicker, UserSearch};
use crate::state::AppContext;

pub struct ChatSession {
    ctx: Arc<AppContext>,
    me: CurrentUser,

    friends: Friends,
    channels: Channels,
    messaging: Messaging,
    composer: Composer,

    sent: watch::Receiver<Vec<FriendRequest>>,
    received: watch::Receiver<Vec<FriendRequest>>,
    friend_list: watch::Receiver<Vec<FriendEdge>>,
    channel_list: watch::Receiver<Vec<Channel>>,
    subscriptions: Vec<Subscription>,

    messages_tx: Arc<watch::Sender<Vec<Message>>>,
    messages: watch::Receiver<Vec<Message>>,
    message_sub: Option<Subscription>,
    message_generation: Arc<AtomicU64>,
    active_channel: Option<Channel>,
}

impl ChatSession {
    /// Start the per-user subscriptions.  Requires a tokio runtime.
    pub fn start(ctx: Arc<AppContext>, me: CurrentUser) -> Result<Self> {
        let store = ctx.store();
        let paths = ctx.paths().clone();
        let channels = Channels::new(store.clone(), paths.clone());
        let messaging = Messaging::new(store.clone(), paths.clone(), ctx.config().message_window);
        let friends = Friends::new(store.clone(), paths, channels.clone(), messaging.clone());
        let events = ctx.events().clone();

        let mut subscriptions = Vec::new();
        let (sub, sent) = live(
            &store,
            friends.sent_pending_query(&me.uid),
            &events,
            "sent requests",
            decode_all::<FriendRequest>,
        );
        subscriptions.extend(sub);
        let (sub, received) = live(
            &store,
            friends.received_pending_query(&me.uid),
            &events,
            "friend requests",
            decode_all::<FriendRequest>,
        );
        subscriptions.extend(sub);
        let (sub, friend_list) = live(
            &store,
            friends.friends_query(&me.uid),
            &events,
            "friends",
            decode_all::<FriendEdge>,
        );
        subscriptions.extend(sub);
        let (sub, channel_list) = live(
            &store,
            channels.membership_query(&me.uid),
            &events,
            "channels",
            channels_from_documents,
        );
        subscriptions.extend(sub);

        let (messages_tx, messages) = watch::channel(Vec::new());

        Ok(Self {
            ctx,
            me,
            friends,
            channels,
            messaging,
            composer: Composer::new(),
            sent,
            received,
            friend_list,
            channel_list,
            subscriptions,
            messages_tx: Arc::new(messages_tx),
            messages,
            message_sub: None,
            message_generation: Arc::new(AtomicU64::new(0)),
            active_channel: None,
        })
    }

    pub fn me(&self) -> &CurrentUser {
        &self.me
    }

    pub fn events(&self) -> &EventBus {
        self.ctx.events()
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    pub fn sent_requests(&self) -> watch::Receiver<Vec<FriendRequest>> {
        self.sent.clone()
    }

    pub fn received_requests(&self) -> watch::Receiver<Vec<FriendRequest>> {
        self.received.clone()
    }

    pub fn friends(&self) -> watch::Receiver<Vec<FriendEdge>> {
        self.friend_list.clone()
    }

    pub fn channels(&self) -> watch::Receiver<Vec<Channel>> {
        self.channel_list.clone()
    }

    /// Message window of the open channel, oldest first.  Empty while no
    /// channel is open.
    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.clone()
    }

    pub fn active_channel(&self) -> Option<&Channel> {
        self.active_channel.as_ref()
    }

    /// How `target` relates to the signed-in user, from the live lists.
    pub fn relation(&self, target: &UserId) -> Relation {
        classify(target, &self.friend_list.borrow(), &self.sent.borrow())
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn user_search(&self) -> UserSearch {
        UserSearch::new(
            self.ctx.directory(),
            self.me.uid.clone(),
            self.ctx.config().search_debounce,
        )
    }

    pub fn gif_picker(&self) -> GifPicker {
        GifPicker::new(self.ctx.gifs(), self.ctx.config().search_debounce)
    }

    // ------------------------------------------------------------------
    // Friends
    // ------------------------------------------------------------------

    pub async fn send_friend_request(&self, target: &UserId, username: &str) -> Result<Notice> {
        let result = self.friends.send_request(&self.me, target, username).await;
        self.report(result)
    }

    pub async fn accept_request(&self, id: &RequestId) -> Result<Notice> {
        let result = self.friends.accept(&self.me, id).await;
        self.report(result)
    }

    pub async fn decline_request(&self, id: &RequestId) -> Result<Notice> {
        let result = self.friends.decline(&self.me, id).await;
        self.report(result)
    }

    // ------------------------------------------------------------------
    // Channels & messages
    // ------------------------------------------------------------------

    pub async fn create_group(&self, name: &str) -> Result<Channel> {
        let result = self.channels.create_group(&self.me, name).await;
        match &result {
            Ok(channel) => self
                .events()
                .notice(Notice::success(format!("Created {}.", channel.name))),
            Err(e) => self.events().notice(e.notice()),
        }
        result
    }

    /// Open `id`, replacing the previous message subscription.
    ///
    /// Deliveries are stamped with a generation; once a newer channel has
    /// been selected, late deliveries for the old one are ignored.
    pub async fn select_channel(&mut self, id: &ChannelId) -> Result<Channel> {
        let channel = match self.channels.get(id).await {
            Ok(Some(channel)) if channel.is_member(&self.me.uid) => channel,
            Ok(Some(_)) => {
                return self.fail(ClientError::Forbidden(
                    "You are not a member of this channel.".into(),
                ))
            }
            Ok(None) => return self.fail(ClientError::validation("Channel not found.")),
            Err(e) => return self.fail(e),
        };

        let generation = self.message_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.message_sub = None;
        self.messages_tx.send_replace(Vec::new());

        let current = self.message_generation.clone();
        let tx = self.messages_tx.clone();
        let on_change: OnChange = Box::new(move |docs| {
            tx.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *slot = window_from_documents(docs);
                true
            });
        });

        let current = self.message_generation.clone();
        let tx = self.messages_tx.clone();
        let events = self.events().clone();
        let on_error: OnError = Box::new(move |e| {
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            warn!(error = %e, "Message subscription failed");
            tx.send_replace(Vec::new());
            events.notice(Notice::error(format!("Could not load messages: {e}")));
        });

        match self.ctx.store().subscribe(
            self.messaging.window_query(&channel.id),
            on_change,
            on_error,
        ) {
            Ok(sub) => self.message_sub = Some(sub),
            Err(e) => {
                warn!(error = %e, "Could not subscribe to messages");
                self.events()
                    .notice(Notice::error(format!("Could not load messages: {e}")));
            }
        }

        debug!(channel_id = %channel.id, generation, "Channel selected");
        self.composer.set_draft("");
        self.active_channel = Some(channel.clone());
        Ok(channel)
    }

    /// Close the open channel.  No message is delivered afterwards.
    pub fn close_channel(&mut self) {
        self.message_generation.fetch_add(1, Ordering::SeqCst);
        self.message_sub = None;
        self.active_channel = None;
        self.messages_tx.send_replace(Vec::new());
    }

    /// Send `text` to the open channel.  On failure the text stays in the
    /// composer draft.
    pub async fn send_text(&mut self, text: &str) -> Result<Option<Message>> {
        let channel = self.open_channel_id()?;
        self.composer.set_draft(text);
        let result = self
            .composer
            .send_text(&self.messaging, &self.me, &channel)
            .await;
        if let Err(e) = &result {
            self.events().notice(e.notice());
        }
        result
    }

    pub async fn send_gif(&self, url: &str) -> Result<Option<Message>> {
        let channel = self.open_channel_id()?;
        let result = self
            .composer
            .send_gif(&self.messaging, &self.me, &channel, url)
            .await;
        if let Err(e) = &result {
            self.events().notice(e.notice());
        }
        result
    }

    /// Drop every subscription and sign out.
    pub async fn sign_out(mut self) -> Result<()> {
        self.close_channel();
        self.subscriptions.clear();
        let result = self.ctx.identity().sign_out().await;
        self.ctx.events().emit(ClientEvent::AuthChanged(None));
        info!(uid = %self.me.uid, "Session ended");
        result?;
        Ok(())
    }

    fn open_channel_id(&self) -> Result<ChannelId> {
        match &self.active_channel {
            Some(channel) => Ok(channel.id.clone()),
            None => self.fail(ClientError::validation("Open a channel first.")),
        }
    }

    fn report(&self, result: Result<Notice>) -> Result<Notice> {
        match &result {
            Ok(notice) => self.events().notice(notice.clone()),
            Err(e) => self.events().notice(e.notice()),
        }
        result
    }

    fn fail<T>(&self, error: ClientError) -> Result<T> {
        self.events().notice(error.notice());
        Err(error)
    }
}

/// Subscribe to `query`, projecting each delivery into a `watch` value.
///
/// Failures (at setup or later) publish `T::default()` and emit an error
/// notice naming `what`.
fn live<T, F>(
    store: &Arc<dyn DocumentStore>,
    query: Query,
    events: &EventBus,
    what: &'static str,
    project: F,
) -> (Option<Subscription>, watch::Receiver<T>)
where
    T: Default + Send + Sync + 'static,
    F: Fn(Vec<Document>) -> T + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(T::default());
    let tx = Arc::new(tx);

    let change_tx = tx.clone();
    let on_change: OnChange = Box::new(move |docs| {
        change_tx.send_replace(project(docs));
    });

    let error_events = events.clone();
    let on_error: OnError = Box::new(move |e| {
        warn!(what, error = %e, "Live query failed");
        tx.send_replace(T::default());
        error_events.notice(Notice::error(format!("Could not load {what}: {e}")));
    });

    match store.subscribe(query, on_change, on_error) {
        Ok(sub) => (Some(sub), rx),
        Err(e) => {
            warn!(what, error = %e, "Could not start live query");
            events.notice(Notice::error(format!("Could not load {what}: {e}")));
            (None, rx)
        }
    }
}
