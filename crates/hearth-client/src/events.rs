//! Client events for the presentation layer.

use tokio::sync::broadcast;

use hearth_shared::Notice;

use crate::identity::AuthUser;

/// Capacity of the event channel.  Slow listeners miss the oldest events.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A transient, user-visible notice.
    Notice(Notice),
    /// Signed in (`Some`) or signed out (`None`).
    AuthChanged(Option<AuthUser>),
}

/// Broadcasts [`ClientEvent`]s to any number of listeners.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event.  Having no listener is fine.
    pub fn emit(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event dropped, no listener");
        }
    }

    pub fn notice(&self, notice: Notice) {
        self.emit(ClientEvent::Notice(notice));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
