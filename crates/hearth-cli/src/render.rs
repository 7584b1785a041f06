//! Plain-text rendering of client records.

use chrono::{DateTime, Local};

use hearth_client::commands::friends::Relation;
use hearth_shared::{Notice, NoticeLevel};
use hearth_store::{Channel, ChannelKind, FriendRequest, Message, MessageKind};

pub fn notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => " ok ",
        NoticeLevel::Error => "err ",
    };
    format!("[{tag}] {}", notice.text)
}

fn clock(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|at| at.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn message(message: &Message) -> String {
    let at = clock(message.timestamp);
    match message.kind {
        MessageKind::Text => format!("{at} <{}> {}", message.sender_username, message.content),
        MessageKind::Gif => format!("{at} <{}> [gif] {}", message.sender_username, message.content),
        MessageKind::System => format!("{at} * {}", message.content),
    }
}

pub fn channel(channel: &Channel, active: bool) -> String {
    let marker = if active { '>' } else { ' ' };
    let kind = match channel.kind {
        ChannelKind::Dm => "dm",
        ChannelKind::Group => "group",
    };
    format!(
        "{marker} {:<5} {}  ({} members)  {}",
        kind,
        channel.name,
        channel.members.len(),
        channel.id
    )
}

pub fn incoming(request: &FriendRequest) -> String {
    format!("  from {}  id {}", request.sender_username, request.id)
}

pub fn outgoing(request: &FriendRequest) -> String {
    format!("  to {} (pending)", request.receiver_username)
}

pub fn relation(relation: Relation) -> &'static str {
    match relation {
        Relation::Friend => "friend",
        Relation::Pending => "pending",
        Relation::AddFriend => "add friend",
    }
}

#[cfg(test)]
mod tests {
    use hearth_shared::UserId;

    use super::*;

    fn msg(kind: MessageKind, content: &str) -> Message {
        Message {
            id: "m1".into(),
            sender_id: UserId::from("u1"),
            sender_username: "Alpha".into(),
            content: content.into(),
            kind,
            timestamp: 0,
        }
    }

    #[test]
    fn messages_render_by_kind() {
        assert!(message(&msg(MessageKind::Text, "hi")).ends_with("<Alpha> hi"));
        assert!(
            message(&msg(MessageKind::Gif, "https://g/x.gif")).ends_with("[gif] https://g/x.gif")
        );
        assert!(message(&msg(MessageKind::System, "Say hi!")).ends_with("* Say hi!"));
    }

    #[test]
    fn notices_are_tagged() {
        assert_eq!(notice(&Notice::error("nope")), "[err ] nope");
    }
}
