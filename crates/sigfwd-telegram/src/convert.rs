//! Conversions from teloxide types into core domain types.

use teloxide::types::{Chat, Message, User};

use sigfwd_core::domain::{ChatId, InboundEvent, MessageId, Peer};

pub fn user_peer(user: &User) -> Peer {
    Peer {
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        title: None,
    }
}

pub fn chat_peer(chat: &Chat) -> Peer {
    Peer {
        id: chat.id.0,
        username: chat.username().map(str::to_string),
        first_name: chat.first_name().map(str::to_string),
        last_name: chat.last_name().map(str::to_string),
        title: chat.title().map(str::to_string),
    }
}

/// Channel posts carry no user; the posting chat stands in as the sender.
pub fn inbound_event(msg: &Message) -> InboundEvent {
    let sender = msg
        .from()
        .map(user_peer)
        .or_else(|| msg.sender_chat().map(chat_peer));

    InboundEvent {
        message_id: MessageId(msg.id.0),
        chat_id: ChatId(msg.chat.id.0),
        sender,
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        edit_date: msg.edit_date().copied(),
        date: msg.date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> Message {
        serde_json::from_value(value).expect("message json")
    }

    #[test]
    fn group_message_uses_author_as_sender() {
        let msg = parse(serde_json::json!({
            "message_id": 5,
            "date": 1_700_000_000,
            "chat": { "id": -100123, "type": "supergroup", "title": "Signals" },
            "from": {
                "id": 42,
                "is_bot": false,
                "first_name": "Ann",
                "last_name": "Lee",
                "username": "ann"
            },
            "text": "🔔 NEW SIGNAL! EUR/USD"
        }));

        let ev = inbound_event(&msg);
        assert_eq!(ev.message_id, MessageId(5));
        assert_eq!(ev.chat_id, ChatId(-100123));
        assert_eq!(ev.text.as_deref(), Some("🔔 NEW SIGNAL! EUR/USD"));
        assert!(!ev.is_edit());

        let sender = ev.sender.expect("sender");
        assert_eq!(sender.id, 42);
        assert_eq!(sender.display_name(), "@ann");
        assert_eq!(sender.last_name.as_deref(), Some("Lee"));
    }

    #[test]
    fn edited_message_keeps_edit_date() {
        let msg = parse(serde_json::json!({
            "message_id": 6,
            "date": 1_700_000_000,
            "edit_date": 1_700_000_060,
            "chat": { "id": -100123, "type": "supergroup", "title": "Signals" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
            "text": "fixed typo"
        }));

        assert!(inbound_event(&msg).is_edit());
    }

    #[test]
    fn channel_post_falls_back_to_sender_chat() {
        let msg = parse(serde_json::json!({
            "message_id": 9,
            "date": 1_700_000_000,
            "chat": { "id": -100555, "type": "channel", "title": "Alerts", "username": "alerts" },
            "sender_chat": { "id": -100555, "type": "channel", "title": "Alerts", "username": "alerts" },
            "text": "hello"
        }));

        let sender = inbound_event(&msg).sender.expect("sender");
        assert_eq!(sender.id, -100555);
        assert_eq!(sender.title.as_deref(), Some("Alerts"));
        assert_eq!(sender.username.as_deref(), Some("alerts"));
    }

    #[test]
    fn chat_peer_maps_private_chat_names() {
        let msg = parse(serde_json::json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": { "id": 77, "type": "private", "first_name": "Bo", "last_name": "Diaz" },
            "from": { "id": 77, "is_bot": false, "first_name": "Bo" },
            "text": "hi"
        }));

        let peer = chat_peer(&msg.chat);
        assert_eq!(peer.id, 77);
        assert_eq!(peer.first_name.as_deref(), Some("Bo"));
        assert_eq!(peer.display_name(), "Bo Diaz");
        assert!(peer.title.is_none());
    }
}
