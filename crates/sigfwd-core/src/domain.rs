use chrono::{DateTime, Utc};

/// Platform chat id (numeric; channels and supergroups are negative).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Platform message id (numeric, unique within a chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Anything the platform can hand back for an identifier: a user, a group or a
/// channel. Only the fields the forwarder needs are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Peer {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
}

impl Peer {
    /// Display name precedence: `@handle`, then first + last name, then the
    /// chat title, then `Unknown`.
    pub fn display_name(&self) -> String {
        if let Some(u) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{u}");
        }
        if let Some(first) = self.first_name.as_deref().filter(|f| !f.is_empty()) {
            return match self.last_name.as_deref().filter(|l| !l.is_empty()) {
                Some(last) => format!("{first} {last}"),
                None => first.to_string(),
            };
        }
        if let Some(t) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return t.to_string();
        }
        "Unknown".to_string()
    }
}

/// A resolved channel: the canonical handle it was looked up by plus what the
/// platform reported for it. Immutable for the process lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub handle: String,
    pub id: ChatId,
    pub title: String,
}

impl ChannelRef {
    pub fn from_peer(handle: &str, peer: &Peer) -> Self {
        let title = peer
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| peer.display_name());
        Self {
            handle: handle.to_string(),
            id: ChatId(peer.id),
            title,
        }
    }
}

/// Which senders may trigger a forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SenderFilter {
    Any,
    Only { id: i64, display_name: String },
}

impl SenderFilter {
    pub fn allows(&self, sender_id: i64) -> bool {
        match self {
            SenderFilter::Any => true,
            SenderFilter::Only { id, .. } => *id == sender_id,
        }
    }
}

/// One new-message event from the source channel.
#[derive(Clone, Debug)]
pub struct InboundEvent {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub sender: Option<Peer>,
    pub text: Option<String>,
    pub edit_date: Option<DateTime<Utc>>,
    pub date: DateTime<Utc>,
}

impl InboundEvent {
    pub fn is_edit(&self) -> bool {
        self.edit_date.is_some()
    }
}
