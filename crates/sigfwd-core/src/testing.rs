//! In-crate fakes for the transport and secret ports.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use crate::{
    domain::{ChannelRef, ChatId, InboundEvent, MessageId, MessageRef, Peer},
    errors::{AuthFailure, Error},
    normalize::LookupKey,
    secrets::{SecretKind, SecretSource},
    transport::{CodeSignIn, Subscription, Transport},
    Result,
};

#[derive(Clone, Debug)]
pub enum CodeBehavior {
    Accept,
    NeedPassword,
    Reject(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub chat: i64,
    pub text: String,
    pub reply_to: Option<i32>,
}

pub struct FakeTransport {
    pub authorized: AtomicBool,
    pub code: Mutex<CodeBehavior>,
    pub password: Mutex<Option<String>>,
    pub session: Mutex<Option<String>>,
    pub peers: Mutex<HashMap<LookupKey, Peer>>,
    pub members: Mutex<Vec<Peer>>,
    pub failing_chats: Mutex<HashSet<i64>>,
    pub inbound: Mutex<Vec<InboundEvent>>,
    pub hold_open: AtomicBool,
    held: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    sent: Mutex<Vec<Sent>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            authorized: AtomicBool::new(false),
            code: Mutex::new(CodeBehavior::Accept),
            password: Mutex::new(None),
            session: Mutex::new(None),
            peers: Mutex::new(HashMap::new()),
            members: Mutex::new(Vec::new()),
            failing_chats: Mutex::new(HashSet::new()),
            inbound: Mutex::new(Vec::new()),
            hold_open: AtomicBool::new(false),
            held: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn authorized() -> Self {
        let t = Self::default();
        t.authorized.store(true, Ordering::SeqCst);
        t
    }

    pub fn with_peer(self, key: LookupKey, peer: Peer) -> Self {
        self.peers.lock().unwrap().insert(key, peer);
        self
    }

    /// Source `@source` (id -100) and target `@target` (id -200).
    pub fn with_channels(self) -> Self {
        self.with_peer(LookupKey::Username("source".into()), channel_peer(-100, "Source Room"))
            .with_peer(LookupKey::Username("target".into()), channel_peer(-200, "Target Room"))
    }

    pub fn fail_sends_to(&self, chat: i64) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    pub fn push_event(&self, ev: InboundEvent) {
        self.inbound.lock().unwrap().push(ev);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<()> {
        self.record("connect");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        self.held.lock().unwrap().take();
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool> {
        self.record("is_authorized");
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn request_login_code(&self, phone: &str) -> Result<()> {
        self.record(format!("request_code:{phone}"));
        Ok(())
    }

    async fn sign_in_with_code(&self, _phone: &str, code: &str) -> Result<CodeSignIn> {
        self.record(format!("sign_in_code:{code}"));
        match self.code.lock().unwrap().clone() {
            CodeBehavior::Accept => {
                self.authorized.store(true, Ordering::SeqCst);
                Ok(CodeSignIn::Authorized)
            }
            CodeBehavior::NeedPassword => Ok(CodeSignIn::PasswordRequired),
            CodeBehavior::Reject(why) => Err(Error::Auth(AuthFailure::CodeRejected(why))),
        }
    }

    async fn sign_in_with_password(&self, password: &str) -> Result<()> {
        self.record("sign_in_password");
        if self.password.lock().unwrap().as_deref() == Some(password) {
            self.authorized.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(Error::External("PASSWORD_HASH_INVALID".to_string()))
        }
    }

    async fn whoami(&self) -> Result<Peer> {
        self.record("whoami");
        Ok(Peer {
            id: 1,
            username: Some("forwarder".into()),
            first_name: Some("Relay".into()),
            ..Peer::default()
        })
    }

    async fn export_session(&self) -> Result<Option<String>> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn resolve(&self, key: &LookupKey) -> Result<Peer> {
        self.record(format!("resolve:{key}"));
        self.peers
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::External(format!("no entity for {key}")))
    }

    async fn members(&self, chat: &ChannelRef) -> Result<Vec<Peer>> {
        self.record(format!("members:{}", chat.id.0));
        Ok(self.members.lock().unwrap().clone())
    }

    async fn send_message(
        &self,
        chat: &ChannelRef,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.record(format!("send:{}", chat.id.0));
        if self.failing_chats.lock().unwrap().contains(&chat.id.0) {
            return Err(Error::External("CHAT_WRITE_FORBIDDEN".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            chat: chat.id.0,
            text: text.to_string(),
            reply_to: reply_to.map(|m| m.0),
        });
        Ok(MessageRef {
            chat_id: chat.id,
            message_id: MessageId(1000 + sent.len() as i32),
        })
    }

    async fn subscribe(&self, chat: &ChannelRef) -> Result<Subscription> {
        self.record(format!("subscribe:{}", chat.id.0));
        let events = std::mem::take(&mut *self.inbound.lock().unwrap());
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for ev in events {
            let _ = tx.try_send(ev);
        }
        if self.hold_open.load(Ordering::SeqCst) {
            *self.held.lock().unwrap() = Some(tx);
        }
        Ok(Subscription::new(rx))
    }
}

/// Secrets fixed up front; `None` models an operator who never answers.
#[derive(Default)]
pub struct StaticSecrets {
    pub code: Option<String>,
    pub password: Option<String>,
}

impl SecretSource for StaticSecrets {
    fn get(&self, kind: SecretKind) -> Option<String> {
        match kind {
            SecretKind::VerificationCode => self.code.clone(),
            SecretKind::SecondFactor => self.password.clone(),
        }
    }

    fn hint(&self, kind: SecretKind) -> String {
        format!("test {}", kind.label())
    }
}

pub fn channel_peer(id: i64, title: &str) -> Peer {
    Peer {
        id,
        title: Some(title.to_string()),
        ..Peer::default()
    }
}

pub fn user_peer(id: i64, username: &str) -> Peer {
    Peer {
        id,
        username: Some(username.to_string()),
        first_name: Some("Test".to_string()),
        ..Peer::default()
    }
}

pub fn channel(id: i64, title: &str) -> ChannelRef {
    ChannelRef {
        handle: title.to_lowercase(),
        id: ChatId(id),
        title: title.to_string(),
    }
}

pub fn event(id: i32, sender: Option<Peer>, text: Option<&str>) -> InboundEvent {
    InboundEvent {
        message_id: MessageId(id),
        chat_id: ChatId(-100),
        sender,
        text: text.map(|t| t.to_string()),
        edit_date: None,
        date: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
    }
}
