use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChannelRef, InboundEvent, MessageId, MessageRef, Peer},
    normalize::LookupKey,
    Result,
};

/// Result of submitting a verification code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeSignIn {
    Authorized,
    PasswordRequired,
}

/// Sequential stream of new-message events for one chat.
///
/// `next()` returning `None` means the transport disconnected; that is the
/// service's "run until disconnected" signal.
pub struct Subscription {
    rx: mpsc::Receiver<InboundEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<InboundEvent>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }
}

/// Hexagonal port for the messaging platform.
///
/// The forwarder only sequences and gates these calls; connection management,
/// wire protocol and delivery ordering belong to the adapter.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;

    async fn is_authorized(&self) -> Result<bool>;
    async fn request_login_code(&self, phone: &str) -> Result<()>;
    /// Rejections surface as `Error::Auth(AuthFailure::CodeRejected(_))`.
    async fn sign_in_with_code(&self, phone: &str, code: &str) -> Result<CodeSignIn>;
    async fn sign_in_with_password(&self, password: &str) -> Result<()>;

    async fn whoami(&self) -> Result<Peer>;
    /// Session token to persist after a successful login, if the platform
    /// issues one.
    async fn export_session(&self) -> Result<Option<String>>;

    async fn resolve(&self, key: &LookupKey) -> Result<Peer>;
    async fn members(&self, chat: &ChannelRef) -> Result<Vec<Peer>>;

    async fn send_message(
        &self,
        chat: &ChannelRef,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    async fn subscribe(&self, chat: &ChannelRef) -> Result<Subscription>;
}
