//! Telegram adapter (teloxide).
//!
//! This crate implements the `sigfwd-core` Transport port over the Telegram
//! Bot API. The Bot API authenticates with a pre-issued bot token only, so the
//! phone/code login steps report `AuthFailure::Unsupported`.

use async_trait::async_trait;

use teloxide::{prelude::*, types::Recipient, ApiError, RequestError};

use tokio::{sync::Mutex, time::sleep};
use tracing::{info, warn};

pub mod convert;
pub mod subscription;

use sigfwd_core::{
    config::Credentials,
    domain::{ChannelRef, ChatId, MessageId, MessageRef, Peer},
    errors::{AuthFailure, Error},
    normalize::LookupKey,
    transport::{CodeSignIn, Subscription, Transport},
    Result,
};

use crate::subscription::Listener;

const BOT_TOKEN_SETTING: &str =
    "SESSION_STRING (bot token; the Bot API has no phone login)";
const NO_PHONE_LOGIN: &str =
    "the Bot API has no phone login; put the bot token in SESSION_STRING";

pub struct TelegramTransport {
    bot: Bot,
    listener: Mutex<Option<Listener>>,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
            listener: Mutex::new(None),
        }
    }

    /// Build from configured credentials. A phone number alone cannot log a
    /// bot in, so a missing token is reported as missing configuration before
    /// any request is made.
    pub fn from_credentials(creds: &Credentials) -> Result<Self> {
        match creds.session_token.as_deref() {
            Some(token) => Ok(Self::new(token)),
            None => Err(Error::MissingConfig(vec![BOT_TOKEN_SETTING.to_string()])),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Retries once after a flood-control `RetryAfter`; anything else is
    /// returned to the caller as is.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(secs)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    warn!(retry_after_secs = secs.as_secs(), "flood control; retrying once");
                    sleep(secs).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn connect(&self) -> Result<()> {
        // Bot API calls are stateless HTTPS requests; there is no session to open.
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Ok(());
        };
        listener.stop().await
    }

    async fn is_authorized(&self) -> Result<bool> {
        match self.bot.get_me().await {
            Ok(_) => Ok(true),
            Err(RequestError::Api(ApiError::NotFound)) => Ok(false),
            Err(RequestError::Api(e)) => {
                warn!(error = %e, "getMe rejected; treating the token as unauthorized");
                Ok(false)
            }
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn request_login_code(&self, _phone: &str) -> Result<()> {
        Err(Error::Auth(AuthFailure::Unsupported(NO_PHONE_LOGIN.to_string())))
    }

    async fn sign_in_with_code(&self, _phone: &str, _code: &str) -> Result<CodeSignIn> {
        Err(Error::Auth(AuthFailure::Unsupported(NO_PHONE_LOGIN.to_string())))
    }

    async fn sign_in_with_password(&self, _password: &str) -> Result<()> {
        Err(Error::Auth(AuthFailure::Unsupported(NO_PHONE_LOGIN.to_string())))
    }

    async fn whoami(&self) -> Result<Peer> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        Ok(convert::user_peer(&me.user))
    }

    async fn export_session(&self) -> Result<Option<String>> {
        // The bot token is the session; there is nothing new to hand back.
        Ok(None)
    }

    async fn resolve(&self, key: &LookupKey) -> Result<Peer> {
        let recipient = match key {
            LookupKey::Username(handle) => Recipient::ChannelUsername(format!("@{handle}")),
            LookupKey::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
        };
        let chat = self
            .with_retry(|| self.bot.get_chat(recipient.clone()))
            .await?;
        Ok(convert::chat_peer(&chat))
    }

    async fn members(&self, chat: &ChannelRef) -> Result<Vec<Peer>> {
        // Bots can only enumerate administrators.
        let admins = self
            .with_retry(|| self.bot.get_chat_administrators(Self::tg_chat(chat.id)))
            .await?;
        Ok(admins.iter().map(|m| convert::user_peer(&m.user)).collect())
    }

    async fn send_message(
        &self,
        chat: &ChannelRef,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let req = self.bot.send_message(Self::tg_chat(chat.id), text.to_string());
                match reply_to {
                    Some(id) => req.reply_to_message_id(teloxide::types::MessageId(id.0)),
                    None => req,
                }
            })
            .await?;

        Ok(MessageRef {
            chat_id: chat.id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn subscribe(&self, chat: &ChannelRef) -> Result<Subscription> {
        let mut slot = self.listener.lock().await;
        if slot.is_some() {
            return Err(Error::External(
                "already subscribed; the forwarder listens to one source".to_string(),
            ));
        }
        let (listener, subscription) = subscription::spawn(self.bot.clone(), chat.id);
        *slot = Some(listener);
        info!(chat = %chat.title, "subscribed to new messages");
        Ok(subscription)
    }
}
