//! Long-polling listener that feeds the core `Subscription`.

use std::time::Duration;

use chrono::Utc;
use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::Polling,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use sigfwd_core::{domain::InboundEvent, transport::Subscription, Result};

use crate::convert;

const EVENT_BUFFER: usize = 64;
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Which messages reach the subscription: the source chat only, and only
/// those posted after the listener started (unix seconds, Telegram's
/// resolution).
#[derive(Debug, Clone, Copy)]
struct Route {
    chat: i64,
    since: i64,
}

impl Route {
    fn accepts(&self, msg: &Message) -> bool {
        msg.chat.id.0 == self.chat && msg.date.timestamp() >= self.since
    }
}

pub(crate) struct Listener {
    shutdown: ShutdownToken,
    handle: JoinHandle<()>,
}

impl Listener {
    pub(crate) async fn stop(self) -> Result<()> {
        match self.shutdown.shutdown() {
            Ok(done) => {
                done.await;
                if let Err(e) = self.handle.await {
                    warn!(error = %e, "listener task ended abnormally");
                }
            }
            // Not polling yet (or already stopped); nothing to drain.
            Err(_) => self.handle.abort(),
        }
        Ok(())
    }
}

/// Starts polling updates and routes messages from `source` into a fresh
/// subscription. Plain messages, channel posts and their edits are all
/// routed; edits are dropped later by the filter. Updates queued while the
/// forwarder was down are discarded, never replayed.
pub(crate) fn spawn(bot: Bot, source: sigfwd_core::domain::ChatId) -> (Listener, Subscription) {
    let (tx, rx) = mpsc::channel::<InboundEvent>(EVENT_BUFFER);
    let route = Route {
        chat: source.0,
        since: Utc::now().timestamp(),
    };

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(route_message))
        .branch(Update::filter_edited_message().endpoint(route_message))
        .branch(Update::filter_channel_post().endpoint(route_message))
        .branch(Update::filter_edited_channel_post().endpoint(route_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![tx, route])
        .default_handler(|_| async {})
        .build();
    let shutdown = dispatcher.shutdown_token();

    let handle = tokio::spawn(async move {
        let listener = Polling::builder(bot)
            .timeout(POLL_TIMEOUT)
            .drop_pending_updates()
            .delete_webhook()
            .await
            .build();
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("error polling Telegram updates"),
            )
            .await;
        debug!("update dispatcher stopped");
    });

    (Listener { shutdown, handle }, Subscription::new(rx))
}

async fn route_message(
    msg: Message,
    tx: mpsc::Sender<InboundEvent>,
    route: Route,
) -> ResponseResult<()> {
    if !route.accepts(&msg) {
        debug!(message_id = msg.id.0, chat = msg.chat.id.0, "update not routed");
        return Ok(());
    }
    if tx.send(convert::inbound_event(&msg)).await.is_err() {
        debug!(message_id = msg.id.0, "subscription closed; dropping update");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(chat_id: i64, date: i64) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "date": date,
            "chat": { "id": chat_id, "type": "supergroup", "title": "Room" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "text": "hello"
        }))
        .expect("message json")
    }

    #[test]
    fn only_source_chat_is_routed() {
        let route = Route {
            chat: -100,
            since: 1_700_000_000,
        };
        assert!(route.accepts(&message(-100, 1_700_000_000)));
        assert!(!route.accepts(&message(-200, 1_700_000_000)));
    }

    #[test]
    fn backlog_from_before_startup_is_not_routed() {
        let route = Route {
            chat: -100,
            since: 1_700_000_000,
        };
        assert!(!route.accepts(&message(-100, 1_699_999_999)));
        assert!(!route.accepts(&message(-100, 1_600_000_000)));
        assert!(route.accepts(&message(-100, 1_700_000_030)));
    }
}
