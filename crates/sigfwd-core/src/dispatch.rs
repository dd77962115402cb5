use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    domain::{ChannelRef, MessageId, MessageRef},
    errors::Error,
    transport::Transport,
    Result,
};

/// What happened to one admitted signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Forwarded(MessageRef),
    /// Cancelled during the pacing delay, before anything was sent.
    Abandoned,
}

/// Sends composed messages to the target and optionally acknowledges them in
/// the source.
pub struct ForwardingDispatcher {
    transport: Arc<dyn Transport>,
    source: ChannelRef,
    target: ChannelRef,
    delay: Duration,
    send_confirmation: bool,
}

impl ForwardingDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        source: ChannelRef,
        target: ChannelRef,
        delay: Duration,
        send_confirmation: bool,
    ) -> Self {
        Self {
            transport,
            source,
            target,
            delay,
            send_confirmation,
        }
    }

    /// The delay is pacing, not retry. Once the send starts it is not
    /// interrupted; a failed send is reported once and never retried here.
    pub async fn dispatch(
        &self,
        text: &str,
        original: MessageId,
        cancel: &CancellationToken,
    ) -> Result<Delivery> {
        if !self.delay.is_zero() {
            info!(delay_secs = self.delay.as_secs(), "waiting before forwarding");
            tokio::select! {
                _ = cancel.cancelled() => return Ok(Delivery::Abandoned),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        info!(chat = %self.target.title, "forwarding signal");
        let sent = self
            .transport
            .send_message(&self.target, text, None)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;

        if self.send_confirmation {
            self.confirm(original).await;
        }
        Ok(Delivery::Forwarded(sent))
    }

    async fn confirm(&self, original: MessageId) {
        let text = format!("✅ Signal forwarded to {}", self.target.title);
        match self
            .transport
            .send_message(&self.source, &text, Some(original))
            .await
        {
            Ok(_) => info!("sent confirmation to source channel"),
            Err(e) => warn!(error = %e, "could not send confirmation"),
        }
    }
}
