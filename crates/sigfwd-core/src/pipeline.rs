use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    compose::MessageComposer,
    dispatch::{Delivery, ForwardingDispatcher},
    domain::{InboundEvent, MessageRef},
    extract::FieldExtractor,
    filter::{SignalFilter, SkipReason, Verdict},
};

const PREVIEW_CHARS: usize = 150;

/// Result of pushing one event through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Forwarded(MessageRef),
    Abandoned,
    Failed(String),
}

/// Filter → extract → compose → dispatch for a single event. Every failure is
/// contained here; nothing propagates to the subscription loop.
pub struct SignalPipeline {
    filter: SignalFilter,
    extractor: FieldExtractor,
    composer: MessageComposer,
    dispatcher: ForwardingDispatcher,
}

impl SignalPipeline {
    pub fn new(
        filter: SignalFilter,
        extractor: FieldExtractor,
        composer: MessageComposer,
        dispatcher: ForwardingDispatcher,
    ) -> Self {
        Self {
            filter,
            extractor,
            composer,
            dispatcher,
        }
    }

    pub async fn handle(&self, ev: InboundEvent, cancel: &CancellationToken) -> Outcome {
        if let Verdict::Skip(reason) = self.filter.check(&ev) {
            debug!(message_id = ev.message_id.0, ?reason, "event skipped");
            return Outcome::Skipped(reason);
        }
        // Admitted events always carry a sender and text.
        let (Some(sender), Some(text)) = (ev.sender.as_ref(), ev.text.as_deref()) else {
            return Outcome::Skipped(SkipReason::NoText);
        };

        let sender_name = sender.display_name();
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        info!(
            message_id = ev.message_id.0,
            sender = %sender_name,
            preview = %preview,
            "new signal detected"
        );

        let details = self.extractor.extract(text);
        if !details.is_empty() {
            debug!(?details, "extracted signal fields");
        }
        let composed = self
            .composer
            .compose(text, &sender_name, &details, Utc::now());

        match self.dispatcher.dispatch(&composed, ev.message_id, cancel).await {
            Ok(Delivery::Forwarded(sent)) => {
                info!(
                    message_id = ev.message_id.0,
                    forwarded_id = sent.message_id.0,
                    "signal forwarded"
                );
                Outcome::Forwarded(sent)
            }
            Ok(Delivery::Abandoned) => {
                warn!(message_id = ev.message_id.0, "shutdown during delay; signal not forwarded");
                Outcome::Abandoned
            }
            Err(e) => {
                error!(message_id = ev.message_id.0, error = %e, "error forwarding message");
                Outcome::Failed(e.to_string())
            }
        }
    }
}
