use crate::domain::{InboundEvent, SenderFilter};

/// Why an event was not admitted. Not an error: skipped events are dropped
/// without side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Edited,
    UnknownSender,
    SenderMismatch,
    NoText,
    NoMarker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Skip(SkipReason),
}

/// Decides, per event, whether it is a signal from a permitted sender.
#[derive(Clone, Debug)]
pub struct SignalFilter {
    marker: String,
    marker_lower: String,
    sender: SenderFilter,
}

impl SignalFilter {
    pub fn new(marker: impl Into<String>, sender: SenderFilter) -> Self {
        let marker = marker.into();
        let marker_lower = marker.to_lowercase();
        Self {
            marker,
            marker_lower,
            sender,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Checks run in a fixed order and stop at the first failure.
    pub fn check(&self, ev: &InboundEvent) -> Verdict {
        if ev.is_edit() {
            return Verdict::Skip(SkipReason::Edited);
        }
        let Some(sender) = &ev.sender else {
            return Verdict::Skip(SkipReason::UnknownSender);
        };
        if !self.sender.allows(sender.id) {
            return Verdict::Skip(SkipReason::SenderMismatch);
        }
        let Some(text) = ev.text.as_deref().filter(|t| !t.is_empty()) else {
            return Verdict::Skip(SkipReason::NoText);
        };
        if !self.is_signal(text) {
            return Verdict::Skip(SkipReason::NoMarker);
        }
        Verdict::Admit
    }

    /// Prefix match on the trimmed body first (case-sensitive), then a
    /// case-insensitive substring search. Either one admits.
    pub fn is_signal(&self, text: &str) -> bool {
        text.trim().starts_with(&self.marker) || text.to_lowercase().contains(&self.marker_lower)
    }
}
