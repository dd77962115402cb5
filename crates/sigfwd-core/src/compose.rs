use chrono::{DateTime, Utc};

use crate::extract::SignalDetails;

pub const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━";

/// Builds the outbound text: optional header, optional summary, then the
/// original body verbatim. Sent as plain text, so the body needs no escaping.
#[derive(Clone, Debug)]
pub struct MessageComposer {
    add_timestamp: bool,
    source_title: String,
}

impl MessageComposer {
    pub fn new(add_timestamp: bool, source_title: impl Into<String>) -> Self {
        Self {
            add_timestamp,
            source_title: source_title.into(),
        }
    }

    pub fn compose(
        &self,
        body: &str,
        sender_name: &str,
        details: &SignalDetails,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = String::new();
        if self.add_timestamp {
            out.push_str(&self.header(sender_name, now));
        }
        if let Some(summary) = summary(details) {
            out.push_str(&summary);
        }
        out.push_str(body);
        out
    }

    fn header(&self, sender_name: &str, now: DateTime<Utc>) -> String {
        format!(
            "📡 SIGNAL FORWARDED\n🕒 {}\n👤 Source: {sender_name}\n📊 From: {}\n{DIVIDER}\n\n",
            format_utc(now),
            self.source_title
        )
    }
}

/// `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn summary(d: &SignalDetails) -> Option<String> {
    if d.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    if let Some(pair) = &d.pair {
        lines.push(format!("💱 Pair: {pair}"));
    }
    if let Some(dir) = d.direction {
        lines.push(format!("{} Direction: {}", dir.indicator(), dir.as_str()));
    }
    if let Some(entry) = &d.entry_time {
        lines.push(format!("⏰ Entry: {entry}"));
    }
    for f in &d.follow_ups {
        lines.push(format!("↪️ {}", f.text));
    }
    Some(format!("{}\n\n", lines.join("\n")))
}
