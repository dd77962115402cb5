//! Best-effort field mining from free-form signal text.
//!
//! Nothing here fails on input: a field that does not match is simply absent.

use std::sync::OnceLock;

use regex::Regex;

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    /// Polarity marker shown next to the direction.
    pub fn indicator(self) -> &'static str {
        match self {
            Direction::Buy => "🟢",
            Direction::Sell => "🔴",
        }
    }
}

/// One `Level N → time` follow-up entry, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowUp {
    pub level: u32,
    pub time: String,
    /// The entry as it appeared in the message.
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalDetails {
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_time: Option<String>,
    pub follow_ups: Vec<FollowUp>,
}

impl SignalDetails {
    pub fn is_empty(&self) -> bool {
        self.pair.is_none()
            && self.direction.is_none()
            && self.entry_time.is_none()
            && self.follow_ups.is_empty()
    }
}

// H:MM AM/PM, hour 1-2 digits, minutes exactly 2.
const TIME: &str = r"\d{1,2}:\d{2}\s?[AaPp][Mm]";

fn direction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bdirection\s*:?[^\w\n]*\b(buy|sell)\b").expect("valid regex")
    })
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\bentry(?:\s+time)?\s*(?:at)?\s*:?[^\w\n]*\b({TIME})\b"
        ))
        .expect("valid regex")
    })
}

fn level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\blevel\s*(\d+)[^\w\n]*\b({TIME})\b")).expect("valid regex")
    })
}

/// Pulls pair / direction / entry time / follow-up levels out of a body.
#[derive(Clone, Debug)]
pub struct FieldExtractor {
    pair_re: Option<Regex>,
}

impl FieldExtractor {
    /// `pairs` is the fixed list of instrument tokens to recognise, e.g.
    /// `EUR/USD`. Each may be decorated with flag emoji in the message.
    pub fn new(pairs: &[String]) -> Result<Self> {
        let alternatives = pairs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();
        if alternatives.is_empty() {
            return Ok(Self { pair_re: None });
        }
        let pattern = format!(
            r"(?i)(?:[\u{{1F1E6}}-\u{{1F1FF}}]{{2}}\s*)*\b({})\b",
            alternatives.join("|")
        );
        let pair_re = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("invalid SIGNAL_PAIRS pattern: {e}")))?;
        Ok(Self {
            pair_re: Some(pair_re),
        })
    }

    pub fn extract(&self, text: &str) -> SignalDetails {
        let pair = self
            .pair_re
            .as_ref()
            .and_then(|re| re.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase());

        let direction = direction_re()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| {
                if m.as_str().eq_ignore_ascii_case("buy") {
                    Direction::Buy
                } else {
                    Direction::Sell
                }
            });

        let entry_time = entry_re()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let follow_ups = level_re()
            .captures_iter(text)
            .filter_map(|c| {
                let level = c.get(1)?.as_str().parse::<u32>().ok()?;
                Some(FollowUp {
                    level,
                    time: c.get(2)?.as_str().to_string(),
                    text: c.get(0)?.as_str().trim().to_string(),
                })
            })
            .collect();

        SignalDetails {
            pair,
            direction,
            entry_time,
            follow_ups,
        }
    }
}
