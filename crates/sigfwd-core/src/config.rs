use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{auth::AuthTiming, errors::Error, Result};

pub const DEFAULT_SIGNAL_HEADER: &str = "🔔 NEW SIGNAL!";
pub const DEFAULT_SIGNAL_PAIRS: &[&str] = &[
    "EUR/USD", "GBP/USD", "USD/JPY", "USD/CHF", "AUD/USD", "USD/CAD", "NZD/USD", "EUR/GBP",
    "EUR/JPY", "GBP/JPY",
];

/// Credentials handed to the authenticator.
///
/// Either a pre-issued `session_token` or a `phone_number` must be present.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub api_id: i64,
    pub api_hash: String,
    pub phone_number: Option<String>,
    pub session_token: Option<String>,
}

/// Typed, immutable configuration. Built once at startup and passed into each
/// component at construction.
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,

    // Routing
    pub source_reference: String,
    pub target_reference: String,
    pub source_username: Option<String>,
    pub source_user_id: Option<i64>,

    // Detection
    pub signal_header: String,
    pub signal_pairs: Vec<String>,

    // Behavior flags
    pub add_timestamp: bool,
    pub send_confirmation: bool,
    pub forward_delay: Duration,

    // Login
    pub auth_timing: AuthTiming,
    pub session_file: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment, after merging a `.env` file from
    /// the working directory (existing variables win).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. All missing required names are
    /// collected before failing.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).and_then(non_empty);

        let mut missing = Vec::new();
        let mut require = |key: &'static str| {
            let v = var(key);
            if v.is_none() {
                missing.push(key.to_string());
            }
            v.unwrap_or_default()
        };

        let api_id = require("API_ID");
        let api_hash = require("API_HASH");
        let source_reference = require("SOURCE_GROUP_URL");
        let target_reference = require("TARGET_GROUP_URL");

        let phone_number = var("PHONE_NUMBER");
        let session_token = var("SESSION_STRING");
        if phone_number.is_none() && session_token.is_none() {
            missing.push("PHONE_NUMBER (or SESSION_STRING)".to_string());
        }

        if !missing.is_empty() {
            return Err(Error::MissingConfig(missing));
        }

        let api_id = parse_int::<i64>("API_ID", &api_id)?;

        let source_username = var("SOURCE_USERNAME");
        let source_user_id = var("SOURCE_USER_ID")
            .map(|v| parse_int::<i64>("SOURCE_USER_ID", &v))
            .transpose()?;

        // An empty marker would admit every message.
        let signal_header = match get("SIGNAL_HEADER") {
            None => DEFAULT_SIGNAL_HEADER.to_string(),
            Some(v) if v.trim().is_empty() => {
                return Err(Error::Config("SIGNAL_HEADER must not be empty".to_string()))
            }
            Some(v) => v,
        };
        let signal_pairs = var("SIGNAL_PAIRS")
            .map(|v| parse_csv_upper(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNAL_PAIRS.iter().map(|s| s.to_string()).collect());

        let add_timestamp = var("ADD_TIMESTAMP").map(|v| parse_bool(&v)).unwrap_or(true);
        let send_confirmation = var("SEND_CONFIRMATION")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);
        let forward_delay = Duration::from_secs(secs(&var, "FORWARD_DELAY", 0)?);

        let defaults = AuthTiming::default();
        let auth_timing = AuthTiming {
            timeout: Duration::from_secs(secs(&var, "CODE_WAIT_TIMEOUT", defaults.timeout.as_secs())?),
            poll_interval: Duration::from_secs(
                secs(&var, "CODE_POLL_INTERVAL", defaults.poll_interval.as_secs())?.max(1),
            ),
            progress_interval: Duration::from_secs(
                secs(&var, "CODE_PROGRESS_INTERVAL", defaults.progress_interval.as_secs())?
                    .max(1),
            ),
        };
        let session_file = var("SESSION_FILE").map(PathBuf::from);

        Ok(Self {
            credentials: Credentials {
                api_id,
                api_hash,
                phone_number,
                session_token,
            },
            source_reference,
            target_reference,
            source_username,
            source_user_id,
            signal_header,
            signal_pairs,
            add_timestamp,
            send_confirmation,
            forward_delay,
            auth_timing,
            session_file,
        })
    }

    /// Human-readable sender filter setting, for banners and notices.
    pub fn sender_setting(&self) -> String {
        match (&self.source_username, self.source_user_id) {
            (Some(u), _) => u.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "Any user".to_string(),
        }
    }
}

fn secs(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    var(key)
        .map(|v| parse_int::<u64>(key, &v))
        .transpose()
        .map(|v| v.unwrap_or(default))
}

fn parse_int<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got `{raw}`")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_upper(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    for (key, val) in read_dotenv(path) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

/// Look up a single key in a `.env` file, re-reading it on every call.
pub(crate) fn dotenv_value(path: &Path, key: &str) -> Option<String> {
    read_dotenv(path)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

fn read_dotenv(path: &Path) -> Vec<(String, String)> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}
