use std::{env, path::PathBuf, time::Duration};

use crate::config::dotenv_value;

/// Which out-of-band secret the authenticator is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretKind {
    VerificationCode,
    SecondFactor,
}

impl SecretKind {
    pub fn label(self) -> &'static str {
        match self {
            SecretKind::VerificationCode => "verification code",
            SecretKind::SecondFactor => "second-factor password",
        }
    }
}

/// Port for verification input supplied by an operator while the process is
/// already running. Polled, so implementations must be cheap and non-blocking.
pub trait SecretSource: Send + Sync {
    fn get(&self, kind: SecretKind) -> Option<String>;

    /// Where the operator should put the secret, for log instructions.
    fn hint(&self, kind: SecretKind) -> String;

    /// Periodic progress while the authenticator is still waiting. The wait
    /// already logs; sources that can reach the operator another way hook in
    /// here.
    fn still_waiting(&self, _kind: SecretKind, _waited: Duration) {}
}

/// Reads `TELEGRAM_CODE` / `TELEGRAM_PASSWORD` from the process environment,
/// falling back to re-reading the `.env` file on every poll so a value added
/// after startup is picked up.
#[derive(Clone, Debug)]
pub struct EnvSecrets {
    dotenv: PathBuf,
}

impl Default for EnvSecrets {
    fn default() -> Self {
        Self {
            dotenv: PathBuf::from(".env"),
        }
    }
}

impl EnvSecrets {
    pub fn with_dotenv(path: impl Into<PathBuf>) -> Self {
        Self {
            dotenv: path.into(),
        }
    }

    fn key(kind: SecretKind) -> &'static str {
        match kind {
            SecretKind::VerificationCode => "TELEGRAM_CODE",
            SecretKind::SecondFactor => "TELEGRAM_PASSWORD",
        }
    }
}

impl SecretSource for EnvSecrets {
    fn get(&self, kind: SecretKind) -> Option<String> {
        let key = Self::key(kind);
        env::var(key)
            .ok()
            .or_else(|| dotenv_value(&self.dotenv, key))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn hint(&self, kind: SecretKind) -> String {
        format!(
            "set {} in the environment or in {}",
            Self::key(kind),
            self.dotenv.display()
        )
    }
}
