/// Core error type for the forwarder.
///
/// Adapter crates map their specific errors into this type so the lifecycle
/// controller can tell startup-fatal failures from per-event ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("missing required configuration:\n{}", bullet_list(.0))]
    MissingConfig(Vec<String>),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    #[error("could not resolve {what} `{reference}`: {reason}")]
    Resolution {
        what: &'static str,
        reference: String,
        reason: String,
    },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

/// Why the authenticator ended in the `Failed` state.
///
/// None of these are permanent: a fresh run with a new code or secret
/// supplied out-of-band starts the handshake over.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no verification code was supplied before the wait timed out")]
    CodeTimeout,

    #[error("verification code is too short (need at least {} digits)", crate::auth::MIN_CODE_DIGITS)]
    CodeTooShort,

    #[error("verification code was rejected: {0}")]
    CodeRejected(String),

    #[error("a second-factor password is required but none was supplied")]
    SecondFactorMissing,

    #[error("second-factor password was rejected: {0}")]
    SecondFactorRejected(String),

    #[error("the pre-issued session is not authorized and no phone number is configured")]
    SessionRejected,

    #[error("transport does not support this login step: {0}")]
    Unsupported(String),

    #[error("transport error during login: {0}")]
    Transport(String),

    #[error("cancelled while waiting for verification input")]
    Cancelled,
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("  - {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_lists_one_name_per_line() {
        let err = Error::MissingConfig(vec!["API_ID".to_string(), "API_HASH".to_string()]);
        assert_eq!(
            err.to_string(),
            "missing required configuration:\n  - API_ID\n  - API_HASH"
        );
    }

    #[test]
    fn auth_failure_converts_into_error() {
        let err: Error = AuthFailure::CodeTimeout.into();
        assert!(matches!(err, Error::Auth(AuthFailure::CodeTimeout)));
    }
}
