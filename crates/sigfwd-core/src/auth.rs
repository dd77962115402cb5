//! Login handshake.
//!
//! Two strategies drive the same `AuthState` machine:
//! - `PreIssuedSession`: the transport was built with a session token; it is
//!   either already authorized or (when a phone is configured) falls through
//!   to the interactive flow.
//! - `InteractiveCode`: request a one-time code, wait for an operator to
//!   supply it out-of-band, optionally complete a second factor.
//!
//! `Failed` is terminal for the run but not permanent: the next process
//! invocation starts from `Unauthenticated` again.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::Credentials,
    errors::{AuthFailure, Error},
    secrets::{SecretKind, SecretSource},
    transport::{CodeSignIn, Transport},
    Result,
};

pub const MIN_CODE_DIGITS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingCode,
    AwaitingSecondFactor,
    Authenticated,
    Failed(AuthFailure),
}

impl AuthState {
    fn can_become(&self, next: &AuthState) -> bool {
        use AuthState::*;
        matches!(
            (self, next),
            (Unauthenticated, Authenticated | AwaitingCode | Failed(_))
                | (AwaitingCode, Authenticated | AwaitingSecondFactor | Failed(_))
                | (AwaitingSecondFactor, Authenticated | Failed(_))
        )
    }
}

/// How the session came to be authorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginKind {
    ExistingSession,
    Interactive,
}

/// Bounds for waiting on out-of-band input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthTiming {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub progress_interval: Duration,
}

impl Default for AuthTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            poll_interval: Duration::from_secs(1),
            progress_interval: Duration::from_secs(30),
        }
    }
}

/// Current handshake state plus every state it passed through.
#[derive(Debug)]
pub struct AuthMachine {
    state: AuthState,
    trail: Vec<AuthState>,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self {
            state: AuthState::Unauthenticated,
            trail: vec![AuthState::Unauthenticated],
        }
    }
}

impl AuthMachine {
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn trail(&self) -> &[AuthState] {
        &self.trail
    }

    fn advance(&mut self, next: AuthState) {
        debug_assert!(
            self.state.can_become(&next),
            "illegal auth transition {:?} -> {next:?}",
            self.state
        );
        info!(from = ?self.state, to = ?next, "auth state changed");
        self.state = next.clone();
        self.trail.push(next);
    }

    /// Move to `Failed` and hand the reason back for propagation.
    fn fail(&mut self, failure: AuthFailure) -> AuthFailure {
        self.advance(AuthState::Failed(failure.clone()));
        failure
    }
}

/// Shared inputs for a strategy run.
pub struct AuthContext<'a> {
    pub secrets: &'a dyn SecretSource,
    pub timing: AuthTiming,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(
        &self,
        transport: &dyn Transport,
        ctx: &AuthContext<'_>,
        machine: &mut AuthMachine,
    ) -> std::result::Result<LoginKind, AuthFailure>;
}

/// Strip separators and enforce the minimum length.
pub fn normalize_code(raw: &str) -> std::result::Result<String, AuthFailure> {
    let code: String = raw
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();
    if code.chars().count() < MIN_CODE_DIGITS {
        return Err(AuthFailure::CodeTooShort);
    }
    Ok(code)
}

fn as_failure(e: Error, otherwise: impl FnOnce(String) -> AuthFailure) -> AuthFailure {
    match e {
        Error::Auth(f) => f,
        other => otherwise(other.to_string()),
    }
}

pub struct InteractiveCode {
    phone: String,
}

impl InteractiveCode {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
        }
    }

    /// The code/second-factor leg, entered from `Unauthenticated`.
    async fn login(
        &self,
        transport: &dyn Transport,
        ctx: &AuthContext<'_>,
        machine: &mut AuthMachine,
    ) -> std::result::Result<LoginKind, AuthFailure> {
        info!("no authorized session; requesting a verification code");
        if let Err(e) = transport.request_login_code(&self.phone).await {
            return Err(machine.fail(as_failure(e, AuthFailure::Transport)));
        }
        machine.advance(AuthState::AwaitingCode);

        let raw = wait_for_secret(ctx, SecretKind::VerificationCode)
            .await
            .map_err(|f| machine.fail(f))?;
        let code = normalize_code(&raw).map_err(|f| machine.fail(f))?;

        match transport.sign_in_with_code(&self.phone, &code).await {
            Ok(CodeSignIn::Authorized) => {
                machine.advance(AuthState::Authenticated);
                Ok(LoginKind::Interactive)
            }
            Ok(CodeSignIn::PasswordRequired) => {
                machine.advance(AuthState::AwaitingSecondFactor);
                let password = wait_for_secret(ctx, SecretKind::SecondFactor)
                    .await
                    .map_err(|f| {
                        machine.fail(match f {
                            AuthFailure::CodeTimeout => AuthFailure::SecondFactorMissing,
                            other => other,
                        })
                    })?;
                if let Err(e) = transport.sign_in_with_password(&password).await {
                    return Err(machine.fail(as_failure(e, AuthFailure::SecondFactorRejected)));
                }
                machine.advance(AuthState::Authenticated);
                Ok(LoginKind::Interactive)
            }
            Err(e) => Err(machine.fail(as_failure(e, AuthFailure::CodeRejected))),
        }
    }
}

#[async_trait]
impl AuthStrategy for InteractiveCode {
    fn name(&self) -> &'static str {
        "interactive-code"
    }

    async fn authenticate(
        &self,
        transport: &dyn Transport,
        ctx: &AuthContext<'_>,
        machine: &mut AuthMachine,
    ) -> std::result::Result<LoginKind, AuthFailure> {
        match transport.is_authorized().await {
            Ok(true) => {
                info!("using existing session (already logged in)");
                machine.advance(AuthState::Authenticated);
                Ok(LoginKind::ExistingSession)
            }
            Ok(false) => self.login(transport, ctx, machine).await,
            Err(e) => Err(machine.fail(as_failure(e, AuthFailure::Transport))),
        }
    }
}

pub struct PreIssuedSession {
    fallback: Option<InteractiveCode>,
}

impl PreIssuedSession {
    pub fn new(fallback: Option<InteractiveCode>) -> Self {
        Self { fallback }
    }
}

#[async_trait]
impl AuthStrategy for PreIssuedSession {
    fn name(&self) -> &'static str {
        "pre-issued-session"
    }

    async fn authenticate(
        &self,
        transport: &dyn Transport,
        ctx: &AuthContext<'_>,
        machine: &mut AuthMachine,
    ) -> std::result::Result<LoginKind, AuthFailure> {
        match transport.is_authorized().await {
            Ok(true) => {
                info!("pre-issued session is authorized");
                machine.advance(AuthState::Authenticated);
                Ok(LoginKind::ExistingSession)
            }
            Ok(false) => match &self.fallback {
                Some(interactive) => {
                    warn!("pre-issued session is not authorized; falling back to phone login");
                    interactive.login(transport, ctx, machine).await
                }
                None => Err(machine.fail(AuthFailure::SessionRejected)),
            },
            Err(e) => Err(machine.fail(as_failure(e, AuthFailure::Transport))),
        }
    }
}

/// Poll the secret source every `poll_interval` until a value shows up, the
/// timeout elapses (`CodeTimeout`) or the run is cancelled (`Cancelled`).
async fn wait_for_secret(
    ctx: &AuthContext<'_>,
    kind: SecretKind,
) -> std::result::Result<String, AuthFailure> {
    if let Some(v) = ctx.secrets.get(kind) {
        info!("found {} supplied ahead of time", kind.label());
        return Ok(v);
    }

    let timeout_secs = ctx.timing.timeout.as_secs();
    info!(
        timeout_secs,
        "{} required: {}",
        kind.label(),
        ctx.secrets.hint(kind)
    );

    let started = Instant::now();
    let mut last_progress = started;
    let mut ticker = interval(ctx.timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(AuthFailure::Cancelled),
            _ = ticker.tick() => {}
        }

        if let Some(v) = ctx.secrets.get(kind) {
            info!("{} received", kind.label());
            return Ok(v);
        }

        let waited = started.elapsed();
        if waited >= ctx.timing.timeout {
            warn!(timeout_secs, "no {} supplied in time", kind.label());
            return Err(AuthFailure::CodeTimeout);
        }
        if last_progress.elapsed() >= ctx.timing.progress_interval {
            info!(
                waited_secs = waited.as_secs(),
                timeout_secs,
                "still waiting for {}",
                kind.label()
            );
            ctx.secrets.still_waiting(kind, waited);
            last_progress = Instant::now();
        }
    }
}

/// Picks a strategy from the credentials and runs it.
pub struct Authenticator {
    strategy: Box<dyn AuthStrategy>,
    secrets: Arc<dyn SecretSource>,
    timing: AuthTiming,
}

impl Authenticator {
    pub fn new(
        strategy: Box<dyn AuthStrategy>,
        secrets: Arc<dyn SecretSource>,
        timing: AuthTiming,
    ) -> Self {
        Self {
            strategy,
            secrets,
            timing,
        }
    }

    /// A session token selects the pre-issued strategy (with phone login as
    /// its fallback when a phone is also configured); otherwise interactive.
    pub fn for_credentials(
        creds: &Credentials,
        secrets: Arc<dyn SecretSource>,
        timing: AuthTiming,
    ) -> Self {
        let interactive = creds.phone_number.clone().map(InteractiveCode::new);
        let strategy: Box<dyn AuthStrategy> = match (&creds.session_token, interactive) {
            (Some(_), fallback) => Box::new(PreIssuedSession::new(fallback)),
            (None, Some(interactive)) => Box::new(interactive),
            (None, None) => Box::new(PreIssuedSession::new(None)),
        };
        Self::new(strategy, secrets, timing)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn run(
        &self,
        transport: &dyn Transport,
        cancel: &CancellationToken,
    ) -> Result<LoginKind> {
        let ctx = AuthContext {
            secrets: self.secrets.as_ref(),
            timing: self.timing,
            cancel,
        };
        let mut machine = AuthMachine::default();
        info!(strategy = self.strategy.name(), "authenticating");
        self.strategy
            .authenticate(transport, &ctx, &mut machine)
            .await
            .map_err(Error::Auth)
    }
}
