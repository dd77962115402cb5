//! Startup, run loop and shutdown.

use std::{path::Path, sync::Arc};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    auth::{Authenticator, LoginKind},
    compose::{format_utc, MessageComposer},
    config::Config,
    dispatch::ForwardingDispatcher,
    domain::SenderFilter,
    errors::Error,
    extract::FieldExtractor,
    filter::SignalFilter,
    pipeline::SignalPipeline,
    resolve::{resolve_entities, ResolvedEntities},
    secrets::SecretSource,
    transport::Transport,
    Result,
};

/// Owns the transport for one process run.
pub struct Forwarder {
    cfg: Arc<Config>,
    transport: Arc<dyn Transport>,
    secrets: Arc<dyn SecretSource>,
}

impl Forwarder {
    pub fn new(
        cfg: Arc<Config>,
        transport: Arc<dyn Transport>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            cfg,
            transport,
            secrets,
        }
    }

    /// Run until `cancel` fires or the transport disconnects. The transport is
    /// disconnected exactly once on every exit path, and no event is handled
    /// after that.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.log_configuration();

        let result = self.run_connected(&cancel).await;
        if let Err(e) = &result {
            error!(error = %e, "forwarder stopped with an error");
        }
        self.shutdown().await;
        result
    }

    async fn run_connected(&self, cancel: &CancellationToken) -> Result<()> {
        info!("connecting to Telegram");
        self.transport.connect().await?;

        let authenticator = Authenticator::for_credentials(
            &self.cfg.credentials,
            self.secrets.clone(),
            self.cfg.auth_timing,
        );
        let login = match authenticator.run(self.transport.as_ref(), cancel).await {
            Ok(login) => login,
            Err(e) => {
                if let Error::Auth(reason) = &e {
                    error!(%reason, "login did not complete; supply a fresh code and restart");
                }
                return Err(e);
            }
        };

        match self.transport.whoami().await {
            Ok(me) => info!(user = %me.display_name(), "logged in"),
            Err(e) => warn!(error = %e, "could not fetch own identity"),
        }
        if login == LoginKind::Interactive {
            self.persist_session().await;
        }

        let entities = resolve_entities(self.transport.as_ref(), &self.cfg).await?;
        let pipeline = self.build_pipeline(&entities)?;

        let mut subscription = self.transport.subscribe(&entities.source).await?;
        self.send_startup_notice(&entities).await;
        info!(
            source = %entities.source.title,
            target_chat = %entities.target.title,
            marker = %self.cfg.signal_header,
            "now listening for signals"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("received shutdown signal");
                    break;
                }
                ev = subscription.next() => ev,
            };
            let Some(ev) = next else {
                warn!("transport disconnected");
                break;
            };
            // Not raced against `cancel`: a started forward runs to completion.
            pipeline.handle(ev, cancel).await;
        }
        Ok(())
    }

    fn build_pipeline(&self, entities: &ResolvedEntities) -> Result<SignalPipeline> {
        let cfg = &self.cfg;
        Ok(SignalPipeline::new(
            SignalFilter::new(cfg.signal_header.clone(), entities.sender.clone()),
            FieldExtractor::new(&cfg.signal_pairs)?,
            MessageComposer::new(cfg.add_timestamp, entities.source.title.clone()),
            ForwardingDispatcher::new(
                self.transport.clone(),
                entities.source.clone(),
                entities.target.clone(),
                cfg.forward_delay,
                cfg.send_confirmation,
            ),
        ))
    }

    async fn send_startup_notice(&self, entities: &ResolvedEntities) {
        let text = startup_notice(&self.cfg.signal_header, entities);
        match self
            .transport
            .send_message(&entities.target, &text, None)
            .await
        {
            Ok(_) => info!("startup notification sent to target channel"),
            Err(e) => warn!(error = %e, "could not send startup notification"),
        }
    }

    async fn persist_session(&self) {
        let Some(path) = &self.cfg.session_file else {
            return;
        };
        let token = match self.transport.export_session().await {
            Ok(Some(t)) => t,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not export session");
                return;
            }
        };
        if let Err(e) = write_private(path, &token).await {
            warn!(path = %path.display(), error = %e, "could not write session file");
            return;
        }
        info!(path = %path.display(), "session saved; set SESSION_STRING from it to skip login next time");
    }

    async fn shutdown(&self) {
        info!("stopping signal forwarder");
        match self.transport.disconnect().await {
            Ok(()) => info!("disconnected from Telegram"),
            Err(e) => error!(error = %e, "error disconnecting"),
        }
    }

    fn log_configuration(&self) {
        let cfg = &self.cfg;
        info!(
            source = %cfg.source_reference,
            target_chat = %cfg.target_reference,
            sender = %cfg.sender_setting(),
            marker = %cfg.signal_header,
            add_timestamp = cfg.add_timestamp,
            send_confirmation = cfg.send_confirmation,
            forward_delay_secs = cfg.forward_delay.as_secs(),
            "current configuration"
        );
    }
}

/// Write a secret readable by the owner only. The mode is set at creation and
/// re-applied to a file that already existed with wider permissions, before
/// any content is written.
async fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut opts = tokio::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);

    let mut file = opts.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

fn startup_notice(marker: &str, entities: &ResolvedEntities) -> String {
    let sender = match &entities.sender {
        SenderFilter::Any => "Any user",
        SenderFilter::Only { display_name, .. } => display_name.as_str(),
    };
    format!(
        "✅ SIGNAL FORWARDER STARTED\n\n\
         🕒 Started at: {}\n\
         📡 Status: ACTIVE & MONITORING\n\
         🎯 Looking for: '{marker}'\n\
         👤 From user: {sender}\n\
         📨 Forwarding to: {}\n\n\
         🔔 Ready to forward signals!",
        format_utc(Utc::now()),
        entities.target.title
    )
}
