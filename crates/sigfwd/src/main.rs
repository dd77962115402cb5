use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sigfwd_core::{config::Config, lifecycle::Forwarder, secrets::EnvSecrets, Error};
use sigfwd_telegram::TelegramTransport;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = sigfwd_core::logging::init("sigfwd") {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let (cfg, transport) = match startup() {
        Ok(parts) => parts,
        Err(Error::MissingConfig(names)) => {
            error!("missing required configuration:");
            for name in &names {
                error!("  - {name}");
            }
            anyhow::bail!("startup aborted: {} required setting(s) missing", names.len());
        }
        Err(e) => return Err(e).context("invalid configuration"),
    };
    let secrets = Arc::new(EnvSecrets::default());

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    Forwarder::new(cfg, transport, secrets)
        .run(cancel)
        .await
        .context("signal forwarder failed")
}

/// Everything that must be valid before the transport exists.
fn startup() -> sigfwd_core::Result<(Arc<Config>, Arc<TelegramTransport>)> {
    let cfg = Config::load()?;
    let transport = TelegramTransport::from_credentials(&cfg.credentials)?;
    Ok((Arc::new(cfg), Arc::new(transport)))
}

fn cancel_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
