use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{ChannelRef, Peer, SenderFilter},
    errors::Error,
    normalize::{canonical_handle, LookupKey},
    transport::Transport,
    Result,
};

/// Everything the pipeline needs to know about who is who.
#[derive(Clone, Debug)]
pub struct ResolvedEntities {
    pub source: ChannelRef,
    pub target: ChannelRef,
    pub sender: SenderFilter,
}

/// Resolve source and target (both fatal on failure) and the optional sender
/// filter (falls back to any sender).
pub async fn resolve_entities(transport: &dyn Transport, cfg: &Config) -> Result<ResolvedEntities> {
    let source = resolve_channel(transport, "source channel", &cfg.source_reference).await?;
    let target = resolve_channel(transport, "target channel", &cfg.target_reference).await?;

    let sender_key = cfg
        .source_username
        .as_deref()
        .and_then(LookupKey::from_reference)
        .or(cfg.source_user_id.map(LookupKey::Id));
    let sender = resolve_sender(transport, &source, sender_key).await;

    Ok(ResolvedEntities {
        source,
        target,
        sender,
    })
}

pub async fn resolve_channel(
    transport: &dyn Transport,
    what: &'static str,
    reference: &str,
) -> Result<ChannelRef> {
    let resolution_error = |reason: String| Error::Resolution {
        what,
        reference: reference.to_string(),
        reason,
    };

    let key = LookupKey::from_reference(reference)
        .ok_or_else(|| resolution_error("reference is empty".to_string()))?;
    info!(%key, "finding {what}");

    let peer = transport
        .resolve(&key)
        .await
        .map_err(|e| resolution_error(e.to_string()))?;
    let channel = ChannelRef::from_peer(&canonical_handle(reference), &peer);
    info!(title = %channel.title, id = channel.id.0, "{what} found");
    Ok(channel)
}

/// Never fails: anything unresolvable means "any sender".
pub async fn resolve_sender(
    transport: &dyn Transport,
    source: &ChannelRef,
    key: Option<LookupKey>,
) -> SenderFilter {
    let Some(key) = key else {
        info!("will forward signals from any user in the source channel");
        return SenderFilter::Any;
    };

    info!(%key, "finding specific user");
    let found = match transport.resolve(&key).await {
        Ok(peer) => Some(peer),
        Err(e) => {
            warn!(%key, error = %e, "direct lookup failed; scanning source channel members");
            scan_members(transport, source, &key).await
        }
    };

    match found {
        Some(peer) => {
            let display_name = peer.display_name();
            info!(user = %display_name, id = peer.id, "specific user found");
            SenderFilter::Only {
                id: peer.id,
                display_name,
            }
        }
        None => {
            warn!(%key, "could not find user; will forward signals from any user");
            SenderFilter::Any
        }
    }
}

async fn scan_members(
    transport: &dyn Transport,
    source: &ChannelRef,
    key: &LookupKey,
) -> Option<Peer> {
    let members = match transport.members(source).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "could not list source channel members");
            return None;
        }
    };
    members.into_iter().find(|p| match key {
        LookupKey::Username(u) => p
            .username
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(u)),
        LookupKey::Id(id) => p.id == *id,
    })
}
