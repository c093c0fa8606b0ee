//! Provider-side connection state machine (C7 dispatch target): parks
//! a connection in the match engine until a probe reserves it, then
//! hands off its stream to whichever side of `ConnectCallback` wins.

use cardlink_core::{
    AbstractTcpStream,
    proto::{ConnectResponse, ConnectResponseCodec},
    stream::FramedStream,
    types::{ConnectStatus, SimIdentifier},
};
use tokio_util::{codec::Encoder, sync::CancellationToken};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::TunnelError,
    match_engine::{MatchEngine, ProviderDecision},
};

/// The application-level accept/reject decision for a `ConnectRequest`
/// delivered to a parked provider.
/// Invoked synchronously — no suspension expected.
pub trait ConnectCallback: Send + Sync {
    fn decide(&self, identifier: &SimIdentifier) -> ConnectStatus;
}

/// Accepts every reservation — no authorization policy beyond token
/// validity. A richer callback is a deployment concern, not part of
/// the tunnel core.
pub struct AcceptAll;

impl ConnectCallback for AcceptAll {
    fn decide(&self, _identifier: &SimIdentifier) -> ConnectStatus {
        ConnectStatus::Success
    }
}

/// Registers `provider_id`'s owned SIMs with the match engine and parks
/// until one of three things happens: a probe reserves one of them, the
/// provider's own socket closes or errors while parked, or `cancel`
/// fires. Whichever wins, this future returns and drops `_registration`
/// promptly so the match engine doesn't keep serving a dead provider.
pub async fn wait_for_connection(
    stream: &mut FramedStream<Box<dyn AbstractTcpStream>>,
    engine: &MatchEngine,
    provider_id: Uuid,
    owned_sims: Vec<SimIdentifier>,
    callback: &impl ConnectCallback,
    cancel: &CancellationToken,
) -> Result<(), TunnelError> {
    if owned_sims.is_empty() {
        return Ok(());
    }

    let (_registration, mut handoffs) = engine.register(owned_sims, provider_id);

    let handoff = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        handoff = handoffs.recv() => match handoff {
            Some(handoff) => handoff,
            // Registration guard dropped without ever being reserved -
            // the provider socket closed first.
            None => return Ok(()),
        },
        _ = watch_for_disconnect(stream) => {
            // Parked provider went away with no pending reservation;
            // _registration drops here, clearing its match-engine slots.
            return Ok(());
        },
    };

    let status = callback.decide(&handoff.identifier);
    write_response(stream, status).await?;

    if status == ConnectStatus::Success {
        info!(identifier = %handoff.identifier, "provider accepted connect request");
        // Hand the stream off to the probe task, which drives the relay.
        // `stream` is a `&mut`, not owned here, so swap in a throwaway
        // placeholder to move the real one out.
        let _ = handoff.decision_tx.send(ProviderDecision::Accepted(
            std::mem::replace(stream, FramedStream::new(Box::new(tokio::io::empty()))),
        ));
    } else {
        warn!(identifier = %handoff.identifier, ?status, "provider rejected connect request");
        let _ = handoff.decision_tx.send(ProviderDecision::Rejected(status));
    }

    Ok(())
}

async fn write_response(
    stream: &mut FramedStream<Box<dyn AbstractTcpStream>>,
    status: ConnectStatus,
) -> Result<(), TunnelError> {
    let mut buf = bytes::BytesMut::new();
    ConnectResponseCodec
        .encode(ConnectResponse { status }, &mut buf)
        .map_err(TunnelError::from)?;
    stream.write_all(&buf).await?;
    Ok(())
}

/// Resolves once the parked provider's socket closes, errors, or sends
/// unexpected bytes (a provider is not supposed to speak while parked).
/// Never resolves otherwise, so it's only useful raced inside a
/// `select!` against the real work.
async fn watch_for_disconnect(stream: &mut FramedStream<Box<dyn AbstractTcpStream>>) {
    let _ = stream.read(1).await;
}
