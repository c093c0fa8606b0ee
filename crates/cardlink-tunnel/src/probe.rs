//! Probe-side connection state machine (C7 dispatch target): read the
//! `ConnectRequest`, reserve a provider slot, wait for its decision,
//! relay or reject.

use cardlink_core::{
    AbstractTcpStream,
    proto::{ConnectRequestCodec, ConnectResponse, ConnectResponseCodec},
    relay::relay,
    stream::FramedStream,
    types::ConnectStatus,
};
use tokio_util::{codec::Encoder, sync::CancellationToken};
use tracing::{info, warn};

use crate::{
    error::TunnelError,
    match_engine::{Handoff, MatchEngine, ProviderDecision},
    registry::{RegistryError, SimRegistry},
};

/// Reads the probe's `ConnectRequest`, checks registry ownership,
/// reserves a waiting provider, and runs the relay on success. Returns
/// once the session ends; the caller closes the socket either way.
pub async fn handle_probe<R>(
    mut stream: FramedStream<Box<dyn AbstractTcpStream>>,
    registry: &R,
    engine: &MatchEngine,
    token: &cardlink_core::types::SessionToken,
    cancel: &CancellationToken,
) -> Result<(), TunnelError>
where
    R: SimRegistry,
{
    let mut decoder = ConnectRequestCodec;
    let Some(request) = stream.read_record(&mut decoder).await? else {
        return Ok(());
    };

    if let Err(registry_err) = registry.registration_for(token, &request.identifier).await {
        let status = match registry_err {
            RegistryError::NotFound => ConnectStatus::NotFound,
            RegistryError::Forbidden => ConnectStatus::Forbidden,
        };
        write_response(&mut stream, status).await?;
        return Ok(());
    }

    let Some(handoff_tx) = engine.reserve(&request.identifier) else {
        write_response(&mut stream, ConnectStatus::NotAvailable).await?;
        return Ok(());
    };

    let (decision_tx, decision_rx) = tokio::sync::oneshot::channel();
    if handoff_tx
        .send(Handoff {
            identifier: request.identifier.clone(),
            decision_tx,
        })
        .await
        .is_err()
    {
        // Provider task died between reservation and delivery.
        write_response(&mut stream, ConnectStatus::NotAvailable).await?;
        return Ok(());
    }

    match decision_rx.await {
        Ok(ProviderDecision::Accepted(provider_stream)) => {
            write_response(&mut stream, ConnectStatus::Success).await?;
            info!(identifier = %request.identifier, "session paired, relaying");
            let outcome = relay(provider_stream, stream, cancel).await;
            match outcome {
                Ok(end) => info!(?end, "relay ended"),
                Err(err) => warn!(%err, "relay ended with error"),
            }
            Ok(())
        }
        Ok(ProviderDecision::Rejected(status)) => {
            write_response(&mut stream, status).await?;
            Ok(())
        }
        Err(_) => {
            // Provider task dropped the decision channel without replying.
            write_response(&mut stream, ConnectStatus::NotAvailable).await?;
            Ok(())
        }
    }
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
