//! Dual TCP listener (C7).

use std::{sync::Arc, time::Duration};

use cardlink_core::{AbstractTcpStream, stream::FramedStream};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{DEFAULT_AUTH_TIMEOUT, authenticate},
    match_engine::MatchEngine,
    probe::handle_probe,
    provider::{AcceptAll, wait_for_connection},
    registry::SimRegistry,
};

/// Bind addresses and optional TLS material for the two listeners.
pub struct TunnelServerOpts {
    pub provider_addr: std::net::SocketAddr,
    pub probe_addr: std::net::SocketAddr,
    pub provider_tls: Option<TlsAcceptor>,
    pub auth_timeout: Duration,
}

impl Default for TunnelServerOpts {
    fn default() -> Self {
        Self {
            provider_addr: "[::]:6666".parse().unwrap(),
            probe_addr: "[::]:5555".parse().unwrap(),
            provider_tls: None,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }
}

/// Owns the two TCP acceptors. Each accepted socket is handed to a
/// fresh per-connection task; the listener itself keeps no reference to
/// it afterward.
pub struct TunnelServer<R> {
    opts: TunnelServerOpts,
    registry: Arc<R>,
    engine: MatchEngine,
    cancel: CancellationToken,
}

impl<R> TunnelServer<R>
where
    R: SimRegistry + 'static,
{
    pub fn new(opts: TunnelServerOpts, registry: Arc<R>, cancel: CancellationToken) -> Self {
        Self {
            opts,
            registry,
            engine: MatchEngine::new(),
            cancel,
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let provider_listener = TcpListener::bind(self.opts.provider_addr).await?;
        let probe_listener = TcpListener::bind(self.opts.probe_addr).await?;
        info!(
            provider = %self.opts.provider_addr,
            probe = %self.opts.probe_addr,
            "tunnel listeners bound"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("tunnel server shutting down");
                    return Ok(());
                }
                accepted = provider_listener.accept() => {
                    let (socket, peer) = accepted?;
                    self.spawn_provider(socket, peer);
                }
                accepted = probe_listener.accept() => {
                    let (socket, peer) = accepted?;
                    self.spawn_probe(socket, peer);
                }
            }
        }
    }

    fn spawn_provider(&self, socket: TcpStream, peer: std::net::SocketAddr) {
        let registry = self.registry.clone();
        let engine = self.engine.clone();
        let tls = self.opts.provider_tls.clone();
        let auth_timeout = self.opts.auth_timeout;
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let boxed: Box<dyn AbstractTcpStream> = match tls {
                Some(acceptor) => match acceptor.accept(socket).await {
                    Ok(tls_stream) => Box::new(tls_stream),
                    Err(err) => {
                        warn!(%peer, %err, "provider TLS handshake failed");
                        return;
                    }
                },
                None => Box::new(socket),
            };

            if let Err(err) =
                handle_provider(boxed, peer, &*registry, &engine, auth_timeout, &cancel).await
            {
                warn!(%peer, %err, "provider connection ended with error");
            }
        });
    }

    fn spawn_probe(&self, socket: TcpStream, peer: std::net::SocketAddr) {
        let registry = self.registry.clone();
        let engine = self.engine.clone();
        let auth_timeout = self.opts.auth_timeout;
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let boxed: Box<dyn AbstractTcpStream> = Box::new(socket);
            if let Err(err) = handle_probe_connection(boxed, peer, &*registry, &engine, auth_timeout, &cancel).await
            {
                warn!(%peer, %err, "probe connection ended with error");
            }
        });
    }
}

async fn handle_provider<R: SimRegistry>(
    socket: Box<dyn AbstractTcpStream>,
    peer: std::net::SocketAddr,
    registry: &R,
    engine: &MatchEngine,
    auth_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), crate::error::TunnelError> {
    let mut stream = FramedStream::new(socket);
    let token = authenticate(&mut stream, registry, auth_timeout).await?;
    info!(%peer, "provider authenticated");

    let owned = registry.provider_sims(&token).await;
    let provider_id = Uuid::new_v4();
    wait_for_connection(&mut stream, engine, provider_id, owned, &AcceptAll, cancel).await?;
    Ok(())
}

async fn handle_probe_connection<R: SimRegistry>(
    socket: Box<dyn AbstractTcpStream>,
    peer: std::net::SocketAddr,
    registry: &R,
    engine: &MatchEngine,
    auth_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), crate::error::TunnelError> {
    let mut stream = FramedStream::new(socket);
    let token = authenticate(&mut stream, registry, auth_timeout).await?;
    info!(%peer, "probe authenticated");
    handle_probe(stream, registry, engine, &token, cancel).await
}
