use std::sync::Arc;

use cardlink_registry::{Registry, Store};
use cardlink_tunnel::{TunnelServer, TunnelServerOpts};
use clap::Parser as _;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::cli::{Cli, Commands, ConfigFormat};

mod cli;
mod conf;
mod log;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    log::init_log(Level::INFO)?;
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = match Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            println!("{:#}", err);
            return Ok(());
        }
    };

    if cli.version {
        const VER: &str = match option_env!("CARDLINK_OVERRIDE_VERSION") {
            Some(v) => v,
            None => env!("CARGO_PKG_VERSION"),
        };
        println!("cardlink {VER}");
        return Ok(());
    }

    if let Some(Commands::Init { format }) = &cli.command {
        let path = cli
            .config
            .clone()
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| match format {
                ConfigFormat::Yaml => "config.yaml".into(),
                ConfigFormat::Toml => "config.toml".into(),
            });
        let format_str = match format {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
        };
        conf::persistent::PersistentConfig::default().export_to_file(&path, format_str)?;
        println!("wrote default configuration to {}", path.display());
        return Ok(());
    }

    let persistent = conf::persistent::PersistentConfig::load(cli.config, cli.config_dir)?;
    let runtime = conf::runtime::Config::from_persist(persistent);

    if let Some(Commands::Test) = &cli.command {
        let _ = build_tunnel_opts(&runtime)?;
        println!("configuration OK, listeners not bound");
        return Ok(());
    }

    let store = Arc::new(Store::new());
    let admin_token = cardlink_core::types::Token::from_bytes(rand::random());
    store.register_admin_token(admin_token);
    tracing::info!(admin_token = %admin_token.as_base64(), "minted registry admin token");

    let registry = Registry::new(store.clone());
    let cancel = CancellationToken::new();

    let http_router = cardlink_registry::http::router(store);
    let registry_listener = tokio::net::TcpListener::bind(runtime.registry_addr).await?;
    tracing::info!(addr = %runtime.registry_addr, "registry HTTP surface bound");

    let tunnel_opts = build_tunnel_opts(&runtime)?;
    let tunnel = TunnelServer::new(tunnel_opts, Arc::new(registry), cancel.clone());

    let registry_cancel = cancel.clone();
    let mut set = tokio::task::JoinSet::new();
    set.spawn(async move {
        axum::serve(registry_listener, http_router)
            .with_graceful_shutdown(async move { registry_cancel.cancelled().await })
            .await
            .map_err(eyre::Report::from)
    });
    set.spawn(async move { tunnel.run().await.map_err(eyre::Report::from) });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            cancel.cancel();
        }
        Some(res) = set.join_next() => {
            cancel.cancel();
            if let Ok(Err(err)) = res {
                tracing::error!(%err, "a server task exited with an error");
            }
        }
    }

    while let Some(_res) = set.join_next().await {}

    Ok(())
}

fn build_tunnel_opts(runtime: &conf::runtime::Config) -> eyre::Result<TunnelServerOpts> {
    let provider_tls = match (&runtime.tls_cert, &runtime.tls_key) {
        (Some(cert_path), Some(key_path)) => Some(load_tls_acceptor(cert_path, key_path)?),
        (None, None) => None,
        _ => {
            return Err(eyre::eyre!(
                "tls_cert and tls_key must both be set, or neither"
            ));
        }
    };

    Ok(TunnelServerOpts {
        provider_addr: runtime.provider_addr,
        probe_addr: runtime.probe_addr,
        provider_tls,
        auth_timeout: runtime.auth_timeout,
    })
}

fn load_tls_acceptor(
    cert_path: &std::path::Path,
    key_path: &std::path::Path,
) -> eyre::Result<tokio_rustls::TlsAcceptor> {
    let cert_file = std::fs::read(cert_path)?;
    let key_file = std::fs::read(key_path)?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut &cert_file[..]).collect::<Result<_, _>>()?;
    let key = rustls_pemfile::private_key(&mut &key_file[..])?
        .ok_or_else(|| eyre::eyre!("no private key found in {}", key_path.display()))?;

    Ok(cardlink_tunnel::tls::build_acceptor(certs, key)?)
}
