use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub struct Config {
    pub provider_addr: SocketAddr,
    pub probe_addr: SocketAddr,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub auth_timeout: Duration,
    pub registry_addr: SocketAddr,
}

impl Config {
    pub fn from_persist(config: super::persistent::PersistentConfig) -> Self {
        Self {
            provider_addr: config.tunnel.provider_addr,
            probe_addr: config.tunnel.probe_addr,
            tls_cert: config.tunnel.tls_cert,
            tls_key: config.tunnel.tls_key,
            auth_timeout: config.tunnel.auth_timeout,
            registry_addr: config.registry.listen_addr,
        }
    }
}
