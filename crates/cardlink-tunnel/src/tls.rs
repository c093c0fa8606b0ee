//! Optional provider-side TLS: server-authenticated, no client auth.

use rustls::ServerConfig as RustlsServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

/// Builds a provider-side TLS acceptor. Requires a default `rustls`
/// crypto provider to already be installed for the process (the
/// `cardlink` binary does this once at startup).
pub fn build_acceptor(
    certificate: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, rustls::Error> {
    let config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certificate, private_key)?;
    Ok(TlsAcceptor::from(std::sync::Arc::new(config)))
}
