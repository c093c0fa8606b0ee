//! SIM registry interface (C4).
//!
//! This is the boundary to the external REST/admin subsystem. The
//! tunnel core never reaches past this trait into `cardlink-registry`'s
//! internals — it calls `token_valid` during the auth handshake and
//! `registration_for` once a probe's `ConnectRequest` arrives.

use cardlink_core::types::{AuthStatus, SessionToken, SimIdentifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no provider is registered for this SIM")]
    NotFound,
    #[error("the session token is not authorized for this SIM")]
    Forbidden,
}

/// Implemented by `cardlink-registry`; consumed by the tunnel as a
/// black box.
pub trait SimRegistry: Send + Sync {
    fn token_valid(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = AuthStatus> + Send;

    /// `Ok(())` if some registered provider owns `id` and `token` is in
    /// scope to reach it. The match engine (not this check) is what
    /// actually identifies and reserves a specific waiting provider, so
    /// there's nothing beyond the pass/fail outcome to hand back here.
    fn registration_for(
        &self,
        token: &SessionToken,
        id: &SimIdentifier,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// The SIMs a just-authenticated provider connection owns, per its
    /// earlier REST registration. The provider registers a slot in the
    /// match engine under each of these.
    fn provider_sims(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Vec<SimIdentifier>> + Send;
}
