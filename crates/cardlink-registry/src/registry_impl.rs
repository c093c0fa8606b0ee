//! `SimRegistry` implementation backing `cardlink-tunnel`'s C4 boundary
//! with the in-memory [`Store`].

use std::sync::Arc;

use cardlink_core::types::{AuthStatus, SessionToken, SimIdentifier};
use cardlink_tunnel::registry::{RegistryError, SimRegistry};

use crate::store::{LookupOutcome, Store};

/// Cheap-to-clone handle over the shared [`Store`], implementing the
/// tunnel's `SimRegistry` trait.
#[derive(Clone)]
pub struct Registry {
    store: Arc<Store>,
}

impl Registry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl SimRegistry for Registry {
    async fn token_valid(&self, token: &SessionToken) -> AuthStatus {
        self.store.token_valid(token)
    }

    async fn registration_for(
        &self,
        token: &SessionToken,
        id: &SimIdentifier,
    ) -> Result<(), RegistryError> {
        match self.store.lookup(token, id) {
            LookupOutcome::Found => Ok(()),
            LookupOutcome::NotFound => Err(RegistryError::NotFound),
            LookupOutcome::Forbidden => Err(RegistryError::Forbidden),
        }
    }

    async fn provider_sims(&self, token: &SessionToken) -> Vec<SimIdentifier> {
        self.store.sims_for_provider(token)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cardlink_core::types::{Imsi, TOKEN_LEN};

    use super::*;

    fn token(b: u8) -> SessionToken {
        SessionToken::from_bytes([b; TOKEN_LEN])
    }

    #[tokio::test]
    async fn registration_for_maps_store_outcomes_to_registry_errors() {
        let store = Arc::new(Store::new());
        let registry = Registry::new(store.clone());
        let provider = token(1);
        store.issue_session(provider, true);
        let sim = SimIdentifier::Imsi(Imsi::new("123456789012345").unwrap());
        store.set_provider_sims(provider, HashSet::from([sim.clone()]));

        let probe = token(2);
        store.issue_session(probe, false);

        assert!(registry.registration_for(&probe, &sim).await.is_ok());
        assert_eq!(
            registry
                .registration_for(&probe, &SimIdentifier::Imsi(Imsi::new("999999999999999").unwrap()))
                .await,
            Err(RegistryError::NotFound)
        );
    }
}
