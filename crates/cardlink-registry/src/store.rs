//! In-memory backing store: bearer-token lookup plus the
//! `AuthStatus`/`ConnectStatus` three- and four-way outcomes a session
//! or a connect attempt can land on.

use std::collections::HashSet;

use cardlink_core::types::{AuthStatus, SessionToken, SimIdentifier, Token};
use dashmap::{DashMap, DashSet};

/// A logged-in principal: either a provider (who registers SIMs it owns)
/// or a probe (who may be scoped to a subset of SIMs). `None` scope means
/// unrestricted — any registered SIM is reachable.
#[derive(Debug, Clone)]
pub struct Session {
    pub allowed_sims: Option<HashSet<SimIdentifier>>,
    pub is_provider: bool,
}

/// Process-wide store: issued session tokens, and which SIMs each
/// provider token currently has registered. One [`Store`] backs one
/// running `cardlink-registry` instance; there is no persistence across
/// restarts.
#[derive(Default)]
pub struct Store {
    admin_tokens: DashSet<Token>,
    sessions: DashMap<SessionToken, Session>,
    provider_sims: DashMap<SessionToken, HashSet<SimIdentifier>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provisions an admin bearer token allowed to mint sessions via
    /// `POST /login`. Real deployments would load these from the
    /// persistent store this in-memory stand-in replaces.
    pub fn register_admin_token(&self, token: Token) {
        self.admin_tokens.insert(token);
    }

    pub fn admin_token_valid(&self, token: &Token) -> bool {
        self.admin_tokens.contains(token)
    }

    /// Issues a new session for a principal, unrestricted. `is_provider`
    /// marks it as authorized for `PUT /provider/sims`.
    pub fn issue_session(&self, token: SessionToken, is_provider: bool) {
        self.sessions.insert(
            token,
            Session {
                allowed_sims: None,
                is_provider,
            },
        );
    }

    /// Issues a new probe session scoped to exactly the given SIMs.
    /// Scoped sessions are never providers.
    pub fn issue_scoped_session(&self, token: SessionToken, allowed_sims: HashSet<SimIdentifier>) {
        self.sessions.insert(
            token,
            Session {
                allowed_sims: Some(allowed_sims),
                is_provider: false,
            },
        );
    }

    /// Whether `token` was issued as a provider session, i.e. authorized
    /// to call `PUT /provider/sims`.
    pub fn is_provider_session(&self, token: &SessionToken) -> bool {
        self.sessions.get(token).map(|s| s.is_provider).unwrap_or(false)
    }

    /// `Success` if the token was issued and (for providers) has at
    /// least one SIM registered; `NotRegistered` if the token is known
    /// but the provider has not yet registered any SIM; `InvalidToken`
    /// if the token was never issued or has been revoked.
    pub fn token_valid(&self, token: &SessionToken) -> AuthStatus {
        let Some(_session) = self.sessions.get(token) else {
            return AuthStatus::InvalidToken;
        };

        match self.provider_sims.get(token) {
            // Known as a provider token but it has registered nothing yet.
            Some(sims) if sims.is_empty() => AuthStatus::NotRegistered,
            _ => AuthStatus::Success,
        }
    }

    /// Replaces the full set of SIMs a provider token currently owns
    /// (the `PUT /provider/sims` surface).
    pub fn set_provider_sims(&self, token: SessionToken, sims: HashSet<SimIdentifier>) {
        self.provider_sims.insert(token, sims);
    }

    /// SIMs currently registered to a provider token.
    pub fn sims_for_provider(&self, token: &SessionToken) -> Vec<SimIdentifier> {
        self.provider_sims
            .get(token)
            .map(|sims| sims.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `id` is registered to some provider, and whether `token`
    /// is in scope to reach it.
    pub fn lookup(&self, token: &SessionToken, id: &SimIdentifier) -> LookupOutcome {
        let registered = self
            .provider_sims
            .iter()
            .any(|entry| entry.value().contains(id));
        if !registered {
            return LookupOutcome::NotFound;
        }

        match self.sessions.get(token) {
            Some(session) => match &session.allowed_sims {
                Some(allowed) if !allowed.contains(id) => LookupOutcome::Forbidden,
                _ => LookupOutcome::Found,
            },
            None => LookupOutcome::Forbidden,
        }
    }
}

pub enum LookupOutcome {
    Found,
    NotFound,
    Forbidden,
}
