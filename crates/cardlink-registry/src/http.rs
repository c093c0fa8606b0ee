//! REST admin surface: `POST /login` mints a session token
//! for a provider or probe; `PUT /provider/sims` lets an authenticated
//! provider replace the set of SIMs it currently offers.
//! `Authorization: Bearer <base64>` parsing is handled by a pair of
//! axum extractors below.

use std::{collections::HashSet, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{post, put},
};
use cardlink_core::types::{Iccid, Imsi, SessionToken, SimIdentifier, Token};
use serde::{Deserialize, Serialize};

use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

pub fn router(store: Arc<Store>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/provider/sims", put(put_provider_sims))
        .with_state(AppState { store })
}

/// Rejection type for the bearer-token extractors, mirroring the
/// teacher's status/`WWW-Authenticate` pairing in the source decorator.
pub struct AuthRejection(StatusCode, &'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            self.0,
            [("WWW-Authenticate", format!("Bearer error=\"{}\"", self.1))],
        )
            .into_response()
    }
}

fn parse_bearer(parts: &Parts) -> Result<Vec<u8>, AuthRejection> {
    use base64::Engine as _;

    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthRejection(StatusCode::UNAUTHORIZED, "missing"))?;

    let Some(encoded) = header.strip_prefix("Bearer ") else {
        return Err(AuthRejection(StatusCode::BAD_REQUEST, "invalid_request"));
    };

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthRejection(StatusCode::BAD_REQUEST, "invalid_request"))
}

/// An admin [`Token`] extracted from `Authorization: Bearer`, used to
/// authorize `POST /login`.
pub struct AdminToken(pub Token);

impl<S> FromRequestParts<S> for AdminToken
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = parse_bearer(parts)?;
        let bytes: [u8; cardlink_core::types::TOKEN_LEN] = bytes
            .try_into()
            .map_err(|_| AuthRejection(StatusCode::BAD_REQUEST, "invalid_request"))?;
        Ok(AdminToken(Token::from_bytes(bytes)))
    }
}

/// A [`SessionToken`] extracted from `Authorization: Bearer`, used to
/// authorize `PUT /provider/sims`.
pub struct AuthedSession(pub SessionToken);

impl<S> FromRequestParts<S> for AuthedSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = parse_bearer(parts)?;
        let bytes: [u8; cardlink_core::types::TOKEN_LEN] = bytes
            .try_into()
            .map_err(|_| AuthRejection(StatusCode::BAD_REQUEST, "invalid_request"))?;
        Ok(AuthedSession(SessionToken::from_bytes(bytes)))
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Mints a provider session, authorized to call `PUT
    /// /provider/sims`. `allowed_sims` is ignored when this is set.
    #[serde(default)]
    provider: bool,
    /// SIMs the minted probe session is restricted to; omitted/`null`
    /// means unrestricted.
    #[serde(default)]
    allowed_sims: Option<Vec<WireIdentifier>>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    session_token: String,
}

async fn login(
    State(state): State<AppState>,
    AdminToken(token): AdminToken,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    if !state.store.admin_token_valid(&token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let session_token = SessionToken::from_bytes(rand::random());
    if body.provider {
        state.store.issue_session(session_token, true);
    } else {
        match body.allowed_sims {
            Some(ids) => {
                let ids: HashSet<SimIdentifier> = ids
                    .into_iter()
                    .map(WireIdentifier::into_identifier)
                    .collect::<Result<_, _>>()
                    .map_err(|_| StatusCode::BAD_REQUEST)?;
                state.store.issue_scoped_session(session_token, ids);
            }
            None => state.store.issue_session(session_token, false),
        }
    }

    Ok(Json(LoginResponse {
        session_token: session_token.as_base64(),
    }))
}

#[derive(Deserialize)]
struct WireIdentifier {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl WireIdentifier {
    fn into_identifier(self) -> Result<SimIdentifier, cardlink_core::types::IdentifierError> {
        match self.kind.as_str() {
            "iccid" => Ok(SimIdentifier::Iccid(Iccid::new(self.value)?)),
            // Anything else, including "imsi", defaults to IMSI - the
            // only other identifier type this registry knows about.
            _ => Ok(SimIdentifier::Imsi(Imsi::new(self.value)?)),
        }
    }
}

#[derive(Deserialize)]
struct PutSimsRequest {
    sims: Vec<WireIdentifier>,
}

async fn put_provider_sims(
    State(state): State<AppState>,
    AuthedSession(token): AuthedSession,
    Json(body): Json<PutSimsRequest>,
) -> Result<StatusCode, StatusCode> {
    if !state.store.is_provider_session(&token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let sims: HashSet<SimIdentifier> = body
        .sims
        .into_iter()
        .map(WireIdentifier::into_identifier)
        .collect::<Result<_, _>>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    state.store.set_provider_sims(token, sims);
    Ok(StatusCode::NO_CONTENT)
}
