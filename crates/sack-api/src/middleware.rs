//! Session extractors.
//!
//! [`Session`] authenticates the bearer token. The role extractors wrap it and
//! admit exactly one role each; every portal is reserved to its own role.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use tracing::{debug, warn};

use sack_types::api::Claims;
use sack_types::error::MarketError;
use sack_types::models::{Profile, Role};

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated caller: verified claims plus the current profile row.
/// The role is read from the profile, not the token.
#[derive(Debug, Clone)]
pub struct Session {
    pub claims: Claims,
    pub profile: Profile,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthorized("sign in to continue"))?;

        let claims = decode_token(bearer.token(), &state.auth.jwt_secret).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::unauthorized("session is invalid or has expired")
        })?;

        let (jti, sub) = (claims.jti, claims.sub);
        let (revoked, profile) = state
            .run(move |store| Ok((store.is_session_revoked(jti)?, store.profile(sub)?)))
            .await?;

        if revoked {
            return Err(ApiError::unauthorized("session has been signed out"));
        }
        let profile = profile.ok_or_else(|| {
            warn!("Token for deleted profile {}", sub);
            ApiError::unauthorized("account no longer exists")
        })?;

        Ok(Session { claims, profile })
    }
}

fn require(session: Session, required: Role) -> Result<Profile, ApiError> {
    if session.profile.role == required {
        return Ok(session.profile);
    }
    warn!(
        "{} ({}) denied access to the {} portal",
        session.profile.email, session.profile.role, required
    );
    Err(ApiError::Market(MarketError::Forbidden { required }))
}

/// Admin portal access.
pub struct AdminSession(pub Profile);

/// Donator portal access.
pub struct DonatorSession(pub Profile);

/// Receiver portal access.
pub struct ReceiverSession(pub Profile);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        require(session, Role::Admin).map(AdminSession)
    }
}

impl FromRequestParts<AppState> for DonatorSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        require(session, Role::Donator).map(DonatorSession)
    }
}

impl FromRequestParts<AppState> for ReceiverSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        require(session, Role::Receiver).map(ReceiverSession)
    }
}
