use std::sync::OnceLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use sack_types::api::{AuthResponse, Claims, LoginRequest, MeResponse, RegisterRequest};
use sack_types::models::{NewProfile, Profile, Role};
use sack_types::validate;

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::middleware::Session;
use crate::state::{AppState, AuthConfig};

/// Argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Argon2 is CPU-bound, so request handlers hash off the async workers.
pub(crate) async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_password_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))
}

/// Verified in place of a stored hash when the email is unknown, so both
/// failure paths cost one Argon2 run.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("no-account-has-this-password").unwrap_or_default())
}

pub fn create_token(config: &AuthConfig, profile: &Profile) -> anyhow::Result<String> {
    let claims = Claims {
        sub: profile.id,
        email: profile.email.clone(),
        role: profile.role,
        jti: Uuid::new_v4(),
        exp: (Utc::now() + config.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verifies signature and expiry.
pub fn decode_token(token: &str, secret: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

fn issue(state: &AppState, profile: Profile) -> ApiResult<AuthResponse> {
    let token = create_token(&state.auth, &profile)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;
    Ok(AuthResponse {
        token,
        redirect_to: profile.role.home_path().to_string(),
        profile,
    })
}

/// Self-service sign-up. New accounts are always donators; receivers and
/// admins are created by an admin.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate::email(&req.email)?;
    validate::password(&req.password)?;
    let full_name = validate::full_name(&req.full_name)?;

    let password_hash = hash_password_blocking(req.password).await?;

    let new = NewProfile {
        email,
        full_name,
        role: Role::Donator,
        password_hash,
        total_points: None,
    };
    let profile = state.run(move |store| store.create_profile(&new)).await?;
    info!("Registered donator {} ({})", profile.email, profile.id);

    Ok((StatusCode::CREATED, Json(issue(&state, profile)?)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let lookup = email.clone();
    let credentials = state.run(move |store| store.credentials(&lookup)).await?;

    let hash = match &credentials {
        Some(credentials) => credentials.password_hash.clone(),
        None => dummy_hash().to_string(),
    };
    let verified = verify_password_blocking(req.password, hash).await?;

    let credentials = match credentials {
        Some(credentials) if verified => credentials,
        Some(_) => {
            warn!("Wrong password for {}", email);
            return Err(ApiError::unauthorized("invalid email or password"));
        }
        None => {
            warn!("Login attempt for unknown account {}", email);
            return Err(ApiError::unauthorized("invalid email or password"));
        }
    };

    info!("{} signed in as {}", credentials.profile.email, credentials.profile.role);
    Ok(Json(issue(&state, credentials.profile)?))
}

/// Revokes the presented token until it would have expired anyway.
pub async fn logout(State(state): State<AppState>, session: Session) -> ApiResult<StatusCode> {
    let jti = session.claims.jti;
    let expires_at = DateTime::<Utc>::from_timestamp(session.claims.exp as i64, 0)
        .unwrap_or_else(|| Utc::now() + state.auth.token_ttl);
    state.run(move |store| store.revoke_session(jti, expires_at)).await?;
    info!("{} signed out", session.profile.email);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(session: Session) -> Json<MeResponse> {
    Json(MeResponse {
        redirect_to: session.profile.role.home_path().to_string(),
        profile: session.profile,
    })
}
