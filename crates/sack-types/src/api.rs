use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Profile, ReceiverPoints, Role, SackEntry, Toy};

// -- JWT Claims --

/// Session token claims. `jti` identifies the session so it can be revoked
/// on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub jti: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: Profile,
    /// Portal the client should navigate to.
    pub redirect_to: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub profile: Profile,
    pub redirect_to: String,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    /// Starting allowance for receivers. Ignored for other roles.
    pub points: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePointsRequest {
    pub total_points: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub profile: Profile,
    /// Present for receivers only.
    pub points: Option<ReceiverPoints>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiverSack {
    pub receiver: Profile,
    pub points: ReceiverPoints,
    pub items: Vec<SackEntry>,
}

// -- Receiver --

#[derive(Debug, Serialize, Deserialize)]
pub struct SackResponse {
    pub items: Vec<SackEntry>,
    pub item_count: usize,
    pub total_points: i64,
}

impl SackResponse {
    pub fn new(items: Vec<SackEntry>) -> Self {
        let total_points = items.iter().map(|entry| entry.toy.points).sum();
        Self { item_count: items.len(), total_points, items }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SackChangeResponse {
    pub toy: Toy,
    pub points: ReceiverPoints,
}
