use std::collections::HashMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use sack_types::api::{CreateUserRequest, ReceiverSack, UpdatePointsRequest, UserSummary};
use sack_types::models::{NewProfile, ReceiverPoints, Role, SackEntry};
use sack_types::validate;

use crate::auth::hash_password_blocking;
use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParam};
use crate::middleware::AdminSession;
use crate::state::AppState;

/// GET /admin/users. Every profile, receivers with their ledger.
pub async fn list_users(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let (profiles, ledgers) = state
        .run(|store| Ok((store.list_profiles()?, store.list_receiver_points()?)))
        .await?;

    let mut ledgers: HashMap<Uuid, ReceiverPoints> = ledgers
        .into_iter()
        .map(|points| (points.receiver_id, points))
        .collect();

    let users = profiles
        .into_iter()
        .map(|profile| UserSummary {
            points: ledgers.remove(&profile.id),
            profile,
        })
        .collect();
    Ok(Json(users))
}

/// POST /admin/users. Creates an account of any role.
pub async fn create_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate::email(&req.email)?;
    validate::password(&req.password)?;
    let full_name = validate::full_name(&req.full_name)?;

    let total_points = match req.role {
        Role::Receiver => req.points,
        Role::Admin | Role::Donator => {
            if req.points.is_some() {
                warn!("Ignoring points for new {} account {}", req.role, email);
            }
            None
        }
    };

    let password_hash = hash_password_blocking(req.password).await?;

    let new = NewProfile {
        email,
        full_name,
        role: req.role,
        password_hash,
        total_points,
    };
    let (profile, points) = state
        .run(move |store| {
            let profile = store.create_profile(&new)?;
            let points = match profile.role {
                Role::Receiver => Some(store.receiver_points(profile.id)?),
                Role::Admin | Role::Donator => None,
            };
            Ok((profile, points))
        })
        .await?;

    info!("{} created {} account {}", admin.email, profile.role, profile.email);
    Ok((StatusCode::CREATED, Json(UserSummary { profile, points })))
}

/// PUT /admin/receivers/{receiver_id}/points. Sets the receiver's allowance;
/// it may not drop below what is already spent.
pub async fn update_points(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    PathParam(receiver_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdatePointsRequest>,
) -> ApiResult<Json<ReceiverPoints>> {
    let total = req.total_points;
    let points = state
        .run(move |store| store.set_total_points(receiver_id, total))
        .await?;
    info!(
        "{} set allowance of {} to {} points",
        admin.email, receiver_id, points.total_points
    );
    Ok(Json(points))
}

/// GET /admin/sacks. Every receiver with their ledger and sack contents.
pub async fn list_sacks(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
) -> ApiResult<Json<Vec<ReceiverSack>>> {
    let (profiles, ledgers, entries) = state
        .run(|store| {
            Ok((
                store.list_profiles()?,
                store.list_receiver_points()?,
                store.all_sack_entries()?,
            ))
        })
        .await?;

    let mut ledgers: HashMap<Uuid, ReceiverPoints> = ledgers
        .into_iter()
        .map(|points| (points.receiver_id, points))
        .collect();
    let mut sacks: HashMap<Uuid, Vec<SackEntry>> = HashMap::new();
    for entry in entries {
        sacks.entry(entry.item.receiver_id).or_default().push(entry);
    }

    let mut result = Vec::new();
    for receiver in profiles.into_iter().filter(|p| p.role == Role::Receiver) {
        let Some(points) = ledgers.remove(&receiver.id) else {
            warn!("Receiver {} has no points ledger", receiver.id);
            continue;
        };
        result.push(ReceiverSack {
            items: sacks.remove(&receiver.id).unwrap_or_default(),
            points,
            receiver,
        });
    }
    Ok(Json(result))
}
