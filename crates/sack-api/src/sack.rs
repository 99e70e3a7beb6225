use axum::{Json, extract::State};
use tracing::info;
use uuid::Uuid;

use sack_types::api::{SackChangeResponse, SackResponse};
use sack_types::models::ReceiverPoints;

use crate::error::ApiResult;
use crate::extract::PathParam;
use crate::middleware::ReceiverSession;
use crate::state::AppState;

pub async fn view_points(
    State(state): State<AppState>,
    ReceiverSession(receiver): ReceiverSession,
) -> ApiResult<Json<ReceiverPoints>> {
    let points = state.run(move |store| store.receiver_points(receiver.id)).await?;
    Ok(Json(points))
}

pub async fn view_sack(
    State(state): State<AppState>,
    ReceiverSession(receiver): ReceiverSession,
) -> ApiResult<Json<SackResponse>> {
    let items = state.run(move |store| store.sack(receiver.id)).await?;
    Ok(Json(SackResponse::new(items)))
}

/// POST /receiver/sack/{toy_id}. Claims the toy and charges its points in
/// one transaction.
pub async fn add_to_sack(
    State(state): State<AppState>,
    ReceiverSession(receiver): ReceiverSession,
    PathParam(toy_id): PathParam<Uuid>,
) -> ApiResult<Json<SackChangeResponse>> {
    let receiver_id = receiver.id;
    let change = state
        .run(move |store| store.add_toy_to_sack(receiver_id, toy_id))
        .await?;
    info!(
        "{} added toy {} ({} points left)",
        receiver.email, toy_id, change.points.available_points
    );
    Ok(Json(SackChangeResponse {
        toy: change.toy,
        points: change.points,
    }))
}

/// DELETE /receiver/sack/{toy_id}. Returns the toy to the marketplace and
/// refunds its points.
pub async fn remove_from_sack(
    State(state): State<AppState>,
    ReceiverSession(receiver): ReceiverSession,
    PathParam(toy_id): PathParam<Uuid>,
) -> ApiResult<Json<SackChangeResponse>> {
    let receiver_id = receiver.id;
    let change = state
        .run(move |store| store.remove_toy_from_sack(receiver_id, toy_id))
        .await?;
    info!(
        "{} removed toy {} ({} points left)",
        receiver.email, toy_id, change.points.available_points
    );
    Ok(Json(SackChangeResponse {
        toy: change.toy,
        points: change.points,
    }))
}
