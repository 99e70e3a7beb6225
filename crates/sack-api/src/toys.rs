use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use sack_types::error::MarketError;
use sack_types::models::{NewToy, Toy, ToyCondition, ToyFilter, ToyStatus};
use sack_types::validate;

use crate::error::{ApiError, ApiResult};
use crate::extract::{FormData, PathParam, QueryParams};
use crate::middleware::{AdminSession, DonatorSession, ReceiverSession};
use crate::state::AppState;

/// Raw multipart fields of a toy listing, before validation.
#[derive(Default)]
struct ToyForm {
    title: Option<String>,
    description: Option<String>,
    points: Option<String>,
    condition: Option<String>,
    age_range: Option<String>,
    category: Option<String>,
    image: Option<Bytes>,
}

impl ToyForm {
    async fn read(multipart: &mut Multipart) -> ApiResult<Self> {
        let mut form = ToyForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let slot = match name.as_str() {
                "image" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("failed to read image: {e}")))?;
                    form.image = Some(bytes);
                    continue;
                }
                "title" => &mut form.title,
                "description" => &mut form.description,
                "points" => &mut form.points,
                "condition" => &mut form.condition,
                "age_range" => &mut form.age_range,
                "category" => &mut form.category,
                other => {
                    return Err(ApiError::BadRequest(format!("unexpected form field '{other}'")));
                }
            };
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read field '{name}': {e}")))?;
            *slot = Some(text);
        }
        Ok(form)
    }

    /// Everything but the image URL, which only exists once the file is
    /// stored.
    fn validate(&self, donator_id: Uuid) -> ApiResult<NewToy> {
        let title = validate::toy_title(self.title.as_deref().unwrap_or_default())?;
        let description = validate::toy_description(self.description.as_deref())?;

        let raw_points = self
            .points
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MarketError::validation("points are required"))?;
        let points = raw_points
            .parse::<i64>()
            .map_err(|_| MarketError::validation("points must be a whole number"))?;
        let points = validate::toy_points(points)?;

        let condition = match self.condition.as_deref().map(str::trim) {
            None | Some("") => ToyCondition::default(),
            Some(raw) => raw.parse::<ToyCondition>().map_err(|e| MarketError::validation(e.to_string()))?,
        };
        let age_range = validate::label("age_range", self.age_range.as_deref(), validate::DEFAULT_AGE_RANGE)?;
        let category = validate::label("category", self.category.as_deref(), validate::DEFAULT_CATEGORY)?;

        Ok(NewToy {
            title,
            description,
            points,
            image_url: String::new(),
            donator_id,
            condition,
            age_range,
            category,
        })
    }
}

/// POST /donator/toys (multipart). Lists a new toy with its photo.
pub async fn upload_toy(
    State(state): State<AppState>,
    DonatorSession(donator): DonatorSession,
    FormData(mut multipart): FormData,
) -> ApiResult<impl IntoResponse> {
    let form = ToyForm::read(&mut multipart).await?;
    let mut new = form.validate(donator.id)?;
    let image = form
        .image
        .ok_or_else(|| MarketError::validation("an image of the toy is required"))?;

    new.image_url = state.images.save(&image).await?;

    let image_url = new.image_url.clone();
    let toy = match state.run(move |store| store.create_toy(&new)).await {
        Ok(toy) => toy,
        Err(e) => {
            // Don't leave an orphaned photo behind.
            if let Err(cleanup) = state.images.delete(&image_url).await {
                error!("Failed to remove image {} after failed insert: {}", image_url, cleanup);
            }
            return Err(e);
        }
    };

    info!("{} listed toy {} for {} points", donator.email, toy.id, toy.points);
    Ok((StatusCode::CREATED, Json(toy)))
}

/// GET /donator/toys. The caller's own listings in every status.
pub async fn list_own_toys(
    State(state): State<AppState>,
    DonatorSession(donator): DonatorSession,
) -> ApiResult<Json<Vec<Toy>>> {
    let filter = ToyFilter {
        donator_id: Some(donator.id),
        ..ToyFilter::default()
    };
    let toys = state.run(move |store| store.list_toys(&filter)).await?;
    Ok(Json(toys))
}

/// GET /receiver/toys. The marketplace only ever shows available toys.
pub async fn marketplace(
    State(state): State<AppState>,
    ReceiverSession(_receiver): ReceiverSession,
    QueryParams(filter): QueryParams<ToyFilter>,
) -> ApiResult<Json<Vec<Toy>>> {
    let filter = ToyFilter {
        status: Some(ToyStatus::Available),
        donator_id: None,
        ..filter
    };
    let toys = state.run(move |store| store.list_toys(&filter)).await?;
    Ok(Json(toys))
}

/// GET /admin/toys. The full catalog, optionally filtered.
pub async fn admin_list_toys(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    QueryParams(filter): QueryParams<ToyFilter>,
) -> ApiResult<Json<Vec<Toy>>> {
    let toys = state.run(move |store| store.list_toys(&filter)).await?;
    Ok(Json(toys))
}

/// DELETE /admin/toys/{toy_id}. Removes the listing and its photo. Toys
/// sitting in a sack cannot be deleted.
pub async fn admin_delete_toy(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    PathParam(toy_id): PathParam<Uuid>,
) -> ApiResult<Json<Toy>> {
    let toy = state.run(move |store| store.delete_toy(toy_id)).await?;
    if let Err(e) = state.images.delete(&toy.image_url).await {
        warn!("Toy {} deleted but its image could not be removed: {}", toy.id, e);
    }
    info!("{} deleted toy {}", admin.email, toy.id);
    Ok(Json(toy))
}
