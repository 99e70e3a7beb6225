use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::state::AppState;
use crate::storage::{IMAGE_ROUTE, MAX_IMAGE_SIZE};
use crate::{admin, auth, sack, toys};

/// Room for the text fields and multipart framing around a full-size image.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_SIZE + 256 * 1024;

/// All portal routes plus the public image directory. Role checks live in
/// the handlers' extractors.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let session_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let donator_routes = Router::new()
        .route("/donator/toys", get(toys::list_own_toys).post(toys::upload_toy))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let receiver_routes = Router::new()
        .route("/receiver/toys", get(toys::marketplace))
        .route("/receiver/points", get(sack::view_points))
        .route("/receiver/sack", get(sack::view_sack))
        .route(
            "/receiver/sack/{toy_id}",
            post(sack::add_to_sack).delete(sack::remove_from_sack),
        );

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/receivers/{receiver_id}/points", put(admin::update_points))
        .route("/admin/toys", get(toys::admin_list_toys))
        .route("/admin/toys/{toy_id}", delete(toys::admin_delete_toy))
        .route("/admin/sacks", get(admin::list_sacks));

    let images = ServeDir::new(state.images.dir());

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(donator_routes)
        .merge(receiver_routes)
        .merge(admin_routes)
        .nest_service(IMAGE_ROUTE, images)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
