#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use sack_api::auth::{create_token, hash_password};
use sack_api::router::build_router;
use sack_api::state::{AppState, AppStateInner, AuthConfig};
use sack_api::storage::ImageStore;
use sack_db::{Database, MarketStore};
use sack_types::models::{NewProfile, NewToy, Profile, Role, Toy, ToyCondition};

pub const PASSWORD: &str = "sugarplum-fairy";
pub const PUBLIC_URL: &str = "http://localhost:3000";
pub const BOUNDARY: &str = "sack-test-boundary";

/// Smallest byte string the image sniffer accepts as a PNG.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret-0123456789".to_string(),
        token_ttl: chrono::Duration::hours(1),
    }
}

/// Router backed by an in-memory database and a throwaway image directory.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<Database>,
    pub state: AppState,
    pub images: TempDir,
}

pub async fn build_test_app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    let images = tempfile::tempdir().expect("temp image dir");
    let store: Arc<dyn MarketStore> = db.clone();
    let state = build_state(store, &images).await;
    TestApp {
        router: build_router(state.clone()),
        db,
        state,
        images,
    }
}

pub async fn build_state(store: Arc<dyn MarketStore>, images: &TempDir) -> AppState {
    let images = ImageStore::new(images.path().to_path_buf(), PUBLIC_URL)
        .await
        .expect("image store");
    Arc::new(AppStateInner {
        store,
        images,
        auth: auth_config(),
    })
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Inserts a profile directly and returns it with a signed token.
    pub fn seed_user(&self, role: Role, email: &str, points: Option<i64>) -> (Profile, String) {
        let profile = self
            .db
            .create_profile(&NewProfile {
                email: email.to_string(),
                full_name: format!("{role} {email}"),
                role,
                password_hash: hash_password(PASSWORD).expect("hash"),
                total_points: points,
            })
            .expect("seed profile");
        let token = create_token(&self.state.auth, &profile).expect("token");
        (profile, token)
    }

    pub fn seed_toy(&self, donator: &Profile, title: &str, points: i64) -> Toy {
        self.db
            .insert_toy(&NewToy {
                title: title.to_string(),
                description: None,
                points,
                image_url: format!("{PUBLIC_URL}/images/{title}.png"),
                donator_id: donator.id,
                condition: ToyCondition::Good,
                age_range: "all ages".to_string(),
                category: "other".to_string(),
            })
            .expect("seed toy")
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, Some(token)).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let req = request(Method::POST, uri, None)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let req = request(Method::POST, uri, Some(token))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::POST, uri, Some(token)).body(Body::empty()).unwrap()).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let req = request(Method::PUT, uri, Some(token))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::DELETE, uri, Some(token)).body(Body::empty()).unwrap()).await
}

/// Hand-built multipart body: text fields, then an optional `image` file.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"toy.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: Vec<u8>,
) -> Response<Body> {
    let req = request(Method::POST, uri, Some(token))
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, req).await
}
