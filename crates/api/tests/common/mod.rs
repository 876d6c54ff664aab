use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use handoff_api::auth::jwt::{generate_access_token, JwtConfig};
use handoff_api::bootstrap::build_service;
use handoff_api::config::{
    DeploymentMode, DirectoryConfig, FleetConfig, LoopbackConfig, RoleConfig, ServerConfig,
    TicketConfig,
};
use handoff_api::router::build_app_router;
use handoff_api::state::AppState;
use handoff_core::character::{CharacterRecord, Gender, InMemoryCharacterDirectory, Location};
use handoff_core::fleet::{FleetAllocator, LoopbackAllocator};
use handoff_core::pending::InMemoryPendingConnectionStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Loopback deployment answering `game-1` at `10.0.0.5:7777`, in-memory
/// ticket store, default role names.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
        deployment: DeploymentMode::Local,
        loopback: LoopbackConfig {
            server_name: "game-1".to_string(),
            address: "10.0.0.5".to_string(),
            port: 7777,
        },
        fleet: FleetConfig {
            allocator_url: None,
            namespace: "default".to_string(),
            fleet_name: "game-server".to_string(),
            min_available: 1,
            max_available: 99,
            allocation_timeout_secs: 5,
        },
        tickets: TicketConfig {
            ttl_secs: 60,
            reap_interval_secs: 30,
        },
        roles: RoleConfig::default(),
        directory: DirectoryConfig::default(),
        database_url: None,
    }
}

/// Aria, owned by `user-1`, last seen in `overworld`.
pub fn aria() -> CharacterRecord {
    CharacterRecord {
        id: 1,
        owner_id: "user-1".to_string(),
        name: "Aria".to_string(),
        gender: Gender::Female,
        realm: "eu-1".to_string(),
        play_time_secs: 7200,
        location: Location {
            world: "overworld".to_string(),
            map: "harbor".to_string(),
            x: 12.0,
            y: 64.0,
            z: -3.5,
        },
    }
}

/// Borin, owned by `user-2`.
pub fn borin() -> CharacterRecord {
    CharacterRecord {
        id: 2,
        owner_id: "user-2".to_string(),
        name: "Borin".to_string(),
        gender: Gender::Male,
        realm: "eu-1".to_string(),
        play_time_secs: 60,
        location: Location {
            world: "frostreach".to_string(),
            map: "gate".to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
    }
}

/// Build the full application router with the loopback allocator.
pub fn build_test_app() -> Router {
    let config = test_config();
    let allocator = Arc::new(LoopbackAllocator::new(
        config.loopback.server_name.clone(),
        config.loopback.address.clone(),
        config.loopback.port,
    ));
    build_test_app_with_allocator(allocator)
}

/// Build the full application router around a custom allocator.
///
/// Uses the same middleware stack as `main.rs` via [`build_app_router`].
pub fn build_test_app_with_allocator(allocator: Arc<dyn FleetAllocator>) -> Router {
    let config = test_config();
    let directory = Arc::new(InMemoryCharacterDirectory::with_characters([aria(), borin()]));
    let store = Arc::new(InMemoryPendingConnectionStore::new());

    let service = build_service(&config, directory, allocator, store)
        .expect("test config should build a service");

    let state = AppState {
        config: Arc::new(config.clone()),
        connections: Arc::new(service),
        pool: None,
    };
    build_app_router(state, &config)
}

/// Mint a bearer token for `subject` holding `roles`.
pub fn token_for(subject: &str, roles: &[&str]) -> String {
    generate_access_token(subject, roles, &test_config().jwt).expect("token generation")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body, with a bearer token when `token` is given.
pub async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
