//! Shared helpers for integration tests: a router wired to an in-memory
//! SQLite mapping store and a temp-dir disk object store.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use lfs_depot::{
    models::batch::LFS_MEDIA_TYPE,
    routes,
    services::{
        mapping_store::{MappingStore, SqliteMappingStore},
        object_store::{DiskObjectStore, ObjectStore},
        path_resolver::NoHints,
        AppState, ServerSettings,
    },
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PUBLIC_URL: &str = "http://localhost:8123";

pub async fn test_app() -> (Router, TempDir) {
    let tmp = tempfile::tempdir().unwrap();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for stmt in include_str!("../../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }

    let mapping: Arc<dyn MappingStore> = Arc::new(SqliteMappingStore::new(Arc::new(pool)));
    let store: Arc<dyn ObjectStore> = Arc::new(DiskObjectStore::new(tmp.path(), "lfs"));

    let state = AppState::new(
        mapping,
        store,
        Arc::new(NoHints),
        ServerSettings {
            public_url: PUBLIC_URL.into(),
            action_ttl_secs: 3600,
            backend_timeout: Duration::from_secs(5),
            bucket: "lfs".into(),
            storage_dir: tmp.path().display().to_string(),
            mapping_backend_name: "sqlite",
        },
    );

    (routes::routes::routes().with_state(state), tmp)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn batch(app: &Router, repo: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(format!("/{}/objects/batch", repo))
            .header("content-type", LFS_MEDIA_TYPE)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn put_object(app: &Router, repo: &str, oid: &str, bytes: Vec<u8>) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method("PUT")
            .uri(format!("/{}/objects/{}", repo, oid))
            .body(Body::from(bytes))
            .unwrap(),
    )
    .await
}

pub async fn get_object(app: &Router, repo: &str, oid: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(format!("/{}/objects/{}", repo, oid))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn oid_hex(content: &[u8]) -> String {
    lfs_depot::models::oid::Oid::from_content(content).to_hex()
}
