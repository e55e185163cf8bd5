//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use deployd_axum::{CorsConfig, create_router, create_spa_router};
use http_body_util::BodyExt;
use tokio_test::assert_ok;
use tower::ServiceExt;

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(common::context(dir.path()), &CorsConfig::AllowAll);

    let response = assert_ok!(
        app.oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
    );

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn test_observer_path_requires_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(common::context(dir.path()), &CorsConfig::AllowAll);

    let response = app
        .oneshot(Request::get("/api/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_path_without_static_dir_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(common::context(dir.path()), &CorsConfig::AllowAll);

    let response = app
        .oneshot(Request::get("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_spa_router_serves_assets_and_falls_back_to_index() {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("dist");
    std::fs::create_dir(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html>deployd</html>").unwrap();
    std::fs::write(static_dir.join("app.js"), "console.log(1)").unwrap();

    let app = create_spa_router(
        common::context(dir.path()),
        &static_dir,
        &CorsConfig::AllowAll,
    );

    let asset = app
        .clone()
        .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(asset.status(), StatusCode::OK);
    assert_eq!(body_text(asset).await, "console.log(1)");

    let fallback = app
        .clone()
        .oneshot(Request::get("/logs/server").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(fallback.status(), StatusCode::OK);
    assert_eq!(body_text(fallback).await, "<html>deployd</html>");

    let health = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_text(health).await, "OK");
}

#[tokio::test]
async fn test_cors_allowed_origin_is_echoed() {
    let dir = tempfile::tempdir().unwrap();
    let cors = CorsConfig::AllowOrigins(vec!["http://localhost:3000".to_string()]);
    let app = create_router(common::context(dir.path()), &cors);

    let response = app
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}
