use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use newsroom_core::NewsStore;
use newsroom_core::models::{NewArticle, RawArticle};

use crate::integration::common::{setup_test_app, setup_unresponsive_app};

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn collect_request() -> Request<Body> {
    Request::post("/v1/collect").body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let app = setup_unresponsive_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["database"], "error");
    assert_eq!(json["collector"], "idle");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_unresponsive_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/v1/collect"].is_object());
}

#[tokio::test]
async fn collect_fails_when_database_is_unreachable() {
    let app = setup_unresponsive_app().await;

    let response = app.router.oneshot(collect_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "database_error");
    assert_eq!(app.state.scheduler.state(), newsroom_core::SchedulerState::Idle);
}

#[tokio::test]
async fn concurrent_collect_is_rejected() {
    let app = setup_unresponsive_app().await;

    let first = tokio::spawn(app.router.clone().oneshot(collect_request()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = app.router.clone().oneshot(collect_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(second).await["error"], "already_running");

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn collect_seeds_sources_and_reports() {
    let app = setup_test_app().await;

    let response = app.router.clone().oneshot(collect_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["total_found"], 0);
    assert_eq!(report["total_new"], 0);
    assert_eq!(report["errors"].as_array().unwrap().len(), 0);
    assert_eq!(report["sources"].as_array().unwrap().len(), 2);

    let response = app
        .router
        .oneshot(Request::get("/v1/sources").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 2);
    assert!(json["sources"][0]["last_checked_at"].is_string());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn articles_are_listed_newest_first() {
    let app = setup_test_app().await;
    let store = app.state.db.store();

    // Seed sources through a cycle, then add articles directly.
    app.state.scheduler.trigger().await.unwrap();
    let source = store.get_active_sources().await.unwrap().remove(0);

    let now = Utc::now();
    for (i, hours) in [2, 1, 200].into_iter().enumerate() {
        let raw = RawArticle {
            title: format!("Story {i}"),
            url: format!("https://one.test/{i}"),
            summary: String::new(),
            author: String::new(),
            published_at: now - TimeDelta::hours(hours),
            content: String::new(),
        };
        store
            .insert_article(&NewArticle::from_raw(source.id, raw))
            .await
            .unwrap();
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v1/articles?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["articles"][0]["url"], "https://one.test/1");
    assert_eq!(json["articles"][1]["url"], "https://one.test/0");

    let response = app
        .router
        .oneshot(
            Request::get("/v1/articles/top?hours=24")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["total"], 2);
}
