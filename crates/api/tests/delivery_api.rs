//! HTTP-level tests for delivery inspection.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use beacon_core::delivery::{DeliveryIntent, DeliveryTarget, TokenResult};
use beacon_core::types::DbId;
use beacon_events::store::DeliveryStore;
use beacon_events::PgStore;
use common::{body_json, get};
use sqlx::PgPool;
use tower::ServiceExt;

fn intent(target: DeliveryTarget) -> DeliveryIntent {
    DeliveryIntent {
        subject: "Task approved".into(),
        body: "Replace pump".into(),
        target,
        rule_id: None,
        reference: None,
    }
}

/// One broadcast record marked sent with two attempts, one user record left NEW.
async fn seed(pool: &PgPool) -> Vec<DbId> {
    let store = PgStore::new(pool.clone());
    let ids = store
        .create_deliveries(&[
            intent(DeliveryTarget::Broadcast),
            intent(DeliveryTarget::User("ana@example.com".into())),
        ])
        .await
        .unwrap();
    let claimed = store
        .claim(ids[0], Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    store
        .record_attempts(
            ids[0],
            &[
                TokenResult::success("t1", 200),
                TokenResult::failure("t2", Some(404), "FCM returned HTTP 404: UNREGISTERED"),
            ],
        )
        .await
        .unwrap();
    store
        .mark_sent(ids[0], claimed.claim, Some("t2: FCM returned HTTP 404: UNREGISTERED"))
        .await
        .unwrap();
    ids
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lists_newest_first_in_data_envelope(pool: PgPool) {
    let ids = seed(&pool).await;

    let response = get(common::build_test_app(pool), "/api/v1/deliveries").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], ids[1]);
    assert_eq!(data[1]["id"], ids[0]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn filters_by_status(pool: PgPool) {
    let ids = seed(&pool).await;

    let app = common::build_test_app(pool.clone());
    let response = get(app, "/api/v1/deliveries?status=sent").await;
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], ids[0]);
    assert_eq!(data[0]["status"], "SENT");

    let response = get(common::build_test_app(pool), "/api/v1/deliveries?status=DONE").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn single_record_includes_attempts(pool: PgPool) {
    let ids = seed(&pool).await;

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/deliveries/{}", ids[0]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["broadcast"], true);
    assert_eq!(data["attempt_count"], 1);
    let attempts = data["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts.iter().filter(|a| a["success"] == true).count(), 1);
    let failed = attempts.iter().find(|a| a["success"] == false).unwrap();
    assert_eq!(failed["push_token"], "t2");
    assert_eq!(failed["http_status"], 404);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_record_returns_404(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/api/v1/deliveries/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_requires_acting_user(pool: PgPool) {
    let request = Request::builder()
        .uri("/api/v1/deliveries")
        .body(Body::empty())
        .unwrap();
    let response = common::build_test_app(pool).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}
