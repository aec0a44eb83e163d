//! HTTP-level tests for device registration.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use beacon_core::device::{NewDeviceRegistration, Platform};
use beacon_db::repositories::DeviceRepo;
use common::{body_json, get, post_json, TEST_USER};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

const REGISTER: &str = "/api/v1/devices/register";
const DEVICES: &str = "/api/v1/devices";

#[sqlx::test(migrations = "../../db/migrations")]
async fn registering_twice_updates_the_same_row(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool.clone()),
        REGISTER,
        json!({"deviceId": "d1", "fcmToken": "tok-1", "platform": "android", "deviceModel": "Pixel 8"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["status"], "success");
    assert_eq!(first["message"], "Device registered successfully");
    assert!(first["device"].is_number());

    let response = post_json(
        common::build_test_app(pool.clone()),
        REGISTER,
        json!({"deviceId": "d1", "fcmToken": "tok-2", "platform": "iOS"}),
    )
    .await;
    let second = body_json(response).await;
    assert_eq!(second["status"], "success");
    assert_eq!(second["message"], "Device updated successfully");
    assert_eq!(second["device"], first["device"]);

    let response = get(common::build_test_app(pool), DEVICES).await;
    assert_eq!(response.status(), StatusCode::OK);
    let devices = body_json(response).await["data"].as_array().unwrap().clone();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["device_id"], "d1");
    assert_eq!(devices[0]["push_token"], "tok-2");
    assert_eq!(devices[0]["platform"], "ios");
    assert_eq!(devices[0]["user_id"], TEST_USER);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_shows_only_the_acting_users_devices(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    for (device, token, user) in [
        ("d1", "tok-1", TEST_USER),
        ("d2", "tok-2", TEST_USER),
        ("d3", "tok-3", "ben@example.com"),
    ] {
        let registration = NewDeviceRegistration {
            user: user.to_string(),
            device_id: device.to_string(),
            push_token: token.to_string(),
            platform: Platform::Android,
            device_name: None,
            device_model: None,
            os_version: None,
        };
        DeviceRepo::upsert(&mut conn, &registration).await.unwrap();
    }
    drop(conn);

    let response = get(common::build_test_app(pool.clone()), DEVICES).await;
    let json = body_json(response).await;
    let mut ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["device_id"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["d1", "d2"]);

    let request = Request::builder().uri(DEVICES).body(Body::empty()).unwrap();
    let response = common::build_test_app(pool).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_field_is_reported_in_the_body(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool.clone()),
        REGISTER,
        json!({"deviceId": "d1", "platform": "android"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Missing required field: fcmToken");
    assert!(json.get("device").is_none());
    assert!(DeviceRepo::list_for_user(&pool, TEST_USER).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_platform_is_reported_in_the_body(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool),
        REGISTER,
        json!({"deviceId": "d1", "fcmToken": "tok-1", "platform": "windows"}),
    )
    .await;

    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Platform must be either 'android' or 'ios'");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn registration_requires_an_acting_user(pool: PgPool) {
    let request = Request::builder()
        .method("POST")
        .uri(REGISTER)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"deviceId": "d1", "fcmToken": "tok-1", "platform": "android"}).to_string(),
        ))
        .unwrap();

    let response = common::build_test_app(pool).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}
