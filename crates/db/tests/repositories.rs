//! Integration tests for the repository layer against a real database.

use beacon_core::channels::NotificationChannel;
use beacon_core::delivery::{DeliveryIntent, DeliveryTarget, DocumentReference};
use beacon_core::device::{NewDeviceRegistration, Platform};
use beacon_core::rule::{NotificationEvent, RecipientEntry};
use beacon_db::models::delivery::{DeliveryFilter, NewDeliveryAttempt, NewPushDelivery};
use beacon_db::models::rule::CreateNotificationRule;
use beacon_db::repositories::{
    DeliveryAttemptRepo, DeviceRepo, NotificationRuleRepo, PushDeliveryRepo, PushSettingsRepo,
    TeamRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_rule(name: &str, document_type: &str) -> CreateNotificationRule {
    CreateNotificationRule {
        name: name.to_string(),
        enabled: None,
        channel: NotificationChannel::Push,
        document_type: Some(document_type.to_string()),
        event: None,
        condition: None,
        subject_template: None,
        message_template: "{{ doc.name }}".to_string(),
        recipients: vec![],
    }
}

fn registration(device_id: &str, token: &str, user: &str) -> NewDeviceRegistration {
    NewDeviceRegistration {
        user: user.to_string(),
        device_id: device_id.to_string(),
        push_token: token.to_string(),
        platform: Platform::Android,
        device_name: None,
        device_model: Some("Pixel 8".to_string()),
        os_version: None,
    }
}

fn user_delivery(user: &str) -> NewPushDelivery {
    NewPushDelivery::from(&DeliveryIntent {
        subject: "Task approved".into(),
        body: "Replace pump".into(),
        target: DeliveryTarget::User(user.into()),
        rule_id: None,
        reference: Some(DocumentReference {
            doctype: "Task".into(),
            name: "TASK-0001".into(),
        }),
    })
}

async fn insert_delivery(pool: &PgPool, input: &NewPushDelivery) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    PushDeliveryRepo::create(&mut conn, input).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn active_push_rules_carry_their_recipients(pool: PgPool) {
    let mut with_recipients = new_rule("Assigned", "Task");
    with_recipients.event = Some(NotificationEvent::ValueChange("status".into()));
    with_recipients.recipients = vec![
        RecipientEntry::field("assigned_to"),
        RecipientEntry::owner("ana@example.com"),
    ];
    let created = NotificationRuleRepo::create(&pool, &with_recipients)
        .await
        .unwrap();
    assert_eq!(created.event.as_deref(), Some("value_change"));
    assert_eq!(created.value_changed_field.as_deref(), Some("status"));

    let mut disabled = new_rule("Disabled", "Task");
    disabled.enabled = Some(false);
    NotificationRuleRepo::create(&pool, &disabled).await.unwrap();

    let mut email = new_rule("Email", "Task");
    email.channel = NotificationChannel::Email;
    NotificationRuleRepo::create(&pool, &email).await.unwrap();

    NotificationRuleRepo::create(&pool, &new_rule("Other doctype", "Issue"))
        .await
        .unwrap();

    let active = NotificationRuleRepo::list_active_push(&pool, "Task")
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    let (row, recipients) = active.into_iter().next().unwrap();
    let rule = row.into_rule(recipients).unwrap();
    assert_eq!(rule.name, "Assigned");
    assert_eq!(
        rule.recipients,
        vec![
            RecipientEntry::field("assigned_to"),
            RecipientEntry::owner("ana@example.com"),
        ]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn disabling_a_rule_removes_it_from_the_active_set(pool: PgPool) {
    let rule = NotificationRuleRepo::create(&pool, &new_rule("Approved", "Task"))
        .await
        .unwrap();
    assert!(NotificationRuleRepo::set_enabled(&pool, rule.id, false)
        .await
        .unwrap());
    assert!(NotificationRuleRepo::list_active_push(&pool, "Task")
        .await
        .unwrap()
        .is_empty());
    assert!(NotificationRuleRepo::delete(&pool, rule.id).await.unwrap());
    assert!(NotificationRuleRepo::find_by_id(&pool, rule.id)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn registering_the_same_device_twice_updates_the_token(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let first = DeviceRepo::upsert(&mut conn, &registration("d1", "tok-1", "ana@example.com"))
        .await
        .unwrap();
    assert!(first.inserted);

    let second = DeviceRepo::upsert(&mut conn, &registration("d1", "tok-2", "ana@example.com"))
        .await
        .unwrap();
    assert!(!second.inserted);
    assert_eq!(second.device.id, first.device.id);
    drop(conn);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_devices")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let stored = DeviceRepo::list_for_user(&pool, "ana@example.com")
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    let stored = &stored[0];
    assert_eq!(stored.device_id, "d1");
    assert_eq!(stored.push_token, "tok-2");
    assert_eq!(stored.platform, "android");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn token_lookups_are_distinct(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    for (device, token, user) in [
        ("d1", "tok-a", "ana@example.com"),
        ("d2", "tok-a", "ana@example.com"),
        ("d3", "tok-b", "ana@example.com"),
        ("d4", "tok-c", "ben@example.com"),
    ] {
        DeviceRepo::upsert(&mut conn, &registration(device, token, user))
            .await
            .unwrap();
    }
    drop(conn);

    let ana = DeviceRepo::tokens_for_user(&pool, "ana@example.com")
        .await
        .unwrap();
    assert_eq!(ana, vec!["tok-a".to_string(), "tok-b".to_string()]);

    let all = DeviceRepo::all_tokens(&pool).await.unwrap();
    assert_eq!(all.len(), 3);

    assert!(DeviceRepo::tokens_for_user(&pool, "nobody@example.com")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        DeviceRepo::list_for_user(&pool, "ana@example.com")
            .await
            .unwrap()
            .len(),
        3
    );
}

// ---------------------------------------------------------------------------
// Deliveries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_holds_a_lease_until_released(pool: PgPool) {
    let id = insert_delivery(&pool, &user_delivery("ana@example.com")).await;

    let claimed = PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().unwrap();
    assert!(PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().is_none());

    assert!(PushDeliveryRepo::record_failed_attempt(&pool, id, claimed.claim_token, "no devices")
        .await
        .unwrap());
    let record = PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().unwrap();
    assert_eq!(record.status, "NEW");
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.claim_token, claimed.claim_token + 1);
    assert_eq!(record.last_error.as_deref(), Some("no devices"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_claim_cannot_renew_or_finish(pool: PgPool) {
    let id = insert_delivery(&pool, &user_delivery("ana@example.com")).await;
    let first = PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().unwrap();
    assert!(PushDeliveryRepo::renew_claim(&pool, id, first.claim_token, 60)
        .await
        .unwrap());

    // The first lease runs out and another dispatcher takes the record.
    sqlx::query("UPDATE push_deliveries SET claimed_until = NOW() - INTERVAL '1 second' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
    let second = PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().unwrap();

    assert!(!PushDeliveryRepo::renew_claim(&pool, id, first.claim_token, 60)
        .await
        .unwrap());
    assert!(!PushDeliveryRepo::record_failed_attempt(&pool, id, first.claim_token, "late")
        .await
        .unwrap());
    assert!(!PushDeliveryRepo::mark_sent(&pool, id, first.claim_token, None)
        .await
        .unwrap());

    assert!(PushDeliveryRepo::mark_sent(&pool, id, second.claim_token, None)
        .await
        .unwrap());
    let record = PushDeliveryRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(record.status, "SENT");
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.last_error, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sent_records_never_return_to_new(pool: PgPool) {
    let id = insert_delivery(&pool, &user_delivery("ana@example.com")).await;
    let claimed = PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().unwrap();
    let token = claimed.claim_token;
    assert!(PushDeliveryRepo::mark_sent(&pool, id, token, None).await.unwrap());

    assert!(!PushDeliveryRepo::mark_sent(&pool, id, token, None).await.unwrap());
    assert!(!PushDeliveryRepo::record_failed_attempt(&pool, id, token, "late")
        .await
        .unwrap());
    assert!(!PushDeliveryRepo::renew_claim(&pool, id, token, 60).await.unwrap());
    assert!(PushDeliveryRepo::claim(&pool, id, 60).await.unwrap().is_none());
    assert!(PushDeliveryRepo::mark_exhausted(&pool, 0).await.unwrap().is_empty());

    let record = PushDeliveryRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(record.status, "SENT");
    assert!(record.sent_at.is_some());
    assert!(record.claimed_until.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn exhausted_records_fail_and_others_are_retryable(pool: PgPool) {
    let spent = insert_delivery(&pool, &user_delivery("ana@example.com")).await;
    let fresh = insert_delivery(&pool, &user_delivery("ben@example.com")).await;
    for _ in 0..3 {
        let claimed = PushDeliveryRepo::claim(&pool, spent, 60).await.unwrap().unwrap();
        PushDeliveryRepo::record_failed_attempt(&pool, spent, claimed.claim_token, "HTTP 404")
            .await
            .unwrap();
    }

    let failed = PushDeliveryRepo::mark_exhausted(&pool, 3).await.unwrap();
    assert_eq!(failed, vec![spent]);

    let retryable = PushDeliveryRepo::list_retryable(&pool, 3, 0, 10)
        .await
        .unwrap();
    assert_eq!(retryable, vec![fresh]);

    // A live lease hides the record from the sweeper.
    PushDeliveryRepo::claim(&pool, fresh, 60).await.unwrap();
    assert!(PushDeliveryRepo::list_retryable(&pool, 3, 0, 10)
        .await
        .unwrap()
        .is_empty());

    let failed = PushDeliveryRepo::list(
        &pool,
        &DeliveryFilter {
            status: Some("FAILED".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, spent);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn attempts_are_listed_per_delivery(pool: PgPool) {
    let id = insert_delivery(&pool, &user_delivery("ana@example.com")).await;
    let attempts = vec![
        NewDeliveryAttempt {
            push_token: "tok-1".into(),
            success: true,
            http_status: Some(200),
            error: None,
        },
        NewDeliveryAttempt {
            push_token: "tok-2".into(),
            success: false,
            http_status: Some(404),
            error: Some("HTTP 404".into()),
        },
    ];
    DeliveryAttemptRepo::create_many(&pool, id, &attempts)
        .await
        .unwrap();

    let stored = DeliveryAttemptRepo::list_for_delivery(&pool, id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].success);
    assert_eq!(stored[1].http_status, Some(404));
}

// ---------------------------------------------------------------------------
// Teams and settings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn team_membership_is_idempotent(pool: PgPool) {
    TeamRepo::add_member(&pool, "Maintenance", "ana@example.com")
        .await
        .unwrap();
    TeamRepo::add_member(&pool, "Maintenance", "ana@example.com")
        .await
        .unwrap();
    TeamRepo::add_member(&pool, "Maintenance", "ben@example.com")
        .await
        .unwrap();

    let members = TeamRepo::member_ids(&pool, "Maintenance").await.unwrap();
    assert_eq!(members, vec!["ana@example.com", "ben@example.com"]);

    assert!(TeamRepo::remove_member(&pool, "Maintenance", "ben@example.com")
        .await
        .unwrap());
    assert_eq!(
        TeamRepo::list_members(&pool, "Maintenance").await.unwrap().len(),
        1
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn service_account_json_is_replaced(pool: PgPool) {
    PushSettingsRepo::set_service_account_json(&pool, r#"{"project_id":"a"}"#)
        .await
        .unwrap();
    PushSettingsRepo::set_service_account_json(&pool, r#"{"project_id":"b"}"#)
        .await
        .unwrap();
    assert_eq!(
        PushSettingsRepo::service_account_json(&pool)
            .await
            .unwrap()
            .as_deref(),
        Some(r#"{"project_id":"b"}"#)
    );
}
