//! HTTP surface: `createCustomer`, auth events, record tree and triggers.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use border_core::{Collection, RecordKey, SchemaVersion};
use border_service::crypto::hmac_sha256_hex;
use border_service::ServiceConfig;
use border_store::change::CHANGE_FEED_CAPACITY;
use border_store::Store;

use common::{path, seed_customer, wait_for, FakePayments, TestHarness};

// ============================================================================
// createCustomer
// ============================================================================

#[tokio::test]
async fn create_customer_writes_record_before_responding() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/createCustomer")
        .json(&json!({"userID": "uid_1"}))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({"result": true}));

    let user = harness
        .store
        .get(&path(Collection::User, "uid_1"))
        .unwrap()
        .unwrap();
    let customer_key = user["customerID"].as_str().unwrap();
    let customer = harness
        .store
        .get(&path(Collection::Customer, customer_key))
        .unwrap()
        .unwrap();
    assert_eq!(customer["userID"], "uid_1");
    assert_eq!(customer["stripeCustomerID"], "cus_1");
    assert_eq!(harness.payments.created_customers(), 1);
}

#[tokio::test]
async fn create_customer_requires_user_id() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/createCustomer")
        .json(&json!({"name": "no id"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().is_empty());
    assert_eq!(harness.payments.created_customers(), 0);
}

#[tokio::test]
async fn create_customer_rejects_other_methods() {
    let harness = TestHarness::new();

    let get = harness.server.get("/createCustomer").await;
    get.assert_status(StatusCode::FORBIDDEN);
    assert!(get.text().is_empty());

    let put = harness
        .server
        .put("/createCustomer")
        .json(&json!({"userID": "uid_1"}))
        .await;
    put.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(harness.payments.created_customers(), 0);
}

#[tokio::test]
async fn create_customer_failure_returns_error() {
    let harness = TestHarness::with(FakePayments::declining(), ServiceConfig::default());

    let response = harness
        .server
        .post("/createCustomer")
        .json(&json!({"userID": "uid_1"}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "external_service_error");
    assert_eq!(body["error"]["message"], "Your card was declined.");
    assert!(harness
        .store
        .get(&path(Collection::User, "uid_1"))
        .unwrap()
        .is_none());
}

// ============================================================================
// Auth events
// ============================================================================

#[tokio::test]
async fn user_created_event_provisions_customer() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/auth/events")
        .json(&json!({"type": "user.created", "uid": "uid_1"}))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({"received": true}));
    assert_eq!(harness.payments.created_customers(), 1);
    assert!(harness
        .store
        .get(&path(Collection::User, "uid_1"))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn user_deleted_event_deprovisions_and_removes_user() {
    let harness = TestHarness::new();
    seed_customer(&*harness.store, "uid_1", "c1", "cus_abc");

    let response = harness
        .server
        .post("/v1/auth/events")
        .json(&json!({"type": "user.deleted", "uid": "uid_1"}))
        .await;

    response.assert_status_ok();
    assert_eq!(harness.payments.deleted_customers(), vec!["cus_abc".to_string()]);
    assert!(harness
        .store
        .get(&path(Collection::User, "uid_1"))
        .unwrap()
        .is_none());
    assert!(harness
        .store
        .get(&path(Collection::Customer, "c1"))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn signed_events_are_verified() {
    let config = ServiceConfig {
        auth_webhook_secret: Some("whsec_test".into()),
        ..ServiceConfig::default()
    };
    let harness = TestHarness::with(FakePayments::default(), config);
    let body = r#"{"type":"user.created","uid":"uid_1"}"#;

    let unsigned = harness.server.post("/v1/auth/events").text(body).await;
    unsigned.assert_status(StatusCode::BAD_REQUEST);

    let forged = harness
        .server
        .post("/v1/auth/events")
        .add_header("x-border-signature", hmac_sha256_hex("wrong", body.as_bytes()))
        .text(body)
        .await;
    forged.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.payments.created_customers(), 0);

    let signed = harness
        .server
        .post("/v1/auth/events")
        .add_header("x-border-signature", hmac_sha256_hex("whsec_test", body.as_bytes()))
        .text(body)
        .await;
    signed.assert_status_ok();
    assert_eq!(harness.payments.created_customers(), 1);
}

// ============================================================================
// Record tree and triggers
// ============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["schema_version"], "v1");
    assert_eq!(body["currency"], "JPY");
}

#[tokio::test]
async fn record_crud_round_trip() {
    let harness = TestHarness::new();

    harness
        .server
        .put("/v1/db/user/uid_1")
        .json(&json!({"name": "Aiko"}))
        .await
        .assert_status_ok();

    let patched = harness
        .server
        .patch("/v1/db/user/uid_1")
        .json(&json!({"plan": "pro", "name": null}))
        .await;
    patched.assert_status_ok();
    patched.assert_json(&json!({"plan": "pro"}));

    harness
        .server
        .get("/v1/db/user/uid_1")
        .await
        .assert_json(&json!({"plan": "pro"}));

    harness
        .server
        .delete("/v1/db/user/uid_1")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    harness
        .server
        .get("/v1/db/user/uid_1")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn pushed_records_are_listed() {
    let harness = TestHarness::new();

    let pushed = harness
        .server
        .post("/v1/db/charge")
        .json(&json!({"amount": 100}))
        .await;
    pushed.assert_status(StatusCode::CREATED);
    let key = pushed.json::<Value>()["key"].as_str().unwrap().to_string();

    let listed: Value = harness.server.get("/v1/db/charge").await.json();
    assert!(listed.get(&key).is_some());
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/db/invoice/i1")
        .await
        .assert_status_not_found();
    harness
        .server
        .get("/v1/db/invoice")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn non_object_records_are_rejected() {
    let harness = TestHarness::new();

    harness
        .server
        .put("/v1/db/charge/charge_1")
        .json(&json!([1, 2, 3]))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn written_charge_fires_processor() {
    let harness = TestHarness::new();
    seed_customer(&*harness.store, "uid_1", "c1", "cus_abc");

    harness
        .server
        .put("/v1/db/charge/charge_1")
        .json(&json!({"amount": 1500, "customerID": "c1"}))
        .await
        .assert_status_ok();

    let charge = wait_for(
        &*harness.store,
        &path(Collection::Charge, "charge_1"),
        |v| v["state"] == "done",
    )
    .await;
    assert_eq!(charge["id"], "ch_1");
    assert_eq!(harness.payments.charge_calls().len(), 1);
    assert_eq!(harness.payments.charge_calls()[0].1, "charge_1");
}

#[tokio::test]
async fn written_token_fires_linker() {
    let harness = TestHarness::new();
    seed_customer(&*harness.store, "uid_1", "c1", "cus_abc");

    harness
        .server
        .put("/v1/db/source/s1")
        .json(&json!({"userID": "uid_1"}))
        .await
        .assert_status_ok();
    harness
        .server
        .put("/v1/db/source/s1/token")
        .json(&json!("tok_123"))
        .await
        .assert_status_ok();

    let source = wait_for(
        &*harness.store,
        &path(Collection::Source, "s1"),
        |v| v["state"] == "done",
    )
    .await;
    assert_eq!(source["cardID"], "card_1");
    assert_eq!(
        harness.payments.attached_sources(),
        vec![("cus_abc".to_string(), "tok_123".to_string())]
    );
}

#[tokio::test]
async fn other_schema_versions_do_not_fire_triggers() {
    let harness = TestHarness::new();
    let v2 = SchemaVersion::new("v2").unwrap();
    seed_customer(&*harness.store, "uid_1", "c1", "cus_abc");

    harness
        .store
        .set(
            &v2.record(Collection::Charge, &"charge_1".parse().unwrap()),
            json!({"amount": 100, "customerID": "c1"}),
        )
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(harness.payments.charge_calls().is_empty());
}

#[tokio::test]
async fn charges_written_faster_than_dispatch_are_all_processed() {
    let harness = TestHarness::new();
    seed_customer(&*harness.store, "uid_1", "c1", "cus_abc");
    let count = CHANGE_FEED_CAPACITY + 100;

    // No await in this loop, so the dispatcher cannot keep up with the feed.
    for i in 0..count {
        harness
            .store
            .set(
                &path(Collection::Charge, &format!("charge_{i}")),
                json!({"amount": 100, "customerID": "c1"}),
            )
            .unwrap();
    }

    fn all_done(charges: &[(RecordKey, Value)]) -> bool {
        charges.iter().all(|(_, charge)| charge["state"] == "done")
    }

    let version = SchemaVersion::default();
    for _ in 0..500 {
        if all_done(&harness.store.list(&version, Collection::Charge).unwrap()) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let charges = harness.store.list(&version, Collection::Charge).unwrap();
    assert_eq!(charges.len(), count);
    assert!(all_done(&charges));
    assert_eq!(harness.payments.charge_calls().len(), count);
}
