//! Common test utilities for border integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use border_core::{Collection, RecordKey, RecordPath, SchemaVersion, UserId};
use border_service::stripe::{
    Card, Charge, ChargeRequest, Customer, DeletedCustomer, StripeError,
};
use border_service::{create_router, dispatch, AppState, PaymentProvider, ServiceConfig, Triggers};
use border_store::{MemoryStore, Store};

/// How the fake answers payment calls.
#[derive(Debug, Clone)]
enum Failure {
    Declined,
    Status(u16),
}

#[derive(Debug, Default)]
struct Calls {
    customers_created: usize,
    customers_deleted: Vec<String>,
    sources_attached: Vec<(String, String)>,
    charge_calls: Vec<(ChargeRequest, String)>,
    charges_by_key: HashMap<String, Charge>,
}

/// Recording stand-in for Stripe.
///
/// Charges are deduplicated by idempotency key the way Stripe does it, and
/// every raw call is recorded so tests can count them.
#[derive(Debug, Default)]
pub struct FakePayments {
    failure: Option<Failure>,
    delay: Option<Duration>,
    calls: Mutex<Calls>,
}

impl FakePayments {
    /// Every call fails with a `card_error` ("Your card was declined.").
    pub fn declining() -> Self {
        Self {
            failure: Some(Failure::Declined),
            ..Self::default()
        }
    }

    /// Every call fails with an unreadable error response.
    pub fn failing_with_status(status: u16) -> Self {
        Self {
            failure: Some(Failure::Status(status)),
            ..Self::default()
        }
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn created_customers(&self) -> usize {
        self.calls.lock().unwrap().customers_created
    }

    pub fn deleted_customers(&self) -> Vec<String> {
        self.calls.lock().unwrap().customers_deleted.clone()
    }

    /// `(customer, token)` pairs passed to `attach_source`.
    pub fn attached_sources(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().sources_attached.clone()
    }

    /// `(request, idempotency key)` for every raw `create_charge` call.
    pub fn charge_calls(&self) -> Vec<(ChargeRequest, String)> {
        self.calls.lock().unwrap().charge_calls.clone()
    }

    async fn answer(&self) -> Result<(), StripeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            None => Ok(()),
            Some(Failure::Declined) => Err(StripeError::Api {
                error_type: "card_error".into(),
                message: "Your card was declined.".into(),
                code: Some("card_declined".into()),
            }),
            Some(Failure::Status(status)) => Err(StripeError::Status { status: *status }),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_customer(&self, user_id: &UserId) -> Result<Customer, StripeError> {
        self.answer().await?;
        let mut calls = self.calls.lock().unwrap();
        calls.customers_created += 1;
        Ok(Customer {
            id: format!("cus_{}", calls.customers_created),
            object: Some("customer".into()),
            metadata: serde_json::json!({ "userID": user_id.as_str() }),
            created: 1_700_000_000,
        })
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<DeletedCustomer, StripeError> {
        self.answer().await?;
        self.calls
            .lock()
            .unwrap()
            .customers_deleted
            .push(customer_id.to_string());
        Ok(DeletedCustomer {
            id: customer_id.to_string(),
            deleted: true,
        })
    }

    async fn attach_source(&self, customer_id: &str, token: &str) -> Result<Card, StripeError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls
                .sources_attached
                .push((customer_id.to_string(), token.to_string()));
        }
        self.answer().await?;
        let n = self.calls.lock().unwrap().sources_attached.len();
        Ok(Card {
            id: format!("card_{n}"),
            object: Some("card".into()),
            brand: Some("Visa".into()),
            country: Some("JP".into()),
            customer: Some(customer_id.to_string()),
            cvc_check: Some("pass".into()),
            exp_month: Some(12),
            exp_year: Some(2030),
            fingerprint: Some("fp_test".into()),
            funding: Some("credit".into()),
            last4: Some("4242".into()),
        })
    }

    async fn create_charge(
        &self,
        request: &ChargeRequest,
        idempotency_key: &str,
    ) -> Result<Charge, StripeError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls
                .charge_calls
                .push((request.clone(), idempotency_key.to_string()));
        }
        self.answer().await?;

        let mut calls = self.calls.lock().unwrap();
        let next = calls.charges_by_key.len() + 1;
        let charge = calls
            .charges_by_key
            .entry(idempotency_key.to_string())
            .or_insert_with(|| Charge {
                id: format!("ch_{next}"),
                object: Some("charge".into()),
                amount: request.amount,
                currency: Some(request.currency.to_lowercase()),
                customer: Some(request.customer.clone()),
                paid: true,
                captured: true,
                status: Some("succeeded".into()),
                failure_message: None,
                created: 1_700_000_000,
            });
        Ok(charge.clone())
    }
}

/// Handlers over a fresh in-memory store.
pub fn triggers(payments: &Arc<FakePayments>) -> (Triggers, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let triggers = Triggers::new(
        store.clone(),
        payments.clone(),
        SchemaVersion::default(),
        "JPY",
    );
    (triggers, store)
}

/// Path of a record under the default schema version.
pub fn path(collection: Collection, key: &str) -> RecordPath {
    SchemaVersion::default().record(collection, &RecordKey::new(key).unwrap())
}

/// Seed `user/{user} → customer/{customer}` with the given Stripe id.
pub fn seed_customer(store: &dyn Store, user: &str, customer: &str, stripe_id: &str) {
    store
        .set(
            &path(Collection::Customer, customer),
            serde_json::json!({
                "_createdAt": 1,
                "_updatedAt": 1,
                "userID": user,
                "stripeCustomerID": stripe_id,
            }),
        )
        .unwrap();
    store
        .set_child(
            &path(Collection::User, user),
            "customerID",
            Value::String(customer.to_string()),
        )
        .unwrap();
}

/// Poll a record until `done` accepts it.
///
/// # Panics
///
/// Panics if the record never reaches the expected shape.
pub async fn wait_for(
    store: &dyn Store,
    path: &RecordPath,
    done: impl Fn(&Value) -> bool,
) -> Value {
    for _ in 0..200 {
        if let Some(value) = store.get(path).unwrap() {
            if done(&value) {
                return value;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{path} never reached the expected state: {:?}", store.get(path).unwrap());
}

/// Formatted log output captured from the current thread.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture log output on this thread until the guard is dropped.
///
/// Only covers work polled on the calling thread, which holds for the
/// default current-thread `#[tokio::test]` runtime.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// Test harness containing everything needed for HTTP integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Store behind the server, for seeding and inspecting records.
    pub store: Arc<MemoryStore>,
    /// Payment fake behind the handlers.
    pub payments: Arc<FakePayments>,
    /// Write-trigger dispatcher (aborted on drop).
    dispatcher: JoinHandle<()>,
}

impl TestHarness {
    /// Create a harness with a fresh store and a succeeding payment fake.
    pub fn new() -> Self {
        Self::with(FakePayments::default(), ServiceConfig::default())
    }

    /// Create a harness with the given payment fake and configuration.
    pub fn with(payments: FakePayments, config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(payments);

        let state = AppState::with_payments(store.clone(), config, payments.clone())
            .expect("Failed to build app state");
        let dispatcher = dispatch::spawn(Arc::clone(&state.triggers), &*store);

        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            payments,
            dispatcher,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
