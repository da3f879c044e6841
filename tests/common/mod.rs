//! Shared setup for the integration tests: the full router over the
//! in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Response;
use axum::Router;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::Value as JsonValue;
use sha2::Sha256;

use condo_billing::adapters::http::{app, BillingAppState, HttpSettings};
use condo_billing::adapters::{InMemoryBillingStore, InMemoryEventBus, InMemoryNotifier};
use condo_billing::domain::billing::{BillingInterval, Plan, Subscription};
use condo_billing::domain::foundation::{CondominiumId, PlanId, SubscriptionId, Timestamp, UserId};
use condo_billing::domain::payment::{PaymentGateway, SharedSecretVerifier};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const ANTI_PHISHING_KEY: &str = "apk_integration_key";
pub const PENDING_VIEW: &str = "/admin/transfers/pending";

pub struct TestApp {
    pub store: Arc<InMemoryBillingStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub notifier: Arc<InMemoryNotifier>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        store.seed_plan(plan(1, 2000, 1));
        store.seed_plan(plan(2, 5000, 3));

        let bus = Arc::new(InMemoryEventBus::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let gateway = PaymentGateway::new(SharedSecretVerifier::new(
            SecretString::new(WEBHOOK_SECRET.to_string()),
            SecretString::new(ANTI_PHISHING_KEY.to_string()),
        ));
        let state = BillingAppState::from_store(
            store.clone(),
            notifier.clone(),
            bus.clone(),
            gateway,
            HttpSettings {
                default_trial_days: 14,
                pending_view_path: PENDING_VIEW.to_string(),
            },
        );

        Self {
            store,
            bus,
            notifier,
            router: app(state, Duration::from_secs(5)),
        }
    }

    /// Seeds a trialing subscription on `plan_id` and returns it.
    pub fn trialing(&self, user_id: i64, plan_id: i64, licenses: u32) -> Subscription {
        let now = Timestamp::now();
        let mut sub = Subscription::start_trial(
            SubscriptionId::new(),
            user(user_id),
            &plan(plan_id, 2000, licenses),
            0,
            now,
        );
        sub.license_count = licenses;
        self.store.seed_subscription(sub.clone());
        sub
    }
}

pub fn plan(id: i64, price_cents: i64, included_licenses: u32) -> Plan {
    Plan {
        id: PlanId::new(id).unwrap(),
        slug: format!("plan-{}", id),
        price_cents,
        currency: "EUR".to_string(),
        billing_interval: BillingInterval::Monthly,
        included_licenses,
        feature_flags: vec![],
        license_pricing_tiers: vec![],
        active: true,
    }
}

pub fn user(id: i64) -> UserId {
    UserId::new(id).unwrap()
}

pub fn condo(id: i64) -> CondominiumId {
    CondominiumId::new(id).unwrap()
}

pub fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

pub async fn json_body(response: Response<Body>) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
