//! Test doubles and helpers shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use qr_cloud::db::{MemoryStore, Store};
use qr_cloud::email::{CampaignSummary, Notifier, NotifyError};
use qr_cloud::gateway::{
    GatewayConfig, GatewayError, GatewayResult, PaymentGateway, RegisterRequest, Registration,
    Verification,
};
use qr_cloud::provisioner::ProvisionSettings;
use qr_cloud::reconcile::OrderSettings;
use qr_cloud::signing::sign;
use qr_cloud::state::{AppState, ServiceSettings};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const MERCHANT_ID: i64 = 1001;
pub const POS_ID: i64 = 2002;
pub const CRC: &str = "test-crc";
pub const PUBLIC_URL: &str = "https://qr.test";

/// Scripted gateway that records every call
pub struct FakeGateway {
    config: GatewayConfig,
    next_order_id: AtomicI64,
    verify_status: Mutex<String>,
    fail_register: AtomicBool,
    fail_charge: AtomicBool,
    /// When set, `verify_transaction` claims the order first, as a
    /// notification arriving mid-charge would
    claim_on_verify: Mutex<Option<MemoryStore>>,
    pub registrations: Mutex<Vec<RegisterRequest>>,
    pub charges: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig {
                merchant_id: MERCHANT_ID,
                pos_id: POS_ID,
                api_key: "test-key".into(),
                crc: CRC.into(),
                api_url: "https://gateway.test/api/v1".into(),
                payment_url: "https://gateway.test".into(),
                return_url: None,
                status_url: None,
            },
            next_order_id: AtomicI64::new(500),
            verify_status: Mutex::new("success".into()),
            fail_register: AtomicBool::new(false),
            fail_charge: AtomicBool::new(false),
            claim_on_verify: Mutex::new(None),
            registrations: Mutex::new(Vec::new()),
            charges: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verify_status(&self, status: &str) {
        *self.verify_status.lock() = status.to_string();
    }

    pub fn fail_register(&self, on: bool) {
        self.fail_register.store(on, Ordering::SeqCst);
    }

    pub fn fail_charge(&self, on: bool) {
        self.fail_charge.store(on, Ordering::SeqCst);
    }

    pub fn claim_on_verify(&self, store: MemoryStore) {
        *self.claim_on_verify.lock() = Some(store);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn register_transaction(&self, request: &RegisterRequest) -> GatewayResult<Registration> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(GatewayError::Status(500));
        }
        self.registrations.lock().push(request.clone());
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Ok(Registration {
            token: format!("TOKEN-{order_id}"),
            order_id,
        })
    }

    async fn charge_immediate_code(&self, token: &str, code: &str) -> GatewayResult<()> {
        if self.fail_charge.load(Ordering::SeqCst) {
            return Err(GatewayError::Status(400));
        }
        self.charges.lock().push((token.to_string(), code.to_string()));
        Ok(())
    }

    async fn verify_transaction(
        &self,
        session_id: &str,
        _amount: i64,
        _currency: &str,
        _order_id: i64,
    ) -> GatewayResult<Verification> {
        let claimer = self.claim_on_verify.lock().clone();
        if let Some(store) = claimer {
            if let Some(order) = store.order_by_session(session_id) {
                store
                    .claim_provisioning(&order.id, 1)
                    .await
                    .map_err(|e| GatewayError::MalformedBody(e.to_string()))?;
            }
        }
        Ok(Verification {
            status: self.verify_status.lock().clone(),
        })
    }
}

/// Notifier that keeps what it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<CampaignSummary>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_campaign_summary(&self, summary: &CampaignSummary) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("mail relay down".into());
        }
        self.sent.lock().push(summary.clone());
        Ok(())
    }
}

pub fn settings(allow_direct_campaigns: bool) -> ServiceSettings {
    let (return_url, status_url) = OrderSettings::resolve(PUBLIC_URL, None, None, None);
    ServiceSettings {
        provision: ProvisionSettings {
            public_base_url: PUBLIC_URL.into(),
            asset_base_url: format!("{PUBLIC_URL}/assets"),
            asset_bucket: "promo-assets".into(),
        },
        orders: OrderSettings {
            currency: "PLN".into(),
            country: "PL".into(),
            language: "pl".into(),
            return_url,
            status_url,
        },
        allow_direct_campaigns,
        cors_allowed_origin: None,
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_direct_campaigns(false)
    }

    pub fn with_direct_campaigns(allow: bool) -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::from_parts(
            Arc::new(store.clone()) as Arc<dyn Store>,
            gateway.clone(),
            notifier.clone(),
            settings(allow),
        );
        Self {
            store,
            gateway,
            notifier,
            state,
        }
    }

    pub fn router(&self) -> Router {
        qr_cloud::api::create_router(self.state.clone())
    }
}

pub fn order_body(method: &str) -> Value {
    let mut payment = json!({ "method": method });
    if method != "transfer" {
        payment["code"] = json!("777123");
    }
    json!({
        "email": "shop@example.com",
        "maxScans": 2,
        "promotionType": "promo_code",
        "promoCode": "SPRING25",
        "cashierCode": "K-9",
        "price": 49.99,
        "extension": { "units": 0, "extraDays": 0, "extraCost": 0, "totalValidityDays": 30 },
        "payment": payment
    })
}

/// Notification signed the way the gateway signs it
pub fn notification(session_id: &str, order_id: i64, amount: i64, status: &str) -> Value {
    let signature = sign(&[&session_id, &order_id, &amount, &"PLN"], CRC);
    json!({
        "merchantId": MERCHANT_ID,
        "posId": POS_ID,
        "sessionId": session_id,
        "amount": amount,
        "currency": "PLN",
        "orderId": order_id,
        "sign": signature,
        "status": status
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
