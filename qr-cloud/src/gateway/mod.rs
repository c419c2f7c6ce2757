//! Payment gateway client (Przelewy24 REST API, no SDK dependency)
//!
//! Every call is a JSON request with HTTP basic auth `posId:apiKey`. Responses
//! arrive in a `{"data": ...}` envelope; [`decode_envelope`] turns the raw
//! status and body into a typed payload or a [`GatewayError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::signing::sign;

pub const DEFAULT_API_URL: &str = "https://sandbox.przelewy24.pl/api/v1";
pub const DEFAULT_PAYMENT_URL: &str = "https://sandbox.przelewy24.pl";
const DEFAULT_CUSTOMER_IP: &str = "127.0.0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status string the gateway reports for a confirmed payment
pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway request failed with status {0}")]
    Status(u16),
    #[error("Unexpected response from payment gateway: {0}")]
    MalformedBody(String),
    #[error("Payment gateway returned empty payload")]
    EmptyPayload,
    #[error("Payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: i64,
    pub pos_id: i64,
    pub api_key: String,
    pub crc: String,
    pub api_url: String,
    pub payment_url: String,
    pub return_url: Option<String>,
    pub status_url: Option<String>,
}

impl GatewayConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }
}

/// Transaction registration parameters
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub session_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub email: String,
    pub country: String,
    pub language: String,
    pub url_return: String,
    pub url_status: String,
    pub customer_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub token: String,
    pub order_id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub status: String,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// What the reconciliation core needs from a payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Merchant identity and CRC secret, also used to check notifications
    fn config(&self) -> &GatewayConfig;

    async fn register_transaction(&self, request: &RegisterRequest) -> GatewayResult<Registration>;

    /// Charge a registered transaction with a six-digit immediate code
    async fn charge_immediate_code(&self, token: &str, code: &str) -> GatewayResult<()>;

    async fn verify_transaction(
        &self,
        session_id: &str,
        amount: i64,
        currency: &str,
        order_id: i64,
    ) -> GatewayResult<Verification>;

    /// Hosted payment page for a registered transaction
    fn redirect_url(&self, token: &str) -> String {
        format!(
            "{}/trnRequest/{}",
            self.config().payment_url.trim_end_matches('/'),
            token
        )
    }
}

pub fn register_body(config: &GatewayConfig, request: &RegisterRequest) -> Value {
    let signature = sign(
        &[
            &config.merchant_id,
            &config.pos_id,
            &request.session_id,
            &request.amount,
            &request.currency,
        ],
        &config.crc,
    );
    json!({
        "merchantId": config.merchant_id,
        "posId": config.pos_id,
        "sessionId": request.session_id,
        "amount": request.amount,
        "currency": request.currency,
        "description": request.description,
        "email": request.email,
        "country": request.country,
        "language": request.language,
        "urlReturn": request.url_return,
        "urlStatus": request.url_status,
        "customerIp": request.customer_ip.as_deref().unwrap_or(DEFAULT_CUSTOMER_IP),
        "sign": signature,
    })
}

pub fn charge_body(config: &GatewayConfig, token: &str, code: &str) -> Value {
    let signature = sign(&[&config.merchant_id, &token, &code], &config.crc);
    json!({
        "merchantId": config.merchant_id,
        "posId": config.pos_id,
        "token": token,
        "blikCode": code,
        "sign": signature,
    })
}

pub fn verify_body(
    config: &GatewayConfig,
    session_id: &str,
    amount: i64,
    currency: &str,
    order_id: i64,
) -> Value {
    let signature = sign(&[&session_id, &order_id, &amount, &currency], &config.crc);
    json!({
        "merchantId": config.merchant_id,
        "posId": config.pos_id,
        "sessionId": session_id,
        "amount": amount,
        "currency": currency,
        "orderId": order_id,
        "sign": signature,
    })
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Unwrap a gateway response
///
/// Non-2xx statuses fail first, then unparseable bodies. A successful
/// response without a usable payload (empty body, `null`, missing `data`
/// content) is a protocol violation, never a success.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> GatewayResult<T> {
    if !(200..300).contains(&status) {
        tracing::error!(status, body = %body, "Payment gateway API error");
        return Err(GatewayError::Status(status));
    }

    if body.trim().is_empty() {
        tracing::error!(status, "Payment gateway returned an empty body");
        return Err(GatewayError::EmptyPayload);
    }

    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(body = %body, "Failed to parse payment gateway response");
        GatewayError::MalformedBody(e.to_string())
    })?;

    let data = match parsed {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    if is_empty_payload(&data) {
        tracing::error!("Payment gateway returned empty payload");
        return Err(GatewayError::EmptyPayload);
    }

    serde_json::from_value(data).map_err(|e| GatewayError::MalformedBody(e.to_string()))
}

/// REST implementation of [`PaymentGateway`]
pub struct GatewayClient {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
    ) -> GatewayResult<T> {
        let response = self
            .http
            .request(method, self.config.endpoint(path))
            .basic_auth(self.config.pos_id.to_string(), Some(&self.config.api_key))
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        decode_envelope(status, &text)
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn register_transaction(&self, request: &RegisterRequest) -> GatewayResult<Registration> {
        let body = register_body(&self.config, request);
        let registration: Registration = self
            .call(reqwest::Method::POST, "transaction/register", &body)
            .await?;
        tracing::info!(
            session_id = %request.session_id,
            gateway_order_id = registration.order_id,
            "Transaction registered"
        );
        Ok(registration)
    }

    async fn charge_immediate_code(&self, token: &str, code: &str) -> GatewayResult<()> {
        let body = charge_body(&self.config, token, code);
        let _: Value = self
            .call(reqwest::Method::POST, "paymentmethods/blik/charge", &body)
            .await?;
        Ok(())
    }

    async fn verify_transaction(
        &self,
        session_id: &str,
        amount: i64,
        currency: &str,
        order_id: i64,
    ) -> GatewayResult<Verification> {
        let body = verify_body(&self.config, session_id, amount, currency, order_id);
        self.call(reqwest::Method::PUT, "transaction/verify", &body)
            .await
    }
}
