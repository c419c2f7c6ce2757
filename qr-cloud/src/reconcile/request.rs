//! Order creation request

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::models::{CampaignSpec, PaymentMethod, describe_validation_errors};
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    #[validate(range(min = 0, max = 365))]
    pub units: i64,
    #[validate(range(min = 0))]
    pub extra_days: i64,
    #[validate(range(min = 0.0))]
    pub extra_cost: f64,
    #[validate(range(min = 1))]
    pub total_validity_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub campaign: CampaignSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64))]
    pub campaign_start: Option<String>,
    #[serde(default)]
    pub invoice_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub invoice_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub notes: Option<String>,
    pub price: f64,
    #[validate(nested)]
    pub extension: Extension,
    pub payment: PaymentChoice,
}

fn is_six_digits(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

impl OrderRequest {
    /// Field constraints, then cross-field rules. Runs before anything is
    /// persisted or sent upstream.
    pub fn check(&self) -> ServiceResult<()> {
        self.validate().map_err(|e| {
            ServiceError::Validation(describe_validation_errors(&e, &["campaign"]))
        })?;

        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ServiceError::Validation("price must be positive".into()));
        }

        if let Some(code) = self.payment.code.as_deref() {
            if !is_six_digits(code) {
                return Err(ServiceError::Validation(
                    "payment code must be six digits".into(),
                ));
            }
        }
        if self.payment.method == PaymentMethod::Blik && self.payment.code.is_none() {
            return Err(ServiceError::Validation(
                "BLIK code is required for BLIK payments".into(),
            ));
        }

        self.campaign
            .check_promotion_consistency()
            .map_err(|msg| ServiceError::Validation(msg.to_string()))
    }

    /// Request as stored on the order: everything except the payment code
    pub fn storable_payload(&self) -> Value {
        let mut payload = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut payload {
            map.insert(
                "payment".into(),
                json!({ "method": self.payment.method.as_db() }),
            );
        }
        payload
    }
}

/// Minor currency units from a decimal price
pub fn amount_from_price(price: f64) -> ServiceResult<i64> {
    let amount = (price * 100.0).round();
    if !amount.is_finite() || amount <= 0.0 || amount > i64::MAX as f64 {
        return Err(ServiceError::Validation(
            "Invalid amount computed from price".into(),
        ));
    }
    Ok(amount as i64)
}
