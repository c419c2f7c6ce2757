//! Order Model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order lifecycle status
///
/// `Pending` is the only non-terminal state; `Paid` and `Failed` are
/// absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// `Paid` and `Failed` accept no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Payment method chosen by the purchaser
///
/// `Blik` is the immediate six-digit code flow, confirmed synchronously;
/// `Transfer` redirects to the gateway and completes through the webhook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[serde(alias = "immediate-code")]
    Blik,
    Transfer,
}

impl PaymentMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "blik" => Some(Self::Blik),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Blik => "blik",
            Self::Transfer => "transfer",
        }
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Caller-visible id, also the gateway session id
    pub session_id: String,
    pub email: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub gateway_token: Option<String>,
    pub gateway_order_id: Option<i64>,
    /// Campaign specification to provision on success, stored verbatim
    pub campaign_spec: Value,
    /// Request payload without the payment code
    pub payload: Value,
    pub extension: Value,
    pub invoice_requested: bool,
    pub invoice_details: Option<String>,
    pub notes: Option<String>,
    pub campaign_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Set by the path that won the right to provision
    pub provisioning_started_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub created_at: i64,
}

impl Order {
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
        }
    }
}

/// Create order payload (always inserted as `pending`)
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: String,
    pub session_id: String,
    pub email: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub campaign_spec: Value,
    pub payload: Value,
    pub extension: Value,
    pub invoice_requested: bool,
    pub invoice_details: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
}

impl NewOrder {
    /// The row as it exists right after insertion
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            session_id: self.session_id,
            email: self.email,
            amount: self.amount,
            currency: self.currency,
            payment_method: self.payment_method,
            status: OrderStatus::Pending,
            gateway_token: None,
            gateway_order_id: None,
            campaign_spec: self.campaign_spec,
            payload: self.payload,
            extension: self.extension,
            invoice_requested: self.invoice_requested,
            invoice_details: self.invoice_details,
            notes: self.notes,
            campaign_id: None,
            failure_reason: None,
            provisioning_started_at: None,
            paid_at: None,
            created_at: self.created_at,
        }
    }
}

/// Order as echoed back to the purchaser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub session_id: String,
    pub amount: i64,
    pub currency: String,
}
