//! Inbound payment notification

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericLike {
    Int(i64),
    Text(String),
}

/// Integer given either as a JSON number or as a string of digits
fn numeric_like<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumericLike::deserialize(deserializer)? {
        NumericLike::Int(v) => Ok(v),
        NumericLike::Text(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s
            .parse()
            .map_err(|_| serde::de::Error::custom("numeric value out of range")),
        NumericLike::Text(_) => Err(serde::de::Error::custom("expected digits")),
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    #[serde(deserialize_with = "numeric_like")]
    pub merchant_id: i64,
    #[serde(deserialize_with = "numeric_like")]
    pub pos_id: i64,
    pub session_id: String,
    #[serde(deserialize_with = "numeric_like")]
    pub amount: i64,
    pub currency: String,
    #[serde(deserialize_with = "numeric_like")]
    pub order_id: i64,
    pub sign: String,
    pub status: String,
}
