//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment / gateway errors
//! - 6xxx: Campaign and scan errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 on the wire so clients can switch on it without
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order could not be finalized
    OrderFinalizeFailed = 4004,

    // ==================== 5xxx: Payment ====================
    /// Payment gateway request failed
    GatewayRequestFailed = 5010,
    /// Payment gateway answered with an unexpected payload
    GatewayProtocolError = 5011,
    /// Notification signature does not match
    SignatureInvalid = 5012,
    /// Notification is addressed to another merchant
    MerchantMismatch = 5013,
    /// Notified amount or currency differs from the order
    PaymentAmountMismatch = 5014,

    // ==================== 6xxx: Campaign ====================
    /// QR image rendering failed
    QrRenderFailed = 6201,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Validation failed",

            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderFinalizeFailed => "Failed to finalize order",

            ErrorCode::GatewayRequestFailed => "Payment gateway request failed",
            ErrorCode::GatewayProtocolError => "Unexpected response from payment gateway",
            ErrorCode::SignatureInvalid => "Invalid signature",
            ErrorCode::MerchantMismatch => "Merchant mismatch",
            ErrorCode::PaymentAmountMismatch => "Amount mismatch",

            ErrorCode::QrRenderFailed => "Failed to render QR code",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ErrorCode::ValidationFailed),

            4001 => Ok(ErrorCode::OrderNotFound),
            4004 => Ok(ErrorCode::OrderFinalizeFailed),

            5010 => Ok(ErrorCode::GatewayRequestFailed),
            5011 => Ok(ErrorCode::GatewayProtocolError),
            5012 => Ok(ErrorCode::SignatureInvalid),
            5013 => Ok(ErrorCode::MerchantMismatch),
            5014 => Ok(ErrorCode::PaymentAmountMismatch),

            6201 => Ok(ErrorCode::QrRenderFailed),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::SignatureInvalid.code(), 5012);
        assert_eq!(ErrorCode::QrRenderFailed.code(), 6201);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_roundtrip() {
        for code in [
            ErrorCode::ValidationFailed,
            ErrorCode::OrderFinalizeFailed,
            ErrorCode::GatewayProtocolError,
            ErrorCode::QrRenderFailed,
            ErrorCode::DatabaseError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::ValidationFailed.to_string(), "E0002");
        assert_eq!(ErrorCode::MerchantMismatch.to_string(), "E5013");
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
        let code: ErrorCode = serde_json::from_str("5012").unwrap();
        assert_eq!(code, ErrorCode::SignatureInvalid);
        assert!(serde_json::from_str::<ErrorCode>("77").is_err());
    }
}
