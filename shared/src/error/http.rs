//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::OrderNotFound => StatusCode::NOT_FOUND,

            // 502 Bad Gateway (upstream payment failure)
            Self::GatewayRequestFailed | Self::GatewayProtocolError => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::OrderFinalizeFailed
            | Self::QrRenderFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request
            Self::ValidationFailed
            | Self::SignatureInvalid
            | Self::MerchantMismatch
            | Self::PaymentAmountMismatch => StatusCode::BAD_REQUEST,
        }
    }
}
