//! Unified service-layer error type for qr-cloud
//!
//! `ServiceError` is what every reconciliation step returns. It bridges
//! storage and gateway failures to the API-layer `AppError`, so handlers
//! can use `?` and still send a sanitized message to the client.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::StoreError;
use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Client-fixable input problem; raised before any persistence
    #[error("{0}")]
    Validation(String),
    /// Upstream payment failure (transport, HTTP status, unconfirmed payment)
    #[error("{0}")]
    Gateway(String),
    /// Gateway answered successfully but without a usable payload
    #[error("{0}")]
    GatewayProtocol(String),
    /// Store unavailable or constraint violation
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Invalid signature")]
    SignatureMismatch,
    #[error("Merchant mismatch")]
    MerchantMismatch,
    #[error("Amount mismatch")]
    AmountMismatch,
    #[error("Order not found")]
    OrderNotFound,
    /// Confirmed payment could not be turned into a campaign
    #[error("{0}")]
    Finalize(String),
    #[error("Failed to render QR code: {0}")]
    Render(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn persistence(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| ServiceError::Persistence { context, source }
    }

    /// Reason recorded on a failed order. Kept internal; may carry detail.
    pub fn failure_reason(&self) -> String {
        self.to_string()
    }

    /// Message safe to return to callers
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Persistence { context, .. } => (*context).to_string(),
            ServiceError::Render(_) => ErrorCode::QrRenderFailed.message().to_string(),
            ServiceError::Internal(_) => ErrorCode::InternalError.message().to_string(),
            other => other.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Validation(_) => ErrorCode::ValidationFailed,
            ServiceError::Gateway(_) => ErrorCode::GatewayRequestFailed,
            ServiceError::GatewayProtocol(_) => ErrorCode::GatewayProtocolError,
            ServiceError::Persistence { .. } => ErrorCode::DatabaseError,
            ServiceError::SignatureMismatch => ErrorCode::SignatureInvalid,
            ServiceError::MerchantMismatch => ErrorCode::MerchantMismatch,
            ServiceError::AmountMismatch => ErrorCode::PaymentAmountMismatch,
            ServiceError::OrderNotFound => ErrorCode::OrderNotFound,
            ServiceError::Finalize(_) => ErrorCode::OrderFinalizeFailed,
            ServiceError::Render(_) => ErrorCode::QrRenderFailed,
            ServiceError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::EmptyPayload => ServiceError::GatewayProtocol(e.to_string()),
            other => ServiceError::Gateway(other.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        if matches!(
            e,
            ServiceError::Persistence { .. }
                | ServiceError::Internal(_)
                | ServiceError::Render(_)
                | ServiceError::Finalize(_)
        ) {
            tracing::error!(error = %e, "Service error");
        }
        AppError::with_message(e.code(), e.public_message())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
