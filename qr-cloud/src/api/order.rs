//! Order creation
//!
//! POST /orders: validate, persist, register with the gateway; immediate-code
//! payments are charged and provisioned before responding

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shared::error::AppError;

use crate::error::ServiceError;
use crate::reconcile::{OrderOutcome, OrderRequest};
use crate::state::AppState;

/// First hop of `X-Forwarded-For`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub fn outcome_response(outcome: OrderOutcome) -> Response {
    match outcome {
        OrderOutcome::Pending {
            order,
            gateway_order_id,
            redirect_url,
        } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending",
                "order": order,
                "payment": {
                    "method": "transfer",
                    "orderId": gateway_order_id,
                    "redirectUrl": redirect_url,
                },
            })),
        )
            .into_response(),
        OrderOutcome::Paid {
            order,
            gateway_order_id,
            campaign,
        } => (
            StatusCode::CREATED,
            Json(json!({
                "status": "success",
                "order": order,
                "payment": { "method": "blik", "orderId": gateway_order_id },
                "campaign": campaign,
            })),
        )
            .into_response(),
        OrderOutcome::Settling {
            order,
            gateway_order_id,
            campaign_id,
        } => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "order": order,
                "payment": { "method": "blik", "orderId": gateway_order_id },
                "campaignId": campaign_id,
            })),
        )
            .into_response(),
    }
}

/// Validation problems are the caller's (400); anything else is reported as
/// an upstream failure (502)
fn failure_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(_) => err.into_response(),
        other => {
            let app: AppError = other.into();
            app.with_status(StatusCode::BAD_GATEWAY).into_response()
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: OrderRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected order payload");
            return AppError::validation("Invalid payload")
                .with_detail("reason", e.to_string())
                .into_response();
        }
    };

    match state
        .reconciler
        .create_order(request, client_ip(&headers))
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => failure_response(e),
    }
}
