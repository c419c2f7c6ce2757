//! Gateway notification handler
//!
//! POST /gateway/webhook: signed payment outcome (raw body, parsed here so a
//! malformed notification gets a plain 400)

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use shared::error::AppError;

use crate::reconcile::{PaymentNotification, notification_body};
use crate::state::AppState;

pub async fn handle_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let notification: PaymentNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse gateway notification");
            return AppError::validation("Invalid payload").into_response();
        }
    };

    tracing::info!(
        session_id = %notification.session_id,
        status = %notification.status,
        "Received gateway notification"
    );

    match state.reconciler.handle_notification(notification).await {
        Ok(outcome) => Json(notification_body(&outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
