//! GET /qr/{token}: scan redemption

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::redemption::Redemption;
use crate::state::AppState;

const NO_STORE: &str = "no-store";

pub async fn redeem(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.redemption.redeem(&token).await {
        Ok(Some(Redemption::Redirect { location })) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, location),
                (header::CACHE_CONTROL, NO_STORE.to_string()),
            ],
        )
            .into_response(),
        Ok(Some(Redemption::Page { status, html })) => (
            status,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, NO_STORE),
            ],
            html,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Code not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to consume scan");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}
