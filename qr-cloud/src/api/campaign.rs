//! POST /campaigns: campaign without payment (enabled by ALLOW_DIRECT_CAMPAIGNS)

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::error::AppError;
use shared::models::CampaignSpec;

use crate::state::AppState;

pub async fn create_campaign(State(state): State<AppState>, body: Bytes) -> Response {
    let spec: CampaignSpec = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(e) => {
            return AppError::validation("Invalid payload")
                .with_detail("reason", e.to_string())
                .into_response();
        }
    };

    match state.provisioner.provision(&spec).await {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}
