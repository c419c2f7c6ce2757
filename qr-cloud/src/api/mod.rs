//! API routes for qr-cloud

pub mod campaign;
pub mod health;
pub mod order;
pub mod qr;
pub mod webhook;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let origin = match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            tracing::warn!("CORS_ALLOWED_ORIGIN is not a valid header value, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86_400))
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/orders", post(order::create_order))
        .route("/gateway/webhook", post(webhook::handle_webhook))
        .route("/qr/{token}", get(qr::redeem));

    if state.settings.allow_direct_campaigns {
        router = router.route("/campaigns", post(campaign::create_campaign));
    }

    router
        .layer(cors_layer(state.settings.cors_allowed_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
