//! Shared types for the QR promo platform
//!
//! Domain models (orders, campaigns, scan tokens) and the unified error
//! system used by the cloud service and its tests.

pub mod error;
pub mod models;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
