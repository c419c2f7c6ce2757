//! Data models
//!
//! Shared between the cloud service, its storage backends and tests.
//! All IDs are UUID strings; timestamps are Unix milliseconds.

pub mod campaign;
pub mod order;
pub mod scan;

// Re-exports
pub use campaign::*;
pub use order::*;
pub use scan::*;
