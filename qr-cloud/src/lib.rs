//! qr-cloud: paid QR promotion campaigns
//!
//! - Takes orders and drives them through the payment gateway
//! - Reconciles gateway notifications into paid or failed orders
//! - Provisions campaigns with a public and a test scan token
//! - Redeems scans against each campaign's budget

pub mod api;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod gateway;
pub mod provisioner;
pub mod reconcile;
pub mod redemption;
pub mod signing;
pub mod state;
pub mod util;
