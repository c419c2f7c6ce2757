//! Service configuration

use crate::gateway::{DEFAULT_API_URL, DEFAULT_PAYMENT_URL};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Public base URL of this service (redemption links, webhook route)
    pub public_app_url: String,
    pub public_frontend_url: Option<String>,
    /// `None` allows any origin
    pub cors_allowed_origin: Option<String>,
    pub gateway_merchant_id: i64,
    pub gateway_pos_id: i64,
    pub gateway_api_key: String,
    pub gateway_crc: String,
    pub gateway_api_url: String,
    pub gateway_payment_url: String,
    pub gateway_return_url: Option<String>,
    pub gateway_status_url: Option<String>,
    pub order_currency: String,
    pub order_country: String,
    pub order_language: String,
    /// Sender address; email is disabled when unset
    pub email_from: Option<String>,
    pub ses_region: Option<String>,
    pub asset_base_url: String,
    pub promo_asset_bucket: String,
    /// Mount `POST /campaigns` (campaigns without payment)
    pub allow_direct_campaigns: bool,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn or_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Positive integer id; a development placeholder of `1` when unset in development
    fn require_positive_id(name: &str, environment: &str) -> Result<i64, BoxError> {
        match optional(name) {
            Some(raw) => parse_positive(name, &raw),
            None if environment == "development" => Ok(1),
            None => Err(format!("{name} must be set in {environment} environment").into()),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = or_default("ENVIRONMENT", "development");
        let public_app_url = or_default("PUBLIC_APP_URL", "http://localhost:8080");
        let asset_base_url = optional("ASSET_BASE_URL")
            .unwrap_or_else(|| format!("{}/assets", public_app_url.trim_end_matches('/')));

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            public_frontend_url: optional("PUBLIC_FRONTEND_URL"),
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            gateway_merchant_id: Self::require_positive_id("GATEWAY_MERCHANT_ID", &environment)?,
            gateway_pos_id: Self::require_positive_id("GATEWAY_POS_ID", &environment)?,
            gateway_api_key: Self::require_secret("GATEWAY_API_KEY", &environment)?,
            gateway_crc: Self::require_secret("GATEWAY_CRC", &environment)?,
            gateway_api_url: or_default("GATEWAY_API_URL", DEFAULT_API_URL),
            gateway_payment_url: or_default("GATEWAY_PAYMENT_URL", DEFAULT_PAYMENT_URL),
            gateway_return_url: optional("GATEWAY_RETURN_URL"),
            gateway_status_url: optional("GATEWAY_STATUS_URL"),
            order_currency: or_default("ORDER_CURRENCY", "PLN"),
            order_country: or_default("ORDER_COUNTRY", "PL"),
            order_language: or_default("ORDER_LANGUAGE", "pl"),
            email_from: optional("EMAIL_FROM"),
            ses_region: optional("SES_REGION"),
            asset_base_url,
            promo_asset_bucket: or_default("PROMO_ASSET_BUCKET", "promo-assets"),
            allow_direct_campaigns: optional("ALLOW_DIRECT_CAMPAIGNS")
                .is_some_and(|v| parse_flag(&v)),
            environment,
            public_app_url,
        })
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<i64, BoxError> {
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(format!("Environment variable {name} must be a positive integer").into()),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
