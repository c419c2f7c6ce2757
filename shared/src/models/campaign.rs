//! Campaign Model

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// What a scan of the public code reveals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    Redirect,
    PromoCode,
    Image,
}

impl PromotionType {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "redirect" => Some(Self::Redirect),
            "promo_code" => Some(Self::PromoCode),
            "image" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::PromoCode => "promo_code",
            Self::Image => "image",
        }
    }
}

/// Campaign specification as submitted by the purchaser
///
/// Stored verbatim on the order and re-validated before provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSpec {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(range(min = 1, max = 100_000))]
    pub max_scans: i32,
    pub promotion_type: PromotionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url, length(max = 2048))]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub promo_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub cashier_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub image_path: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl CampaignSpec {
    /// Promotion kind and its required field must agree
    pub fn check_promotion_consistency(&self) -> Result<(), &'static str> {
        match self.promotion_type {
            PromotionType::Redirect if !present(&self.redirect_url) => {
                Err("redirectUrl is required for redirect promotions")
            }
            PromotionType::PromoCode if !present(&self.promo_code) => {
                Err("promoCode is required for promo_code promotions")
            }
            PromotionType::Image if !present(&self.image_path) => {
                Err("imagePath is required for image promotions")
            }
            _ => Ok(()),
        }
    }

    /// Field constraints followed by the cross-field check
    pub fn validate_all(&self) -> Result<(), String> {
        self.validate()
            .map_err(|e| describe_validation_errors(&e, &[]))?;
        self.check_promotion_consistency()
            .map_err(|msg| msg.to_string())
    }
}

/// Flatten validator output into a single client-facing message
///
/// Field names are reported as they appear on the wire (camelCase). Nested
/// structs are descended into with a `parent.` prefix, except those listed in
/// `flattened`, whose fields sit at the parent's level in the JSON.
pub fn describe_validation_errors(errors: &ValidationErrors, flattened: &[&str]) -> String {
    let mut fields = Vec::new();
    collect_fields(errors, "", flattened, &mut fields);
    fields.sort();
    fields.dedup();
    format!("Invalid payload: {}", fields.join(", "))
}

fn collect_fields(
    errors: &ValidationErrors,
    prefix: &str,
    flattened: &[&str],
    out: &mut Vec<String>,
) {
    for (name, kind) in errors.errors() {
        let path = if flattened.contains(&name.as_ref()) {
            prefix.to_string()
        } else {
            format!("{prefix}{}", camel_case(name))
        };
        match kind {
            ValidationErrorsKind::Field(_) => out.push(path),
            ValidationErrorsKind::Struct(inner) => {
                let nested = if path.is_empty() { path } else { format!("{path}.") };
                collect_fields(inner, &nested, flattened, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_fields(inner, &format!("{path}[{index}]."), flattened, out);
                }
            }
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Campaign row to insert (already sanitized, image path resolved)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCampaign {
    pub id: String,
    pub email: String,
    pub max_scans: i32,
    pub promotion_type: PromotionType,
    pub promo_code: Option<String>,
    pub redirect_url: Option<String>,
    pub image_url: Option<String>,
    pub cashier_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

/// Campaign entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub email: String,
    pub max_scans: i32,
    pub remaining_scans: i32,
    pub promotion_type: PromotionType,
    pub promo_code: Option<String>,
    pub redirect_url: Option<String>,
    pub image_url: Option<String>,
    pub cashier_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

impl NewCampaign {
    /// The row as it exists right after insertion (full scan budget)
    pub fn into_campaign(self) -> Campaign {
        Campaign {
            id: self.id,
            email: self.email,
            max_scans: self.max_scans,
            remaining_scans: self.max_scans,
            promotion_type: self.promotion_type,
            promo_code: self.promo_code,
            redirect_url: self.redirect_url,
            image_url: self.image_url,
            cashier_code: self.cashier_code,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// Scan token to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScanToken {
    pub token: String,
    pub is_test: bool,
}

/// Scan token entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanToken {
    pub campaign_id: String,
    pub token: String,
    pub is_test: bool,
    pub created_at: i64,
}

/// Redemption handle as returned to the purchaser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub token: String,
    pub url: String,
    /// `data:image/png;base64,...`
    pub data_url: String,
}

/// Outcome of provisioning a campaign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResult {
    pub campaign_id: String,
    pub max_scans: i32,
    pub promotion_type: PromotionType,
    pub promo_code: Option<String>,
    pub redirect_url: Option<String>,
    pub image_url: Option<String>,
    pub cashier_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub public_qr: QrCode,
    pub test_qr: QrCode,
}
