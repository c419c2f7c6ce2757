//! Scan redemption result

use serde::{Deserialize, Serialize};

use super::campaign::PromotionType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Active,
    Expired,
}

impl ScanStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

/// Result of one atomic scan consumption
///
/// Public tokens decrement the campaign budget exactly once per call; test
/// tokens never touch it. An exhausted budget reports `Expired` rather than
/// failing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanOutcome {
    pub campaign_id: String,
    pub status: ScanStatus,
    pub remaining_scans: i32,
    pub promotion_type: PromotionType,
    pub promo_code: Option<String>,
    pub redirect_url: Option<String>,
    pub image_url: Option<String>,
    pub cashier_code: Option<String>,
    pub is_test: bool,
}

impl ScanOutcome {
    pub fn is_expired(&self) -> bool {
        self.status == ScanStatus::Expired
    }
}
