//! Campaign provisioning
//!
//! Turns a validated campaign specification into a persisted campaign with
//! exactly one public and one test scan token, renders both redemption URLs
//! as QR images and sends the purchaser a summary. A campaign never survives
//! without both tokens: any token failure deletes it again.

mod render;
mod token;

use std::sync::Arc;

use shared::models::{
    CampaignResult, CampaignSpec, NewCampaign, NewScanToken, PromotionType, QrCode,
};

use crate::db::{Store, StoreError};
use crate::email::{CampaignSummary, Notifier};
use crate::error::{ServiceError, ServiceResult};
use crate::util::{now_millis, trim_base};

pub use render::render_data_url;
pub use token::{TOKEN_LENGTH, generate_token};

const CREATE_FAILED: &str = "Failed to create campaign";

/// URLs the provisioner builds from
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Public base of the service; redemption URLs are `{base}/qr/{token}`
    pub public_base_url: String,
    pub asset_base_url: String,
    pub asset_bucket: String,
}

pub struct Provisioner {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    pub fn redemption_url(&self, token: &str) -> String {
        format!("{}/qr/{}", trim_base(&self.settings.public_base_url), token)
    }

    /// Public URL of an image promotion's asset
    pub fn image_url(&self, spec: &CampaignSpec) -> Option<String> {
        if spec.promotion_type != PromotionType::Image {
            return None;
        }
        let path = spec.image_path.as_deref()?.trim_start_matches('/');
        if path.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}/{}",
            trim_base(&self.settings.asset_base_url),
            self.settings.asset_bucket,
            path
        ))
    }

    pub async fn provision(&self, spec: &CampaignSpec) -> ServiceResult<CampaignResult> {
        spec.validate_all().map_err(ServiceError::Validation)?;

        let now = now_millis();
        let campaign = self
            .store
            .insert_campaign(NewCampaign {
                id: uuid::Uuid::new_v4().to_string(),
                email: spec.email.clone(),
                max_scans: spec.max_scans,
                promotion_type: spec.promotion_type,
                promo_code: payload_for(spec, PromotionType::PromoCode, &spec.promo_code),
                redirect_url: payload_for(spec, PromotionType::Redirect, &spec.redirect_url),
                image_url: self.image_url(spec),
                cashier_code: spec.cashier_code.clone(),
                title: spec.title.clone(),
                description: spec.description.clone(),
                created_at: now,
            })
            .await
            .map_err(ServiceError::persistence(CREATE_FAILED))?;

        let batch = [
            NewScanToken {
                token: generate_token(),
                is_test: false,
            },
            NewScanToken {
                token: generate_token(),
                is_test: true,
            },
        ];
        let inserted = match self
            .store
            .insert_scan_tokens(&campaign.id, &batch, now)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(campaign_id = %campaign.id, error = %e, "Failed to insert scan tokens");
                self.discard(&campaign.id).await;
                return Err(ServiceError::persistence(CREATE_FAILED)(e));
            }
        };

        let public = inserted.iter().find(|t| !t.is_test);
        let test = inserted.iter().find(|t| t.is_test);
        let (Some(public), Some(test)) = (public, test) else {
            tracing::error!(
                campaign_id = %campaign.id,
                returned = inserted.len(),
                "Scan token batch incomplete"
            );
            self.discard(&campaign.id).await;
            return Err(ServiceError::persistence(CREATE_FAILED)(
                StoreError::Constraint("scan token batch incomplete".into()),
            ));
        };

        let public_url = self.redemption_url(&public.token);
        let test_url = self.redemption_url(&test.token);
        let (public_data_url, test_data_url) = tokio::try_join!(
            render_blocking(public_url.clone()),
            render_blocking(test_url.clone()),
        )?;

        let summary = CampaignSummary {
            email: spec.email.clone(),
            campaign_id: campaign.id.clone(),
            max_scans: campaign.max_scans,
            promotion_type: campaign.promotion_type,
            public_url: public_url.clone(),
            test_url: test_url.clone(),
            promo_code: campaign.promo_code.clone(),
            redirect_url: campaign.redirect_url.clone(),
            cashier_code: campaign.cashier_code.clone(),
        };
        if let Err(e) = self.notifier.send_campaign_summary(&summary).await {
            tracing::warn!(campaign_id = %campaign.id, error = %e, "Failed to send campaign summary");
        }

        tracing::info!(
            campaign_id = %campaign.id,
            max_scans = campaign.max_scans,
            promotion_type = campaign.promotion_type.as_db(),
            "Campaign provisioned"
        );

        Ok(CampaignResult {
            campaign_id: campaign.id,
            max_scans: campaign.max_scans,
            promotion_type: campaign.promotion_type,
            promo_code: campaign.promo_code,
            redirect_url: campaign.redirect_url,
            image_url: campaign.image_url,
            cashier_code: campaign.cashier_code,
            title: campaign.title,
            description: campaign.description,
            public_qr: QrCode {
                token: public.token.clone(),
                url: public_url,
                data_url: public_data_url,
            },
            test_qr: QrCode {
                token: test.token.clone(),
                url: test_url,
                data_url: test_data_url,
            },
        })
    }

    /// Remove a campaign and its tokens. Failures are logged only.
    pub async fn discard(&self, campaign_id: &str) {
        if let Err(e) = self.store.delete_campaign(campaign_id).await {
            tracing::error!(campaign_id = %campaign_id, error = %e, "Failed to delete campaign");
        }
    }
}

/// A payload field is only kept for the promotion kind that shows it
fn payload_for(
    spec: &CampaignSpec,
    kind: PromotionType,
    value: &Option<String>,
) -> Option<String> {
    if spec.promotion_type == kind {
        value.clone()
    } else {
        None
    }
}

async fn render_blocking(url: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || render_data_url(&url))
        .await
        .map_err(|e| ServiceError::Internal(format!("render task failed: {e}")))?
        .map_err(|e| ServiceError::Render(e.to_string()))
}
