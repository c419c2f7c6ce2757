use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use shared::models::PromotionType;

pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the purchaser needs to run a freshly provisioned campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSummary {
    pub email: String,
    pub campaign_id: String,
    pub max_scans: i32,
    pub promotion_type: PromotionType,
    pub public_url: String,
    pub test_url: String,
    pub promo_code: Option<String>,
    pub redirect_url: Option<String>,
    pub cashier_code: Option<String>,
}

impl CampaignSummary {
    pub fn subject(&self) -> String {
        format!(
            "Twoja kampania QR ({0}) / Your QR campaign ({0})",
            self.promotion_type.as_db()
        )
    }

    pub fn text(&self) -> String {
        let mut lines = vec![
            format!("Maksymalna liczba skanów / Maximum scans: {}", self.max_scans),
            format!("Link publiczny / Public link: {}", self.public_url),
            format!("Link testowy / Test link: {}", self.test_url),
        ];
        if let Some(code) = self.promo_code.as_deref().filter(|c| !c.is_empty()) {
            lines.push(format!("Kod promocyjny / Promo code: {code}"));
        }
        if let Some(url) = self.redirect_url.as_deref().filter(|u| !u.is_empty()) {
            lines.push(format!("Adres docelowy / Destination: {url}"));
        }
        if let Some(code) = self.cashier_code.as_deref().filter(|c| !c.is_empty()) {
            lines.push(format!("Kod kasowy / Cashier code: {code}"));
        }
        lines.join("\n")
    }
}

/// Delivery channel for campaign summaries. Callers treat failures as
/// non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_campaign_summary(&self, summary: &CampaignSummary) -> Result<(), NotifyError>;
}

/// Amazon SES delivery
pub struct SesNotifier {
    ses: SesClient,
    from: String,
}

impl SesNotifier {
    pub fn new(ses: SesClient, from: impl Into<String>) -> Self {
        Self {
            ses,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send_campaign_summary(&self, summary: &CampaignSummary) -> Result<(), NotifyError> {
        let subject = Content::builder().data(summary.subject()).build()?;
        let body = Body::builder()
            .text(Content::builder().data(summary.text()).build()?)
            .build();
        let message = Message::builder().subject(subject).body(body).build();

        self.ses
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&summary.email).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        tracing::info!(
            to = %summary.email,
            campaign_id = %summary.campaign_id,
            "Campaign summary sent"
        );
        Ok(())
    }
}

/// Used when no sender address is configured
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_campaign_summary(&self, summary: &CampaignSummary) -> Result<(), NotifyError> {
        tracing::debug!(
            campaign_id = %summary.campaign_id,
            "Email disabled, skipping campaign summary"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> CampaignSummary {
        CampaignSummary {
            email: "shop@example.com".into(),
            campaign_id: "c-1".into(),
            max_scans: 50,
            promotion_type: PromotionType::PromoCode,
            public_url: "https://app/qr/PUB".into(),
            test_url: "https://app/qr/TST".into(),
            promo_code: Some("SAVE10".into()),
            redirect_url: None,
            cashier_code: Some("".into()),
        }
    }

    #[test]
    fn test_summary_lists_links_and_present_codes() {
        let text = summary().text();
        assert!(text.contains("50"));
        assert!(text.contains("https://app/qr/PUB"));
        assert!(text.contains("https://app/qr/TST"));
        assert!(text.contains("SAVE10"));
        assert!(!text.contains("Cashier code"));
        assert!(!text.contains("Destination"));
    }

    #[test]
    fn test_subject_names_promotion() {
        assert!(summary().subject().contains("promo_code"));
    }

    #[tokio::test]
    async fn test_disabled_notifier_succeeds() {
        assert!(DisabledNotifier.send_campaign_summary(&summary()).await.is_ok());
    }
}
