//! Scan redemption
//!
//! Each scan consumes one unit of the campaign budget through the store's
//! atomic `consume_scan`. Active redirect campaigns answer with a redirect;
//! everything else gets a small HTML page.

use std::sync::Arc;

use http::StatusCode;
use shared::models::{PromotionType, ScanOutcome};

use crate::db::Store;
use crate::error::{ServiceError, ServiceResult};

/// What to send back for one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    Redirect { location: String },
    Page { status: StatusCode, html: String },
}

pub struct RedemptionGate {
    store: Arc<dyn Store>,
}

impl RedemptionGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `Ok(None)` for tokens that do not exist
    pub async fn redeem(&self, token: &str) -> ServiceResult<Option<Redemption>> {
        let outcome = self
            .store
            .consume_scan(token)
            .await
            .map_err(ServiceError::persistence("Failed to consume scan"))?;

        Ok(outcome.map(|scan| {
            tracing::debug!(
                campaign_id = %scan.campaign_id,
                remaining = scan.remaining_scans,
                is_test = scan.is_test,
                "Scan consumed"
            );
            respond(&scan)
        }))
    }
}

pub fn respond(scan: &ScanOutcome) -> Redemption {
    if !scan.is_expired() && scan.promotion_type == PromotionType::Redirect {
        if let Some(location) = scan.redirect_url.as_deref().filter(|u| !u.is_empty()) {
            return Redemption::Redirect {
                location: location.to_string(),
            };
        }
    }

    let status = if scan.is_expired() {
        StatusCode::GONE
    } else {
        StatusCode::OK
    };
    Redemption::Page {
        status,
        html: render_page(scan),
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn render_content(scan: &ScanOutcome) -> String {
    match scan.promotion_type {
        PromotionType::PromoCode => non_empty(&scan.promo_code).map(|code| {
            format!(
                r#"<p class="value">Promo code:</p><p class="badge">{}</p>"#,
                escape_html(code)
            )
        }),
        PromotionType::Image => non_empty(&scan.image_url).map(|url| {
            format!(
                r#"<img src="{}" alt="Promotion" class="promo-image" />"#,
                escape_html(url)
            )
        }),
        PromotionType::Redirect => non_empty(&scan.redirect_url).map(|url| {
            format!(
                r#"<p class="value">This promotion leads to:</p><p class="badge">{}</p>"#,
                escape_html(url)
            )
        }),
    }
    .unwrap_or_else(|| {
        r#"<p class="value">This promotion is temporarily unavailable.</p>"#.to_string()
    })
}

pub fn render_page(scan: &ScanOutcome) -> String {
    let expired = scan.is_expired();
    let heading = if expired {
        "Promotion ended"
    } else {
        "QR Promotion"
    };
    let remaining = if expired {
        "This promotion has ended.".to_string()
    } else {
        format!("<strong>{}</strong> uses left.", scan.remaining_scans)
    };
    let cashier = non_empty(&scan.cashier_code)
        .map(|code| {
            format!(
                r#"<p class="cashier">Cashier code: <strong>{}</strong></p>"#,
                escape_html(code)
            )
        })
        .unwrap_or_default();
    let banner = if scan.is_test {
        r#"<p class="test-badge">Test mode: the counter does not change</p>"#
    } else {
        ""
    };
    let content = render_content(scan);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>QR Promo</title>
    <style>
      body {{ margin: 0; font-family: system-ui, sans-serif; background: #0f172a; color: #f8fafc;
             display: flex; justify-content: center; align-items: center; min-height: 100vh; }}
      main {{ background: rgba(15, 23, 42, 0.85); border-radius: 16px; padding: 32px;
             max-width: 480px; width: calc(100% - 32px); }}
      .value {{ margin-top: 24px; font-weight: 600; }}
      .badge {{ display: inline-block; padding: 12px 18px; border-radius: 12px;
               background: linear-gradient(135deg, #38bdf8, #6366f1); color: #0f172a;
               font-size: 1.5rem; font-weight: 700; }}
      .promo-image {{ width: 100%; border-radius: 12px; margin: 16px 0 24px; }}
      .cashier {{ margin-top: 16px; font-size: 0.95rem; opacity: 0.8; }}
      .test-badge {{ padding: 8px 12px; border-radius: 9999px; color: #bef264;
                    background: rgba(190, 242, 100, 0.15); text-transform: uppercase; font-size: 0.75rem; }}
    </style>
  </head>
  <body>
    <main>
      {banner}
      <h1>{heading}</h1>
      <p>{remaining}</p>
      {content}
      {cashier}
    </main>
  </body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::ScanStatus;

    fn scan(kind: PromotionType, status: ScanStatus) -> ScanOutcome {
        ScanOutcome {
            campaign_id: "c1".into(),
            status,
            remaining_scans: 3,
            promotion_type: kind,
            promo_code: None,
            redirect_url: None,
            image_url: None,
            cashier_code: None,
            is_test: false,
        }
    }

    #[test]
    fn test_active_redirect() {
        let mut s = scan(PromotionType::Redirect, ScanStatus::Active);
        s.redirect_url = Some("https://shop.example/deal".into());
        assert_eq!(
            respond(&s),
            Redemption::Redirect {
                location: "https://shop.example/deal".into()
            }
        );
    }

    #[test]
    fn test_expired_redirect_shows_page() {
        let mut s = scan(PromotionType::Redirect, ScanStatus::Expired);
        s.redirect_url = Some("https://shop.example/deal".into());
        match respond(&s) {
            Redemption::Page { status, html } => {
                assert_eq!(status, StatusCode::GONE);
                assert!(html.contains("Promotion ended"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_promo_code_page_is_escaped() {
        let mut s = scan(PromotionType::PromoCode, ScanStatus::Active);
        s.promo_code = Some("<script>alert('x')</script>".into());
        s.cashier_code = Some("A&B".into());
        let Redemption::Page { status, html } = respond(&s) else {
            panic!("expected page");
        };
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("A&amp;B"));
        assert!(html.contains("<strong>3</strong> uses left."));
    }

    #[test]
    fn test_missing_payload_and_test_banner() {
        let mut s = scan(PromotionType::Image, ScanStatus::Active);
        s.is_test = true;
        let html = render_page(&s);
        assert!(html.contains("temporarily unavailable"));
        assert!(html.contains("Test mode"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
