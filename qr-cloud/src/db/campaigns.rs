use shared::models::{
    Campaign, NewCampaign, NewScanToken, PromotionType, ScanOutcome, ScanStatus, ScanToken,
};
use sqlx::PgPool;

use super::{StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: String,
    email: String,
    max_scans: i32,
    remaining_scans: i32,
    promotion_type: String,
    promo_code: Option<String>,
    redirect_url: Option<String>,
    image_url: Option<String>,
    cashier_code: Option<String>,
    title: Option<String>,
    description: Option<String>,
    created_at: i64,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = StoreError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let promotion_type = PromotionType::from_db(&row.promotion_type).ok_or_else(|| {
            StoreError::Corrupt(format!("promotion type {}", row.promotion_type))
        })?;
        Ok(Campaign {
            id: row.id,
            email: row.email,
            max_scans: row.max_scans,
            remaining_scans: row.remaining_scans,
            promotion_type,
            promo_code: row.promo_code,
            redirect_url: row.redirect_url,
            image_url: row.image_url,
            cashier_code: row.cashier_code,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    campaign_id: String,
    token: String,
    is_test: bool,
    created_at: i64,
}

/// Row shape of `consume_campaign_scan`
#[derive(sqlx::FromRow)]
struct ConsumeRow {
    campaign_id: String,
    status: String,
    remaining_scans: i32,
    promotion_type: String,
    promo_code: Option<String>,
    redirect_url: Option<String>,
    image_url: Option<String>,
    cashier_code: Option<String>,
    is_test: bool,
}

impl TryFrom<ConsumeRow> for ScanOutcome {
    type Error = StoreError;

    fn try_from(row: ConsumeRow) -> Result<Self, Self::Error> {
        let status = ScanStatus::from_db(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("scan status {}", row.status)))?;
        let promotion_type = PromotionType::from_db(&row.promotion_type).ok_or_else(|| {
            StoreError::Corrupt(format!("promotion type {}", row.promotion_type))
        })?;
        Ok(ScanOutcome {
            campaign_id: row.campaign_id,
            status,
            remaining_scans: row.remaining_scans,
            promotion_type,
            promo_code: row.promo_code,
            redirect_url: row.redirect_url,
            image_url: row.image_url,
            cashier_code: row.cashier_code,
            is_test: row.is_test,
        })
    }
}

pub async fn create(pool: &PgPool, campaign: &NewCampaign) -> StoreResult<Campaign> {
    let row: CampaignRow = sqlx::query_as(
        "INSERT INTO campaigns (id, email, max_scans, remaining_scans, promotion_type, promo_code,
            redirect_url, image_url, cashier_code, title, description, created_at)
         VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING *",
    )
    .bind(&campaign.id)
    .bind(&campaign.email)
    .bind(campaign.max_scans)
    .bind(campaign.promotion_type.as_db())
    .bind(&campaign.promo_code)
    .bind(&campaign.redirect_url)
    .bind(&campaign.image_url)
    .bind(&campaign.cashier_code)
    .bind(&campaign.title)
    .bind(&campaign.description)
    .bind(campaign.created_at)
    .fetch_one(pool)
    .await?;
    Campaign::try_from(row)
}

pub async fn create_tokens(
    pool: &PgPool,
    campaign_id: &str,
    tokens: &[NewScanToken],
    now: i64,
) -> Result<Vec<ScanToken>, sqlx::Error> {
    let values: Vec<String> = tokens.iter().map(|t| t.token.clone()).collect();
    let flags: Vec<bool> = tokens.iter().map(|t| t.is_test).collect();

    let rows: Vec<TokenRow> = sqlx::query_as(
        "INSERT INTO qr_codes (campaign_id, token, is_test, created_at)
         SELECT $1, t.token, t.is_test, $4
         FROM UNNEST($2::text[], $3::bool[]) AS t(token, is_test)
         RETURNING campaign_id, token, is_test, created_at",
    )
    .bind(campaign_id)
    .bind(&values)
    .bind(&flags)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ScanToken {
            campaign_id: r.campaign_id,
            token: r.token,
            is_test: r.is_test,
            created_at: r.created_at,
        })
        .collect())
}

/// Tokens go with the campaign (`ON DELETE CASCADE`)
pub async fn delete(pool: &PgPool, campaign_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn consume_scan(pool: &PgPool, token: &str) -> StoreResult<Option<ScanOutcome>> {
    let row: Option<ConsumeRow> = sqlx::query_as("SELECT * FROM consume_campaign_scan($1)")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    row.map(ScanOutcome::try_from).transpose()
}
