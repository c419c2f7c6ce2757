//! Storage access layer
//!
//! The reconciliation core, the provisioner and the redemption gate depend
//! only on [`Store`]. `PgStore` backs it with PostgreSQL; `MemoryStore`
//! gives the same conditional semantics in process for tests and local runs.

pub mod campaigns;
pub mod memory;
pub mod orders;

use async_trait::async_trait;
use shared::models::{
    Campaign, NewCampaign, NewOrder, NewScanToken, Order, ScanOutcome, ScanToken,
};
use sqlx::PgPool;
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the service needs from persistent storage
///
/// Every state-changing order operation is conditional and reports whether
/// it took effect, so concurrent paths learn from the store (not from a
/// value read earlier) who won.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order>;

    async fn find_order_by_session(&self, session_id: &str) -> StoreResult<Option<Order>>;

    async fn attach_gateway_transaction(
        &self,
        order_id: &str,
        token: &str,
        gateway_order_id: i64,
    ) -> StoreResult<()>;

    /// Take the exclusive right to provision a pending order.
    /// Returns `false` when the order is no longer pending or another path
    /// already holds the claim.
    async fn claim_provisioning(&self, order_id: &str, now: i64) -> StoreResult<bool>;

    /// `pending -> paid`. Returns `false` if the order was not pending.
    async fn mark_paid(
        &self,
        order_id: &str,
        campaign_id: &str,
        gateway_order_id: Option<i64>,
        paid_at: i64,
    ) -> StoreResult<bool>;

    /// `pending -> failed`. Returns `false` if the order was not pending.
    async fn mark_failed(&self, order_id: &str, reason: &str) -> StoreResult<bool>;

    async fn insert_campaign(&self, campaign: NewCampaign) -> StoreResult<Campaign>;

    /// Insert all tokens of one campaign in a single batch
    async fn insert_scan_tokens(
        &self,
        campaign_id: &str,
        tokens: &[NewScanToken],
        now: i64,
    ) -> StoreResult<Vec<ScanToken>>;

    /// Remove a campaign together with any tokens that reference it
    async fn delete_campaign(&self, campaign_id: &str) -> StoreResult<()>;

    /// Atomic decrement-if-positive for public tokens; `None` for unknown tokens
    async fn consume_scan(&self, token: &str) -> StoreResult<Option<ScanOutcome>>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        orders::create(&self.pool, &order).await?;
        Ok(order.into_order())
    }

    async fn find_order_by_session(&self, session_id: &str) -> StoreResult<Option<Order>> {
        orders::find_by_session(&self.pool, session_id).await
    }

    async fn attach_gateway_transaction(
        &self,
        order_id: &str,
        token: &str,
        gateway_order_id: i64,
    ) -> StoreResult<()> {
        orders::attach_gateway_transaction(&self.pool, order_id, token, gateway_order_id).await?;
        Ok(())
    }

    async fn claim_provisioning(&self, order_id: &str, now: i64) -> StoreResult<bool> {
        Ok(orders::claim_provisioning(&self.pool, order_id, now).await?)
    }

    async fn mark_paid(
        &self,
        order_id: &str,
        campaign_id: &str,
        gateway_order_id: Option<i64>,
        paid_at: i64,
    ) -> StoreResult<bool> {
        Ok(orders::mark_paid(&self.pool, order_id, campaign_id, gateway_order_id, paid_at).await?)
    }

    async fn mark_failed(&self, order_id: &str, reason: &str) -> StoreResult<bool> {
        Ok(orders::mark_failed(&self.pool, order_id, reason).await?)
    }

    async fn insert_campaign(&self, campaign: NewCampaign) -> StoreResult<Campaign> {
        campaigns::create(&self.pool, &campaign).await
    }

    async fn insert_scan_tokens(
        &self,
        campaign_id: &str,
        tokens: &[NewScanToken],
        now: i64,
    ) -> StoreResult<Vec<ScanToken>> {
        Ok(campaigns::create_tokens(&self.pool, campaign_id, tokens, now).await?)
    }

    async fn delete_campaign(&self, campaign_id: &str) -> StoreResult<()> {
        campaigns::delete(&self.pool, campaign_id).await?;
        Ok(())
    }

    async fn consume_scan(&self, token: &str) -> StoreResult<Option<ScanOutcome>> {
        campaigns::consume_scan(&self.pool, token).await
    }
}
