//! In-process store
//!
//! Same conditional semantics as the PostgreSQL store, guarded by a single
//! mutex. Fault switches let tests exercise compensation paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    Campaign, NewCampaign, NewOrder, NewScanToken, Order, OrderStatus, ScanOutcome, ScanStatus,
    ScanToken,
};

use super::{Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    sessions: HashMap<String, String>,
    campaigns: HashMap<String, Campaign>,
    tokens: HashMap<String, ScanToken>,
    faults: Faults,
}

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    fail_order_insert: bool,
    fail_token_insert: bool,
    truncate_token_batch: bool,
    fail_mark_paid: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_order` fail with `Unavailable`
    pub fn fail_order_inserts(&self, on: bool) {
        self.inner.lock().faults.fail_order_insert = on;
    }

    /// Make `insert_scan_tokens` fail with `Unavailable`
    pub fn fail_token_inserts(&self, on: bool) {
        self.inner.lock().faults.fail_token_insert = on;
    }

    /// Make `insert_scan_tokens` persist only the first token of a batch
    pub fn truncate_token_batches(&self, on: bool) {
        self.inner.lock().faults.truncate_token_batch = on;
    }

    /// Make `mark_paid` fail with `Unavailable`
    pub fn fail_mark_paid(&self, on: bool) {
        self.inner.lock().faults.fail_mark_paid = on;
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.inner.lock().orders.get(order_id).cloned()
    }

    pub fn order_by_session(&self, session_id: &str) -> Option<Order> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(session_id)
            .and_then(|id| inner.orders.get(id))
            .cloned()
    }

    pub fn campaign(&self, campaign_id: &str) -> Option<Campaign> {
        self.inner.lock().campaigns.get(campaign_id).cloned()
    }

    pub fn campaign_count(&self) -> usize {
        self.inner.lock().campaigns.len()
    }

    pub fn token_count(&self) -> usize {
        self.inner.lock().tokens.len()
    }

    /// Tokens of one campaign, public first
    pub fn tokens_for(&self, campaign_id: &str) -> Vec<ScanToken> {
        let mut tokens: Vec<ScanToken> = self
            .inner
            .lock()
            .tokens
            .values()
            .filter(|t| t.campaign_id == campaign_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.is_test);
        tokens
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} rejected by fault injection"))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let mut inner = self.inner.lock();
        if inner.faults.fail_order_insert {
            return Err(unavailable("order insert"));
        }
        if inner.orders.contains_key(&order.id) || inner.sessions.contains_key(&order.session_id)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate order {}",
                order.session_id
            )));
        }
        let order = order.into_order();
        inner
            .sessions
            .insert(order.session_id.clone(), order.id.clone());
        inner.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn find_order_by_session(&self, session_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.order_by_session(session_id))
    }

    async fn attach_gateway_transaction(
        &self,
        order_id: &str,
        token: &str,
        gateway_order_id: i64,
    ) -> StoreResult<()> {
        if let Some(order) = self.inner.lock().orders.get_mut(order_id) {
            order.gateway_token = Some(token.to_string());
            order.gateway_order_id = Some(gateway_order_id);
        }
        Ok(())
    }

    async fn claim_provisioning(&self, order_id: &str, now: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        match inner.orders.get_mut(order_id) {
            Some(order)
                if !order.status.is_terminal()
                    && order.provisioning_started_at.is_none() =>
            {
                order.provisioning_started_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_paid(
        &self,
        order_id: &str,
        campaign_id: &str,
        gateway_order_id: Option<i64>,
        paid_at: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        if inner.faults.fail_mark_paid {
            return Err(unavailable("mark paid"));
        }
        match inner.orders.get_mut(order_id) {
            Some(order) if !order.status.is_terminal() => {
                order.status = OrderStatus::Paid;
                order.campaign_id = Some(campaign_id.to_string());
                order.paid_at = Some(paid_at);
                order.failure_reason = None;
                if gateway_order_id.is_some() {
                    order.gateway_order_id = gateway_order_id;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, order_id: &str, reason: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        match inner.orders.get_mut(order_id) {
            Some(order) if !order.status.is_terminal() => {
                order.status = OrderStatus::Failed;
                order.failure_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_campaign(&self, campaign: NewCampaign) -> StoreResult<Campaign> {
        let mut inner = self.inner.lock();
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::Constraint(format!(
                "duplicate campaign {}",
                campaign.id
            )));
        }
        let campaign = campaign.into_campaign();
        inner
            .campaigns
            .insert(campaign.id.clone(), campaign.clone());
        Ok(campaign)
    }

    async fn insert_scan_tokens(
        &self,
        campaign_id: &str,
        tokens: &[NewScanToken],
        now: i64,
    ) -> StoreResult<Vec<ScanToken>> {
        let mut inner = self.inner.lock();
        if inner.faults.fail_token_insert {
            return Err(unavailable("token insert"));
        }
        if !inner.campaigns.contains_key(campaign_id) {
            return Err(StoreError::Constraint(format!(
                "unknown campaign {campaign_id}"
            )));
        }
        for (i, t) in tokens.iter().enumerate() {
            if inner.tokens.contains_key(&t.token) || tokens[..i].iter().any(|o| o.token == t.token)
            {
                return Err(StoreError::Constraint(format!("duplicate token {}", t.token)));
            }
        }
        let take = if inner.faults.truncate_token_batch {
            tokens.len().min(1)
        } else {
            tokens.len()
        };
        let inserted: Vec<ScanToken> = tokens[..take]
            .iter()
            .map(|t| ScanToken {
                campaign_id: campaign_id.to_string(),
                token: t.token.clone(),
                is_test: t.is_test,
                created_at: now,
            })
            .collect();
        for t in &inserted {
            inner.tokens.insert(t.token.clone(), t.clone());
        }
        Ok(inserted)
    }

    async fn delete_campaign(&self, campaign_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.campaigns.remove(campaign_id);
        inner.tokens.retain(|_, t| t.campaign_id != campaign_id);
        Ok(())
    }

    async fn consume_scan(&self, token: &str) -> StoreResult<Option<ScanOutcome>> {
        let mut inner = self.inner.lock();
        let Some(scan) = inner.tokens.get(token).cloned() else {
            return Ok(None);
        };
        let Some(campaign) = inner.campaigns.get_mut(&scan.campaign_id) else {
            return Err(StoreError::Corrupt(format!(
                "token {token} references missing campaign"
            )));
        };

        let status = if scan.is_test {
            if campaign.remaining_scans > 0 {
                ScanStatus::Active
            } else {
                ScanStatus::Expired
            }
        } else if campaign.remaining_scans > 0 {
            campaign.remaining_scans -= 1;
            ScanStatus::Active
        } else {
            ScanStatus::Expired
        };

        Ok(Some(ScanOutcome {
            campaign_id: campaign.id.clone(),
            status,
            remaining_scans: campaign.remaining_scans,
            promotion_type: campaign.promotion_type,
            promo_code: campaign.promo_code.clone(),
            redirect_url: campaign.redirect_url.clone(),
            image_url: campaign.image_url.clone(),
            cashier_code: campaign.cashier_code.clone(),
            is_test: scan.is_test,
        }))
    }
}
