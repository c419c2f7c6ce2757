use serde_json::Value;
use shared::models::{NewOrder, Order, OrderStatus, PaymentMethod};
use sqlx::PgPool;

use super::{StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    session_id: String,
    email: String,
    amount: i64,
    currency: String,
    payment_method: String,
    status: String,
    gateway_token: Option<String>,
    gateway_order_id: Option<i64>,
    campaign_spec: Value,
    payload: Value,
    extension: Value,
    invoice_requested: bool,
    invoice_details: Option<String>,
    notes: Option<String>,
    campaign_id: Option<String>,
    failure_reason: Option<String>,
    provisioning_started_at: Option<i64>,
    paid_at: Option<i64>,
    created_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_db(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("order status {}", row.status)))?;
        let payment_method = PaymentMethod::from_db(&row.payment_method).ok_or_else(|| {
            StoreError::Corrupt(format!("payment method {}", row.payment_method))
        })?;
        Ok(Order {
            id: row.id,
            session_id: row.session_id,
            email: row.email,
            amount: row.amount,
            currency: row.currency,
            payment_method,
            status,
            gateway_token: row.gateway_token,
            gateway_order_id: row.gateway_order_id,
            campaign_spec: row.campaign_spec,
            payload: row.payload,
            extension: row.extension,
            invoice_requested: row.invoice_requested,
            invoice_details: row.invoice_details,
            notes: row.notes,
            campaign_id: row.campaign_id,
            failure_reason: row.failure_reason,
            provisioning_started_at: row.provisioning_started_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

pub async fn create(pool: &PgPool, order: &NewOrder) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, session_id, email, amount, currency, payment_method, status,
            campaign_spec, payload, extension, invoice_requested, invoice_details, notes, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(&order.id)
    .bind(&order.session_id)
    .bind(&order.email)
    .bind(order.amount)
    .bind(&order.currency)
    .bind(order.payment_method.as_db())
    .bind(&order.campaign_spec)
    .bind(&order.payload)
    .bind(&order.extension)
    .bind(order.invoice_requested)
    .bind(&order.invoice_details)
    .bind(&order.notes)
    .bind(order.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_session(pool: &PgPool, session_id: &str) -> StoreResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE session_id = $1")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    row.map(Order::try_from).transpose()
}

pub async fn attach_gateway_transaction(
    pool: &PgPool,
    order_id: &str,
    token: &str,
    gateway_order_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET gateway_token = $1, gateway_order_id = $2 WHERE id = $3")
        .bind(token)
        .bind(gateway_order_id)
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn claim_provisioning(
    pool: &PgPool,
    order_id: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET provisioning_started_at = $1
         WHERE id = $2 AND status = 'pending' AND provisioning_started_at IS NULL",
    )
    .bind(now)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_paid(
    pool: &PgPool,
    order_id: &str,
    campaign_id: &str,
    gateway_order_id: Option<i64>,
    paid_at: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', campaign_id = $1, paid_at = $2, failure_reason = NULL,
            gateway_order_id = COALESCE($3, gateway_order_id)
         WHERE id = $4 AND status = 'pending'",
    )
    .bind(campaign_id)
    .bind(paid_at)
    .bind(gateway_order_id)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_failed(pool: &PgPool, order_id: &str, reason: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'failed', failure_reason = $1
         WHERE id = $2 AND status = 'pending'",
    )
    .bind(reason)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
