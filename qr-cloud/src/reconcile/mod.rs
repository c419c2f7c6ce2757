//! Order reconciliation
//!
//! The only component that moves an order between states:
//!
//! ```text
//! pending ──► paid     (campaign provisioned)
//!    │
//!    └──────► failed   (reason recorded)
//! ```
//!
//! Both terminal states are absorbing. Two paths can finish an order: the
//! synchronous immediate-code charge inside `create_order`, and the gateway
//! notification in `handle_notification`. Whichever wins
//! `Store::claim_provisioning` provisions; the other one short-circuits.
//! Status writes are conditional on `pending`, so a campaign provisioned by a
//! path that then loses the `paid` write is deleted again.

mod notification;
mod request;

use std::sync::Arc;

use serde_json::json;
use shared::models::{
    CampaignResult, CampaignSpec, NewOrder, Order, OrderStatus, OrderSummary, PaymentMethod,
};

use crate::db::Store;
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{PaymentGateway, RegisterRequest, STATUS_SUCCESS};
use crate::provisioner::Provisioner;
use crate::signing;
use crate::util::{now_millis, trim_base, truncate_with_ellipsis};

pub use notification::PaymentNotification;
pub use request::{Extension, OrderRequest, PaymentChoice, amount_from_price};

const DESCRIPTION_MAX: usize = 255;
const STORED_PAYLOAD_INVALID: &str = "Stored payload invalid";
const FINALIZE_FAILED: &str = "Failed to finalize order";

/// Per-deployment order parameters
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub currency: String,
    pub country: String,
    pub language: String,
    pub return_url: String,
    pub status_url: String,
}

impl OrderSettings {
    /// Return URL: explicit gateway setting, then the frontend, then the
    /// service itself. Status URL: explicit setting or the webhook route.
    pub fn resolve(
        public_app_url: &str,
        frontend_url: Option<&str>,
        gateway_return_url: Option<&str>,
        gateway_status_url: Option<&str>,
    ) -> (String, String) {
        let return_url = gateway_return_url
            .or(frontend_url)
            .unwrap_or(public_app_url)
            .to_string();
        let status_url = gateway_status_url
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/gateway/webhook", trim_base(public_app_url)));
        (return_url, status_url)
    }
}

/// Result of a successful `create_order`
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// Transfer registered; the purchaser continues on the gateway's page
    Pending {
        order: OrderSummary,
        gateway_order_id: i64,
        redirect_url: String,
    },
    /// Immediate-code payment confirmed and campaign provisioned here
    Paid {
        order: OrderSummary,
        gateway_order_id: i64,
        campaign: CampaignResult,
    },
    /// Payment confirmed, but a notification took over provisioning
    Settling {
        order: OrderSummary,
        gateway_order_id: i64,
        campaign_id: Option<String>,
    },
}

/// Result of a recognized notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Acknowledged,
    AlreadyProcessed,
    Processed { campaign_id: String },
}

pub fn order_description(email: &str) -> String {
    truncate_with_ellipsis(&format!("QR campaign for {email}"), DESCRIPTION_MAX)
}

pub struct OrderReconciler {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    provisioner: Arc<Provisioner>,
    settings: OrderSettings,
}

impl OrderReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        provisioner: Arc<Provisioner>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            provisioner,
            settings,
        }
    }

    /// Validate, persist as `pending`, then drive the payment.
    ///
    /// Any error after the order row exists marks it `failed` with the
    /// error's reason before returning.
    pub async fn create_order(
        &self,
        request: OrderRequest,
        customer_ip: Option<String>,
    ) -> ServiceResult<OrderOutcome> {
        request.check()?;
        let amount = amount_from_price(request.price)?;

        let new_order = NewOrder {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
            email: request.campaign.email.clone(),
            amount,
            currency: self.settings.currency.clone(),
            payment_method: request.payment.method,
            campaign_spec: serde_json::to_value(&request.campaign)
                .map_err(|e| ServiceError::Internal(format!("campaign spec: {e}")))?,
            payload: request.storable_payload(),
            extension: serde_json::to_value(&request.extension)
                .map_err(|e| ServiceError::Internal(format!("extension: {e}")))?,
            invoice_requested: request.invoice_requested,
            invoice_details: request.invoice_details.clone(),
            notes: request.notes.clone(),
            created_at: now_millis(),
        };
        let order = self
            .store
            .insert_order(new_order)
            .await
            .map_err(ServiceError::persistence("Failed to persist order"))?;

        tracing::info!(
            order_id = %order.id,
            session_id = %order.session_id,
            amount = order.amount,
            method = order.payment_method.as_db(),
            "Order created"
        );

        match self.drive_payment(&order, &request, customer_ip).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Order processing failed");
                self.fail_order(&order.id, &e.failure_reason()).await;
                Err(e)
            }
        }
    }

    async fn drive_payment(
        &self,
        order: &Order,
        request: &OrderRequest,
        customer_ip: Option<String>,
    ) -> ServiceResult<OrderOutcome> {
        let registration = self
            .gateway
            .register_transaction(&RegisterRequest {
                session_id: order.session_id.clone(),
                amount: order.amount,
                currency: order.currency.clone(),
                description: order_description(&order.email),
                email: order.email.clone(),
                country: self.settings.country.clone(),
                language: self.settings.language.clone(),
                url_return: self.settings.return_url.clone(),
                url_status: self.settings.status_url.clone(),
                customer_ip,
            })
            .await?;

        self.store
            .attach_gateway_transaction(&order.id, &registration.token, registration.order_id)
            .await
            .map_err(ServiceError::persistence("Failed to persist order"))?;

        let summary = order.summary();
        let code = match (request.payment.method, request.payment.code.as_deref()) {
            (PaymentMethod::Transfer, _) => {
                return Ok(OrderOutcome::Pending {
                    order: summary,
                    gateway_order_id: registration.order_id,
                    redirect_url: self.gateway.redirect_url(&registration.token),
                });
            }
            (PaymentMethod::Blik, Some(code)) => code,
            (PaymentMethod::Blik, None) => {
                return Err(ServiceError::Validation(
                    "BLIK code is required for BLIK payments".into(),
                ));
            }
        };

        self.gateway
            .charge_immediate_code(&registration.token, code)
            .await?;
        let verification = self
            .gateway
            .verify_transaction(
                &order.session_id,
                order.amount,
                &order.currency,
                registration.order_id,
            )
            .await?;
        if !verification.is_success() {
            return Err(ServiceError::Gateway("BLIK payment not confirmed".into()));
        }

        if !self.claim(&order.id).await? {
            // A notification for this session is provisioning (or has).
            let current = self.reload(&order.session_id).await?;
            if current.status == OrderStatus::Failed {
                return Err(ServiceError::Gateway(
                    current
                        .failure_reason
                        .unwrap_or_else(|| "Order failed".to_string()),
                ));
            }
            tracing::info!(order_id = %order.id, "Provisioning taken over by notification");
            return Ok(OrderOutcome::Settling {
                order: summary,
                gateway_order_id: registration.order_id,
                campaign_id: current.campaign_id,
            });
        }

        let campaign = self.provisioner.provision(&request.campaign).await?;
        if !self
            .settle(order, &campaign.campaign_id, registration.order_id)
            .await?
        {
            return Err(ServiceError::Internal(
                "Order closed while provisioning".into(),
            ));
        }

        Ok(OrderOutcome::Paid {
            order: summary,
            gateway_order_id: registration.order_id,
            campaign,
        })
    }

    /// Process a signed payment notification
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> ServiceResult<NotificationOutcome> {
        let config = self.gateway.config();
        if notification.merchant_id != config.merchant_id || notification.pos_id != config.pos_id
        {
            tracing::warn!(session_id = %notification.session_id, "Notification merchant mismatch");
            return Err(ServiceError::MerchantMismatch);
        }

        if !signing::verify(
            &[
                &notification.session_id,
                &notification.order_id,
                &notification.amount,
                &notification.currency,
            ],
            &config.crc,
            &notification.sign,
        ) {
            tracing::warn!(session_id = %notification.session_id, "Invalid notification signature");
            return Err(ServiceError::SignatureMismatch);
        }

        let order = self
            .store
            .find_order_by_session(&notification.session_id)
            .await
            .map_err(ServiceError::persistence("Failed to load order"))?
            .ok_or(ServiceError::OrderNotFound)?;

        if notification.amount != order.amount || notification.currency != order.currency {
            tracing::warn!(
                order_id = %order.id,
                expected = order.amount,
                received = notification.amount,
                "Notification amount mismatch"
            );
            return Err(ServiceError::AmountMismatch);
        }

        if notification.status != STATUS_SUCCESS {
            let reason = format!("Gateway status: {}", notification.status);
            self.fail_order(&order.id, &reason).await;
            tracing::info!(order_id = %order.id, status = %notification.status, "Payment not successful");
            return Ok(NotificationOutcome::Acknowledged);
        }

        match order.status {
            OrderStatus::Paid => return Ok(NotificationOutcome::AlreadyProcessed),
            OrderStatus::Failed => {
                tracing::error!(
                    order_id = %order.id,
                    session_id = %order.session_id,
                    "Payment captured for a failed order, refund required"
                );
                return Ok(NotificationOutcome::Acknowledged);
            }
            OrderStatus::Pending => {}
        }

        let spec: CampaignSpec = match serde_json::from_value(order.campaign_spec.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Invalid campaign spec stored for order");
                self.fail_order(&order.id, STORED_PAYLOAD_INVALID).await;
                return Err(ServiceError::Finalize(STORED_PAYLOAD_INVALID.into()));
            }
        };
        if let Err(msg) = spec.validate_all() {
            tracing::error!(order_id = %order.id, error = %msg, "Invalid campaign spec stored for order");
            self.fail_order(&order.id, STORED_PAYLOAD_INVALID).await;
            return Err(ServiceError::Finalize(STORED_PAYLOAD_INVALID.into()));
        }

        if !self.claim(&order.id).await? {
            tracing::info!(order_id = %order.id, "Order already being provisioned");
            return Ok(NotificationOutcome::AlreadyProcessed);
        }

        let campaign = match self.provisioner.provision(&spec).await {
            Ok(campaign) => campaign,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Failed to finalize order");
                self.fail_order(&order.id, &e.failure_reason()).await;
                return Err(ServiceError::Finalize(FINALIZE_FAILED.into()));
            }
        };

        match self
            .settle(&order, &campaign.campaign_id, notification.order_id)
            .await
        {
            Ok(true) => Ok(NotificationOutcome::Processed {
                campaign_id: campaign.campaign_id,
            }),
            Ok(false) => Ok(NotificationOutcome::Acknowledged),
            Err(e) => {
                self.fail_order(&order.id, &e.failure_reason()).await;
                Err(ServiceError::Finalize(FINALIZE_FAILED.into()))
            }
        }
    }

    async fn claim(&self, order_id: &str) -> ServiceResult<bool> {
        self.store
            .claim_provisioning(order_id, now_millis())
            .await
            .map_err(ServiceError::persistence("Failed to update order"))
    }

    async fn reload(&self, session_id: &str) -> ServiceResult<Order> {
        self.store
            .find_order_by_session(session_id)
            .await
            .map_err(ServiceError::persistence("Failed to load order"))?
            .ok_or(ServiceError::OrderNotFound)
    }

    /// `pending -> paid`. A lost transition or a failed write deletes the
    /// campaign just provisioned, so no campaign exists without a paid order.
    async fn settle(
        &self,
        order: &Order,
        campaign_id: &str,
        gateway_order_id: i64,
    ) -> ServiceResult<bool> {
        match self
            .store
            .mark_paid(&order.id, campaign_id, Some(gateway_order_id), now_millis())
            .await
        {
            Ok(true) => {
                tracing::info!(order_id = %order.id, campaign_id = %campaign_id, "Order paid");
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!(
                    order_id = %order.id,
                    campaign_id = %campaign_id,
                    "Order left pending concurrently, discarding campaign"
                );
                self.provisioner.discard(campaign_id).await;
                Ok(false)
            }
            Err(e) => {
                self.provisioner.discard(campaign_id).await;
                Err(ServiceError::persistence("Failed to update order")(e))
            }
        }
    }

    /// `pending -> failed`. A no-op for orders already settled.
    async fn fail_order(&self, order_id: &str, reason: &str) {
        match self.store.mark_failed(order_id, reason).await {
            Ok(true) => tracing::info!(order_id = %order_id, reason = %reason, "Order failed"),
            Ok(false) => {
                tracing::debug!(order_id = %order_id, "Order already settled, failure not recorded")
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Failed to record order failure")
            }
        }
    }
}

/// JSON body of a recognized notification
pub fn notification_body(outcome: &NotificationOutcome) -> serde_json::Value {
    match outcome {
        NotificationOutcome::Acknowledged => json!({ "status": "acknowledged" }),
        NotificationOutcome::AlreadyProcessed => json!({ "status": "already_processed" }),
        NotificationOutcome::Processed { campaign_id } => {
            json!({ "status": "processed", "campaignId": campaign_id })
        }
    }
}
