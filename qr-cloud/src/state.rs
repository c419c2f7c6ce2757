//! Application state for qr-cloud

use std::sync::Arc;

use aws_sdk_sesv2::Client as SesClient;

use crate::config::Config;
use crate::db::{PgStore, Store};
use crate::email::{DisabledNotifier, Notifier, SesNotifier};
use crate::gateway::{GatewayClient, GatewayConfig, PaymentGateway};
use crate::provisioner::{ProvisionSettings, Provisioner};
use crate::reconcile::{OrderReconciler, OrderSettings};
use crate::redemption::RedemptionGate;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the components need beyond their collaborators
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub provision: ProvisionSettings,
    pub orders: OrderSettings,
    pub allow_direct_campaigns: bool,
    pub cors_allowed_origin: Option<String>,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        let (return_url, status_url) = OrderSettings::resolve(
            &config.public_app_url,
            config.public_frontend_url.as_deref(),
            config.gateway_return_url.as_deref(),
            config.gateway_status_url.as_deref(),
        );
        Self {
            provision: ProvisionSettings {
                public_base_url: config.public_app_url.clone(),
                asset_base_url: config.asset_base_url.clone(),
                asset_bucket: config.promo_asset_bucket.clone(),
            },
            orders: OrderSettings {
                currency: config.order_currency.clone(),
                country: config.order_country.clone(),
                language: config.order_language.clone(),
                return_url,
                status_url,
            },
            allow_direct_campaigns: config.allow_direct_campaigns,
            cors_allowed_origin: config.cors_allowed_origin.clone(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<OrderReconciler>,
    pub provisioner: Arc<Provisioner>,
    pub redemption: Arc<RedemptionGate>,
    pub settings: Arc<ServiceSettings>,
}

impl AppState {
    /// Wire the production collaborators: PostgreSQL, the REST gateway and SES
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store = PgStore::connect(&config.database_url).await?;
        tracing::info!("Database ready");

        let gateway = GatewayClient::new(GatewayConfig {
            merchant_id: config.gateway_merchant_id,
            pos_id: config.gateway_pos_id,
            api_key: config.gateway_api_key.clone(),
            crc: config.gateway_crc.clone(),
            api_url: config.gateway_api_url.clone(),
            payment_url: config.gateway_payment_url.clone(),
            return_url: config.gateway_return_url.clone(),
            status_url: config.gateway_status_url.clone(),
        })?;

        let notifier: Arc<dyn Notifier> = match &config.email_from {
            Some(from) => {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let ses = if let Some(region) = &config.ses_region {
                    let ses_config = aws_config
                        .to_builder()
                        .region(aws_config::Region::new(region.clone()))
                        .build();
                    SesClient::new(&ses_config)
                } else {
                    SesClient::new(&aws_config)
                };
                Arc::new(SesNotifier::new(ses, from.clone()))
            }
            None => {
                tracing::warn!("EMAIL_FROM not set, campaign summaries disabled");
                Arc::new(DisabledNotifier)
            }
        };

        Ok(Self::from_parts(
            Arc::new(store),
            Arc::new(gateway),
            notifier,
            ServiceSettings::from_config(config),
        ))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> Self {
        let provisioner = Arc::new(Provisioner::new(
            store.clone(),
            notifier,
            settings.provision.clone(),
        ));
        let reconciler = Arc::new(OrderReconciler::new(
            store.clone(),
            gateway,
            provisioner.clone(),
            settings.orders.clone(),
        ));
        Self {
            reconciler,
            provisioner,
            redemption: Arc::new(RedemptionGate::new(store)),
            settings: Arc::new(settings),
        }
    }
}
