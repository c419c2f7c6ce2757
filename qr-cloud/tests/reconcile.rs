//! Order reconciliation against the in-memory store and a scripted gateway

mod common;

use common::{Harness, notification, order_body};
use qr_cloud::db::Store;
use qr_cloud::error::ServiceError;
use qr_cloud::reconcile::{NotificationOutcome, OrderOutcome, OrderRequest, PaymentNotification};
use serde_json::{Value, json};
use shared::models::{NewOrder, OrderStatus, PaymentMethod};

fn request(body: Value) -> OrderRequest {
    serde_json::from_value(body).unwrap()
}

fn parse(value: Value) -> PaymentNotification {
    serde_json::from_value(value).unwrap()
}

/// Create a transfer order and return its session id and gateway order id
async fn pending_transfer(h: &Harness) -> (String, i64) {
    let outcome = h
        .state
        .reconciler
        .create_order(request(order_body("transfer")), None)
        .await
        .unwrap();
    match outcome {
        OrderOutcome::Pending {
            order,
            gateway_order_id,
            ..
        } => (order.session_id, gateway_order_id),
        other => panic!("expected pending, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transfer_registers_and_stays_pending() {
    let h = Harness::new();
    let outcome = h
        .state
        .reconciler
        .create_order(request(order_body("transfer")), Some("203.0.113.7".into()))
        .await
        .unwrap();

    let OrderOutcome::Pending {
        order,
        gateway_order_id,
        redirect_url,
    } = outcome
    else {
        panic!("expected pending");
    };
    assert_eq!(order.amount, 4999);
    assert_eq!(order.currency, "PLN");
    assert_eq!(
        redirect_url,
        format!("https://gateway.test/trnRequest/TOKEN-{gateway_order_id}")
    );

    let registrations = h.gateway.registrations.lock().clone();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].session_id, order.session_id);
    assert_eq!(registrations[0].url_status, "https://qr.test/gateway/webhook");
    assert_eq!(registrations[0].description, "QR campaign for shop@example.com");
    assert_eq!(registrations[0].customer_ip.as_deref(), Some("203.0.113.7"));

    let stored = h.store.order_by_session(&order.session_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.payment_method, PaymentMethod::Transfer);
    assert_eq!(stored.gateway_order_id, Some(gateway_order_id));
    assert_eq!(h.store.campaign_count(), 0);
}

#[tokio::test]
async fn test_success_notification_provisions_once() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;
    let note = notification(&session, gw_order, 4999, "success");

    let first = h
        .state
        .reconciler
        .handle_notification(parse(note.clone()))
        .await
        .unwrap();
    let NotificationOutcome::Processed { campaign_id } = first else {
        panic!("expected processed, got {first:?}");
    };

    let order = h.store.order_by_session(&session).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.campaign_id.as_deref(), Some(campaign_id.as_str()));

    let campaign = h.store.campaign(&campaign_id).unwrap();
    assert_eq!(campaign.max_scans, 2);
    assert_eq!(campaign.remaining_scans, 2);
    assert_eq!(h.store.tokens_for(&campaign_id).len(), 2);
    assert_eq!(h.notifier.sent.lock().len(), 1);

    let again = h
        .state
        .reconciler
        .handle_notification(parse(note))
        .await
        .unwrap();
    assert_eq!(again, NotificationOutcome::AlreadyProcessed);
    assert_eq!(h.store.campaign_count(), 1);
    assert_eq!(h.notifier.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_concurrent_notifications_provision_once() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;
    let note = notification(&session, gw_order, 4999, "success");

    let reconciler = h.state.reconciler.clone();
    let (a, b) = tokio::join!(
        reconciler.handle_notification(parse(note.clone())),
        reconciler.handle_notification(parse(note)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, NotificationOutcome::Processed { .. }))
        .count();
    assert_eq!(processed, 1);
    assert!(outcomes.contains(&NotificationOutcome::AlreadyProcessed));
    assert_eq!(h.store.campaign_count(), 1);
    assert_eq!(h.store.token_count(), 2);
    assert_eq!(
        h.store.order_by_session(&session).unwrap().status,
        OrderStatus::Paid
    );
}

#[tokio::test]
async fn test_unsuccessful_status_fails_order() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;

    let outcome = h
        .state
        .reconciler
        .handle_notification(parse(notification(&session, gw_order, 4999, "failed")))
        .await
        .unwrap();
    assert_eq!(outcome, NotificationOutcome::Acknowledged);

    let order = h.store.order_by_session(&session).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.failure_reason.as_deref(), Some("Gateway status: failed"));

    // A later capture does not resurrect the order
    let late = h
        .state
        .reconciler
        .handle_notification(parse(notification(&session, gw_order, 4999, "success")))
        .await
        .unwrap();
    assert_eq!(late, NotificationOutcome::Acknowledged);
    assert_eq!(
        h.store.order_by_session(&session).unwrap().status,
        OrderStatus::Failed
    );
    assert_eq!(h.store.campaign_count(), 0);
}

#[tokio::test]
async fn test_rejected_notifications_leave_order_pending() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;

    let mut forged = notification(&session, gw_order, 4999, "success");
    forged["sign"] = json!("0".repeat(96));
    let err = h
        .state
        .reconciler
        .handle_notification(parse(forged))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SignatureMismatch));

    let mut foreign = notification(&session, gw_order, 4999, "success");
    foreign["merchantId"] = json!(common::MERCHANT_ID + 1);
    let err = h
        .state
        .reconciler
        .handle_notification(parse(foreign))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MerchantMismatch));

    // Correctly signed, but for a different amount than the order
    let underpaid = notification(&session, gw_order, 100, "success");
    let err = h
        .state
        .reconciler
        .handle_notification(parse(underpaid))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AmountMismatch));

    assert_eq!(
        h.store.order_by_session(&session).unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(h.store.campaign_count(), 0);
}

#[tokio::test]
async fn test_unknown_session() {
    let h = Harness::new();
    let err = h
        .state
        .reconciler
        .handle_notification(parse(notification("no-such-session", 1, 4999, "success")))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OrderNotFound));
}

#[tokio::test]
async fn test_lost_paid_write_discards_campaign() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;
    h.store.fail_mark_paid(true);

    let err = h
        .state
        .reconciler
        .handle_notification(parse(notification(&session, gw_order, 4999, "success")))
        .await
        .unwrap_err();
    assert!(matches!(&err, ServiceError::Finalize(msg) if msg == "Failed to finalize order"));

    assert_eq!(h.store.campaign_count(), 0);
    assert_eq!(h.store.token_count(), 0);
    assert_eq!(
        h.store.order_by_session(&session).unwrap().status,
        OrderStatus::Failed
    );
}

#[tokio::test]
async fn test_provisioning_failure_fails_order() {
    let h = Harness::new();
    let (session, gw_order) = pending_transfer(&h).await;
    h.store.fail_token_inserts(true);

    let err = h
        .state
        .reconciler
        .handle_notification(parse(notification(&session, gw_order, 4999, "success")))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Finalize(_)));

    let order = h.store.order_by_session(&session).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.failure_reason.is_some());
    assert_eq!(h.store.campaign_count(), 0);
}

#[tokio::test]
async fn test_invalid_stored_spec_fails_order() {
    let h = Harness::new();
    h.store
        .insert_order(NewOrder {
            id: "order-broken".into(),
            session_id: "session-broken".into(),
            email: "shop@example.com".into(),
            amount: 4999,
            currency: "PLN".into(),
            payment_method: PaymentMethod::Transfer,
            campaign_spec: json!({ "email": "shop@example.com" }),
            payload: json!({}),
            extension: json!({}),
            invoice_requested: false,
            invoice_details: None,
            notes: None,
            created_at: 0,
        })
        .await
        .unwrap();

    let err = h
        .state
        .reconciler
        .handle_notification(parse(notification("session-broken", 9, 4999, "success")))
        .await
        .unwrap_err();
    assert!(matches!(&err, ServiceError::Finalize(msg) if msg == "Stored payload invalid"));

    let order = h.store.order("order-broken").unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.failure_reason.as_deref(), Some("Stored payload invalid"));
}

#[tokio::test]
async fn test_blik_confirmed_provisions_inline() {
    let h = Harness::new();
    let outcome = h
        .state
        .reconciler
        .create_order(request(order_body("blik")), None)
        .await
        .unwrap();

    let OrderOutcome::Paid {
        order, campaign, ..
    } = outcome
    else {
        panic!("expected paid");
    };
    let charges = h.gateway.charges.lock().clone();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].1, "777123");

    let stored = h.store.order_by_session(&order.session_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.campaign_id.as_deref(), Some(campaign.campaign_id.as_str()));
    // The code is never persisted
    assert_eq!(stored.payload["payment"], json!({ "method": "blik" }));
    assert_eq!(campaign.promo_code.as_deref(), Some("SPRING25"));
}

#[tokio::test]
async fn test_blik_unconfirmed_fails_order() {
    let h = Harness::new();
    h.gateway.set_verify_status("pending");

    let err = h
        .state
        .reconciler
        .create_order(request(order_body("blik")), None)
        .await
        .unwrap_err();
    assert!(matches!(&err, ServiceError::Gateway(msg) if msg == "BLIK payment not confirmed"));

    let registrations = h.gateway.registrations.lock().clone();
    let order = h.store.order_by_session(&registrations[0].session_id).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.failure_reason.as_deref(), Some("BLIK payment not confirmed"));
    assert_eq!(h.store.campaign_count(), 0);
}

#[tokio::test]
async fn test_blik_defers_to_notification_holding_claim() {
    let h = Harness::new();
    h.gateway.claim_on_verify(h.store.clone());

    let outcome = h
        .state
        .reconciler
        .create_order(request(order_body("blik")), None)
        .await
        .unwrap();
    let OrderOutcome::Settling {
        order, campaign_id, ..
    } = outcome
    else {
        panic!("expected settling");
    };
    assert_eq!(campaign_id, None);
    assert_eq!(h.store.campaign_count(), 0);

    let stored = h.store.order_by_session(&order.session_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.provisioning_started_at.is_some());
}

#[tokio::test]
async fn test_registration_failure_fails_order() {
    let h = Harness::new();
    h.gateway.fail_register(true);

    let err = h
        .state
        .reconciler
        .create_order(request(order_body("transfer")), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Gateway(_)));
    assert!(h.gateway.registrations.lock().is_empty());
}

#[tokio::test]
async fn test_invalid_request_touches_nothing() {
    let h = Harness::new();
    let mut body = order_body("blik");
    body["payment"]["code"] = json!("12ab");

    let err = h
        .state
        .reconciler
        .create_order(request(body), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(h.gateway.registrations.lock().is_empty());

    let mut body = order_body("transfer");
    body["promoCode"] = Value::Null;
    let err = h
        .state
        .reconciler
        .create_order(request(body), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(h.gateway.registrations.lock().is_empty());
}

#[tokio::test]
async fn test_notification_survives_mail_failure() {
    let h = Harness::new();
    h.notifier.fail(true);
    let (session, gw_order) = pending_transfer(&h).await;

    let outcome = h
        .state
        .reconciler
        .handle_notification(parse(notification(&session, gw_order, 4999, "success")))
        .await
        .unwrap();
    let NotificationOutcome::Processed { campaign_id } = outcome else {
        panic!("expected processed, got {outcome:?}");
    };

    let order = h.store.order_by_session(&session).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(h.store.campaign_count(), 1);
    assert_eq!(h.store.tokens_for(&campaign_id).len(), 2);
    assert!(h.notifier.sent.lock().is_empty());
}

#[tokio::test]
async fn test_blik_survives_mail_failure() {
    let h = Harness::new();
    h.notifier.fail(true);

    let outcome = h
        .state
        .reconciler
        .create_order(request(order_body("blik")), None)
        .await
        .unwrap();
    let OrderOutcome::Paid { order, campaign, .. } = outcome else {
        panic!("expected paid");
    };

    let stored = h.store.order_by_session(&order.session_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(h.store.campaign_count(), 1);
    assert_eq!(h.store.tokens_for(&campaign.campaign_id).len(), 2);
    assert!(h.notifier.sent.lock().is_empty());
}
