use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use resale_payment_engine::{
    db_types::{Cents, OrderStatusType, PaymentStatus},
    test_utils::FakeGateway,
    traits::GatewayError,
    CheckoutApi,
    OrderFlowApi,
    PriceQuoteEngine,
};
use serde_json::json;

use super::{
    helpers::{reconciliation, sample_order, send_request, sign_notification},
    mocks::MockBackend,
};
use crate::{
    config::WebhookConfig,
    routes::{MercadopagoWebhookGetRoute, MercadopagoWebhookPostRoute},
    signature::SignatureVerifier,
};

const SECRET: &str = "webhook-secret";
const OK: &str = r#"{"status":"ok"}"#;
const IGNORED: &str = r#"{"status":"ignored"}"#;

fn configure(
    db: MockBackend,
    gateway: FakeGateway,
    webhook: WebhookConfig,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = CheckoutApi::new(OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL"), gateway);
        cfg.service(
            web::scope("/api")
                .service(MercadopagoWebhookGetRoute::<MockBackend, FakeGateway>::new())
                .service(MercadopagoWebhookPostRoute::<MockBackend, FakeGateway>::new()),
        )
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(SignatureVerifier::new(webhook)));
    }
}

fn signed() -> WebhookConfig {
    WebhookConfig::new(SECRET, true, Duration::from_secs(300))
}

fn unsigned() -> WebhookConfig {
    WebhookConfig::new("", false, Duration::from_secs(300))
}

/// A backend holding order `order-1`, waiting for payment, that expects exactly one reconciliation.
fn backend_expecting_payment(status: PaymentStatus, target: OrderStatusType) -> MockBackend {
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), OrderStatusType::Created))));
    db.expect_reconcile_payment()
        .withf(move |p| p.status == status && p.external_id == "123" && p.order_id.as_str() == "order-1")
        .times(1)
        .returning(move |p| Ok(Some(reconciliation(p, OrderStatusType::Created, target))));
    db
}

#[actix_web::test]
async fn signed_payment_notification() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_payment("123", "approved", Some(94.99), Some("order-1"));
    let db = backend_expecting_payment(PaymentStatus::Approved, OrderStatusType::Paid);
    let ts = Utc::now().timestamp_millis();
    let req = TestRequest::post()
        .uri("/api/webhooks/mercadopago")
        .insert_header(("x-signature", sign_notification(SECRET, "123", "req-1", ts)))
        .insert_header(("x-request-id", "req-1"))
        .set_json(json!({"type": "payment", "data": {"id": "123"}}));
    let (status, body) = send_request(req, configure(db, gateway.clone(), signed())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, OK);
    assert_eq!(gateway.fetch_count(), 1);
}

#[actix_web::test]
async fn signed_get_notification() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_payment("123", "rejected", Some(94.99), Some("order-1"));
    let db = backend_expecting_payment(PaymentStatus::Cancelled, OrderStatusType::Cancelled);
    let ts = Utc::now().timestamp_millis();
    let req = TestRequest::get()
        .uri("/api/webhooks/mercadopago?topic=payment&id=123")
        .insert_header(("x-signature", sign_notification(SECRET, "123", "req-2", ts)))
        .insert_header(("x-request-id", "req-2"));
    let (status, body) = send_request(req, configure(db, gateway, signed())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, OK);
}

#[actix_web::test]
async fn bad_signatures_are_refused_before_anything_happens() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_payment("123", "approved", Some(94.99), Some("order-1"));
    let ts = Utc::now().timestamp_millis();
    let cases = [
        // signed for another payment
        Some(sign_notification(SECRET, "124", "req-1", ts)),
        // signed with another secret
        Some(sign_notification("other-secret", "123", "req-1", ts)),
        // too old
        Some(sign_notification(SECRET, "123", "req-1", ts - 301_000)),
        Some("v1=abcdef".to_string()),
        None,
    ];
    for header in cases {
        let mut req = TestRequest::post()
            .uri("/api/webhooks/mercadopago?data.id=123&type=payment")
            .insert_header(("x-request-id", "req-1"))
            .set_json(json!({"type": "payment", "data": {"id": "123"}}));
        if let Some(h) = &header {
            req = req.insert_header(("x-signature", h.as_str()));
        }
        let (status, body) = send_request(req, configure(MockBackend::new(), gateway.clone(), signed())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{header:?}");
        assert!(body.contains("Invalid webhook signature"), "{body}");
    }
    assert_eq!(gateway.fetch_count(), 0);
}

#[actix_web::test]
async fn strict_mode_without_a_secret() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let webhook = WebhookConfig::new("", true, Duration::from_secs(300));
    let req = TestRequest::get().uri("/api/webhooks/mercadopago?topic=payment&id=123");
    let (status, _) = send_request(req, configure(MockBackend::new(), gateway.clone(), webhook)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.fetch_count(), 0);
}

#[actix_web::test]
async fn other_topics_are_ignored() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let req = TestRequest::get().uri("/api/webhooks/mercadopago?topic=merchant_order&id=5");
    let (status, body) = send_request(req, configure(MockBackend::new(), gateway.clone(), unsigned())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, IGNORED);

    let req = TestRequest::post().uri("/api/webhooks/mercadopago").set_json(json!({"type": "payment"}));
    let (status, body) = send_request(req, configure(MockBackend::new(), gateway.clone(), unsigned())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, IGNORED);
    assert_eq!(gateway.fetch_count(), 0);
}

#[actix_web::test]
async fn unknown_payments_and_orders_are_ignored() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let req = TestRequest::post().uri("/api/webhooks/mercadopago?topic=payment&id=404");
    let (status, body) = send_request(req, configure(MockBackend::new(), gateway.clone(), unsigned())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, IGNORED);

    gateway.set_payment("55", "approved", Some(10.0), Some("no-such-order"));
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id().times(1).returning(|_| Ok(None));
    db.expect_reconcile_payment().never();
    let req = TestRequest::post().uri("/api/webhooks/mercadopago?topic=payment&id=55");
    let (status, body) = send_request(req, configure(db, gateway, unsigned())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, IGNORED);
}

#[actix_web::test]
async fn gateway_failures_ask_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_failure(Some(GatewayError::Unavailable("connection reset".into())));
    let mut db = MockBackend::new();
    db.expect_reconcile_payment().never();
    let req = TestRequest::post()
        .uri("/api/webhooks/mercadopago")
        .set_json(json!({"type": "payment", "data": {"id": 77}}));
    let (status, body) = send_request(req, configure(db, gateway, unsigned())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("connection reset"), "{body}");
}

#[actix_web::test]
async fn missing_amounts_fall_back_to_the_order_total() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    gateway.set_payment("123", "pending", None, Some("order-1"));
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), OrderStatusType::Created))));
    db.expect_reconcile_payment()
        .withf(|p| p.amount == Cents::from(9499) && p.status == PaymentStatus::Pending)
        .times(1)
        .returning(|p| Ok(Some(reconciliation(p, OrderStatusType::Created, OrderStatusType::Created))));
    let req = TestRequest::post().uri("/api/webhooks/mercadopago?topic=payment&id=123");
    let (status, body) = send_request(req, configure(db, gateway, unsigned())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, OK);
}
