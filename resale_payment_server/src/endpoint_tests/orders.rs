use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use resale_payment_engine::{
    db_types::{Cents, CatalogProduct, OrderItem, OrderStatusType, PaymentStatus, UpstreamListing},
    test_utils::FakeGateway,
    CheckoutApi,
    OrderFlowApi,
    PriceQuoteEngine,
};
use serde_json::{json, Value};

use super::{
    helpers::{reconciliation, sample_order, send_request, stored_order},
    mocks::MockBackend,
};
use crate::routes::{CreateDirectPaymentRoute, CreateOrderRoute, CreatePreferenceRoute, CreateUpstreamOrderRoute};

fn configure_orders(db: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL");
        cfg.service(
            web::scope("/api")
                .service(CreateOrderRoute::<MockBackend>::new())
                .service(CreateUpstreamOrderRoute::<MockBackend>::new()),
        )
        .app_data(web::Data::new(api));
    }
}

fn configure_checkout(db: MockBackend, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = CheckoutApi::new(OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL"), gateway);
        cfg.service(
            web::scope("/api")
                .service(CreatePreferenceRoute::<MockBackend, FakeGateway>::new())
                .service(CreateDirectPaymentRoute::<MockBackend, FakeGateway>::new()),
        )
        .app_data(web::Data::new(api));
    }
}

fn order_line(goods_no: &str, unit_price: i64, quantity: i64) -> OrderItem {
    OrderItem {
        id: 1,
        order_id: 1,
        product_ref: goods_no.into(),
        title: format!("Album {goods_no}"),
        quantity,
        unit_price: Cents::from(unit_price),
        source_price: Some("10".into()),
        unit_subtotal: Some("92.40000".into()),
        source_currency: Some("USD".into()),
        variation_id: None,
    }
}

/// A backend holding order `order-1` (one line at 94.99, owned by alice).
fn backend_with_order() -> MockBackend {
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id()
        .returning(|id| Ok((id.as_str() == "order-1").then(|| sample_order("order-1", OrderStatusType::Created))));
    db.expect_fetch_order_items().returning(|_| Ok(vec![order_line("1001", 9499, 1)]));
    db
}

#[actix_web::test]
async fn create_internal_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_product().returning(|id| {
        Ok((id == "p1").then(|| CatalogProduct { id: "p1".into(), title: "Lightstick".into(), price_cents: Cents::from(1999) }))
    });
    db.expect_insert_order()
        .withf(|o| o.total_price().ok() == Some(Cents::from(3998)) && o.user_id.as_deref() == Some("alice"))
        .times(1)
        .returning(|o| Ok(stored_order(&o)));
    db.expect_fetch_order_items().returning(|_| Ok(vec![]));
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(json!({"user_id": "alice", "items": [{"product_id": "p1", "quantity": 2}]}));
    let (status, body) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["total_cents"], json!(3998));
    assert_eq!(order["status"], json!("created"));
    assert_eq!(order["currency"], json!("BRL"));
    assert!(order["items"].is_array());
}

#[actix_web::test]
async fn unknown_products_and_bad_quantities() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_product().returning(|_| Ok(None));
    db.expect_insert_order().never();
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"items": [{"product_id": "nope", "quantity": 1}]}));
    let (status, body) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("nope"), "{body}");

    let mut db = MockBackend::new();
    db.expect_insert_order().never();
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"items": [{"product_id": "p1", "quantity": 0}]}));
    let (status, _) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn huge_quantities_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_product().never();
    db.expect_insert_order().never();
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(json!({"items": [{"product_id": "p1", "quantity": 4_611_686_018_427_387_904_i64}]}));
    let (status, body) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("at most 999"), "{body}");
}

#[actix_web::test]
async fn create_upstream_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_upstream_listing().returning(|goods_no| {
        Ok(Some(UpstreamListing {
            goods_no: goods_no.to_string(),
            name: "Album".into(),
            price_amount: "10".into(),
            currency: "USD".into(),
        }))
    });
    db.expect_insert_order()
        .withf(|o| {
            o.total_price().ok() == Some(Cents::from(2 * 9499)) &&
                o.customer.as_ref().map(|c| c.email.as_str()) == Some("buyer@example.com")
        })
        .times(1)
        .returning(|o| Ok(stored_order(&o)));
    db.expect_fetch_order_items().returning(|_| Ok(vec![]));
    let req = TestRequest::post().uri("/api/orders/upstream").set_json(json!({
        "items": [{"goods_no": "1001", "quantity": 2}],
        "customer_name": "Buyer",
        "customer_email": "buyer@example.com",
        "customer_phone": "+55 11 98888-7777",
        "shipping_address": "Rua B, 2",
        "shipping_city": "Campinas",
        "shipping_state": "SP",
        "shipping_zip_code": "13000-000"
    }));
    let (status, body) = send_request(req, configure_orders(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["order_id"].as_str().map(str::len), Some(36));
}

#[actix_web::test]
async fn create_preference() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let mut db = backend_with_order();
    db.expect_reconcile_payment()
        .withf(|p| p.status == PaymentStatus::Pending && p.external_id == "pref-1" && p.amount == Cents::from(9499))
        .times(1)
        .returning(|p| Ok(Some(reconciliation(p, OrderStatusType::Created, OrderStatusType::Created))));
    let req = TestRequest::post()
        .uri("/api/payments/mercadopago/preference")
        .set_json(json!({"order_id": "order-1", "user_id": "alice"}));
    let (status, body) = send_request(req, configure_checkout(db, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["preference_id"], json!("pref-1"));
    assert_eq!(result["init_point"], json!("https://checkout.example.com/pref-1"));
    let preferences = gateway.preferences();
    assert_eq!(preferences.len(), 1);
    assert_eq!(preferences[0].total().unwrap(), Cents::from(9499));
    assert_eq!(preferences[0].external_reference.as_str(), "order-1");
}

#[actix_web::test]
async fn preferences_for_other_peoples_orders() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let mut db = backend_with_order();
    db.expect_reconcile_payment().never();
    let req = TestRequest::post()
        .uri("/api/payments/mercadopago/preference")
        .set_json(json!({"order_id": "order-1", "user_id": "mallory"}));
    let (status, _) = send_request(req, configure_checkout(db, gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post().uri("/api/payments/mercadopago/preference").set_json(json!({"order_id": "order-2"}));
    let (status, _) = send_request(req, configure_checkout(backend_with_order(), gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(gateway.preferences().is_empty());
}

#[actix_web::test]
async fn direct_payment() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let mut db = backend_with_order();
    db.expect_reconcile_payment()
        .withf(|p| p.status == PaymentStatus::Approved && p.external_id == "9001")
        .times(1)
        .returning(|p| Ok(Some(reconciliation(p, OrderStatusType::Created, OrderStatusType::Paid))));
    let req = TestRequest::post()
        .uri("/api/payments/mercadopago/payment")
        .insert_header(("x-idempotency-key", "checkout-attempt-1"))
        .set_json(json!({
            "orderId": "order-1",
            "payment_method_id": "pix",
            "currency_id": "BRL",
            "transaction_amount": 0.01,
            "payer": {"email": "alice@example.com"}
        }));
    let (status, body) = send_request(req, configure_checkout(db, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["status"], json!("approved"));
    let requests = gateway.payment_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    // The pix quote for a 92.40 subtotal: 92.40 / 0.9901 = 93.32, charm rounded to 94.99
    assert_eq!(request.amount, Cents::from(9499));
    assert_eq!(request.external_reference.as_str(), "order-1");
    assert_eq!(request.idempotency_key.as_deref(), Some("checkout-attempt-1"));
    assert!(!request.passthrough.contains_key("currency_id"));
    assert!(!request.passthrough.contains_key("transaction_amount"));
    assert_eq!(request.passthrough["payer"], json!({"email": "alice@example.com"}));
}

#[actix_web::test]
async fn direct_payment_for_unknown_orders() {
    let _ = env_logger::try_init().ok();
    let gateway = FakeGateway::new();
    let req = TestRequest::post()
        .uri("/api/payments/mercadopago/payment")
        .set_json(json!({"payment_method_id": "visa", "installments": 1}));
    let (status, _) = send_request(req, configure_checkout(MockBackend::new(), gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/payments/mercadopago/payment")
        .set_json(json!({"order_id": "order-9", "payment_method_id": "visa"}));
    let (status, _) = send_request(req, configure_checkout(backend_with_order(), gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(gateway.payment_requests().is_empty());
}
