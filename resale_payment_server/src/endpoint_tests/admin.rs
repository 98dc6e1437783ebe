use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use resale_payment_engine::{db_types::OrderStatusType, OrderFlowApi, PriceQuoteEngine};
use rpg_common::Secret;
use serde_json::{json, Value};

use super::{
    helpers::{sample_order, send_request},
    mocks::MockBackend,
};
use crate::{middleware::AdminTokenMiddlewareFactory, routes::UpdateOrderStatusRoute};

const TOKEN: &str = "correct horse battery staple";

fn configure(db: MockBackend, token: &str) -> impl FnOnce(&mut ServiceConfig) {
    let token = Secret::new(token.to_string());
    move |cfg| {
        let api = OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL");
        cfg.service(
            web::scope("/api/admin")
                .wrap(AdminTokenMiddlewareFactory::new(&token))
                .service(UpdateOrderStatusRoute::<MockBackend>::new()),
        )
        .app_data(web::Data::new(api));
    }
}

fn status_request(token: Option<&str>, body: Value) -> TestRequest {
    let mut req = TestRequest::patch().uri("/api/admin/orders/order-1/status").set_json(body);
    if let Some(token) = token {
        req = req.insert_header(("x-admin-token", token));
    }
    req
}

/// A backend holding `order-1` in the given status, that accepts one status update.
fn backend(current: OrderStatusType) -> MockBackend {
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id().returning(move |id| Ok(Some(sample_order(id.as_str(), current))));
    db.expect_update_order_status()
        .withf(move |id, expected, _| id.as_str() == "order-1" && *expected == current)
        .times(1)
        .returning(|id, _, new_status| Ok(sample_order(id.as_str(), new_status)));
    db
}

#[actix_web::test]
async fn admin_calls_need_the_token() {
    let _ = env_logger::try_init().ok();
    for token in [None, Some(""), Some("wrong"), Some("correct horse battery stapl")] {
        let req = status_request(token, json!({"status": "paid"}));
        let (status, body) = send_request(req, configure(MockBackend::new(), TOKEN)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token:?}");
        assert!(body.contains("Authentication Error"), "{body}");
    }
}

#[actix_web::test]
async fn admin_calls_are_refused_without_a_configured_token() {
    let _ = env_logger::try_init().ok();
    for token in [None, Some(""), Some("anything")] {
        let req = status_request(token, json!({"status": "paid"}));
        let (status, body) = send_request(req, configure(MockBackend::new(), "  ")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Admin access is disabled"), "{body}");
    }
}

#[actix_web::test]
async fn update_status() {
    let _ = env_logger::try_init().ok();
    let req = status_request(Some(TOKEN), json!({"status": "KTOWN_ORDERED"}));
    let (status, body) = send_request(req, configure(backend(OrderStatusType::Paid), TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["order_id"], json!("order-1"));
    assert_eq!(order["status"], json!("ktown_ordered"));
}

#[actix_web::test]
async fn forbidden_transitions_need_force() {
    let _ = env_logger::try_init().ok();
    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), OrderStatusType::Shipped))));
    db.expect_update_order_status().never();
    let req = status_request(Some(TOKEN), json!({"status": "paid"}));
    let (status, body) = send_request(req, configure(db, TOKEN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot move from shipped to paid"), "{body}");

    let req = status_request(Some(TOKEN), json!({"status": "paid", "force": true}));
    let (status, body) = send_request(req, configure(backend(OrderStatusType::Shipped), TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["status"], json!("paid"));
}

#[actix_web::test]
async fn unknown_statuses_and_orders() {
    let _ = env_logger::try_init().ok();
    let req = status_request(Some(TOKEN), json!({"status": "refunded", "force": true}));
    let (status, _) = send_request(req, configure(MockBackend::new(), TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut db = MockBackend::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
    let req = status_request(Some(TOKEN), json!({"status": "cancelled"}));
    let (status, _) = send_request(req, configure(db, TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
