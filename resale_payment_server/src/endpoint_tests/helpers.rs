use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::debug;
use resale_payment_engine::{
    db_types::{Cents, NewOrder, NewPayment, Order, OrderId, OrderSource, OrderStatusType, Payment},
    traits::PaymentReconciliation,
};
use sha2::Sha256;

/// Sends the request to an app set up by `configure`, and returns the status and body of the response. Errors raised
/// by middleware are rendered the way actix renders them for a real client.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Signs a notification the way Mercado Pago does, returning the `x-signature` header value.
pub fn sign_notification(secret: &str, data_id: &str, request_id: &str, ts: i64) -> String {
    let manifest = format!("id:{data_id};request-id:{request_id};ts:{ts};");
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(manifest.as_bytes());
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("ts={ts},v1={digest}")
}

pub fn sample_order(order_id: &str, status: OrderStatusType) -> Order {
    Order {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        source: OrderSource::Upstream,
        user_id: Some("alice".into()),
        total_cents: Cents::from(9499),
        currency: "BRL".into(),
        status,
        customer_name: Some("Alice".into()),
        customer_email: Some("alice@example.com".into()),
        customer_phone: Some("+55 11 99999-0000".into()),
        customer_document: None,
        shipping_address: Some("Rua A, 1".into()),
        shipping_city: Some("São Paulo".into()),
        shipping_state: Some("SP".into()),
        shipping_zip_code: Some("01000-000".into()),
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    }
}

/// What the backend would store for a new order.
pub fn stored_order(order: &NewOrder) -> Order {
    Order {
        order_id: order.order_id.clone(),
        source: order.source,
        user_id: order.user_id.clone(),
        total_cents: order.total_price().unwrap(),
        currency: order.currency.clone(),
        ..sample_order("", OrderStatusType::Created)
    }
}

/// The result of reconciling `payment` against an order that ends up in `status`.
pub fn reconciliation(payment: NewPayment, previous: OrderStatusType, status: OrderStatusType) -> PaymentReconciliation {
    let order = sample_order(payment.order_id.as_str(), status);
    let payment = Payment {
        id: 1,
        order_id: order.id,
        provider: payment.provider,
        status: payment.status,
        amount_cents: payment.amount,
        external_id: Some(payment.external_id),
        raw_payload: payment.raw_payload.to_string(),
        created_at: order.created_at,
        updated_at: order.updated_at,
    };
    PaymentReconciliation { payment, order, previous_status: previous }
}
