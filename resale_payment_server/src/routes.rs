//! Request handler definitions
//!
//! Define each route and its handler here. Handlers should stay thin: parse the request, call into the engine, and
//! shape the response. Anything longer belongs in the engine or in a helper module.
//!
//! Handlers run on actix worker threads, and each worker processes its requests one after another, so a handler must
//! never block. Database and gateway calls are all `async` and must be awaited, never waited on.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use resale_payment_engine::{
    db_types::OrderId,
    order_objects::{InternalOrderRequest, NotificationOutcome, UpstreamOrderRequest},
    traits::{PaymentGateway, PaymentGatewayDatabase},
    CheckoutApi,
    OrderFlowApi,
};
use serde_json::{Map, Value};

use crate::{
    data_objects::{
        direct_payment_input,
        PreferenceParams,
        PreferenceResult,
        StatusUpdateParams,
        UpstreamOrderResult,
        WebhookNotification,
        WebhookQuery,
        WebhookResponse,
    },
    errors::ServerError,
    signature::SignatureVerifier,
};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
// `route!(name => Method "/path" impl Trait1, Trait2)` creates `NameRoute<T1, T2>`, which registers `name::<T1, T2>`.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(mercadopago_webhook_get => Get "/webhooks/mercadopago" impl PaymentGatewayDatabase, PaymentGateway);
/// Mercado Pago notification, delivered as a GET with everything in the query string.
pub async fn mercadopago_webhook_get<B, G>(
    req: HttpRequest,
    query: web::Query<WebhookQuery>,
    verifier: web::Data<SignatureVerifier>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Received Mercado Pago notification (GET)");
    let notification = WebhookNotification::from_query(&query);
    handle_notification(&req, notification, &verifier, &api).await
}

route!(mercadopago_webhook_post => Post "/webhooks/mercadopago" impl PaymentGatewayDatabase, PaymentGateway);
/// Mercado Pago notification, delivered as a POST. The body is optional, and is only consulted for ids and the
/// topic when the query string does not carry them.
pub async fn mercadopago_webhook_post<B, G>(
    req: HttpRequest,
    query: web::Query<WebhookQuery>,
    body: web::Bytes,
    verifier: web::Data<SignatureVerifier>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Received Mercado Pago notification (POST)");
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&body)
            .map_err(|e| debug!("💻️ Notification body is not JSON, only the query string will be used. {e}"))
            .ok()
    };
    let notification = WebhookNotification::from_post(&query, body.as_ref());
    handle_notification(&req, notification, &verifier, &api).await
}

async fn handle_notification<B, G>(
    req: &HttpRequest,
    notification: WebhookNotification,
    verifier: &SignatureVerifier,
    api: &CheckoutApi<B, G>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    verifier.verify(header(SIGNATURE_HEADER), header(REQUEST_ID_HEADER), notification.signature_id.as_deref()).map_err(
        |e| {
            warn!("💻️ Refusing Mercado Pago notification {notification:?}. {e}");
            ServerError::from(e)
        },
    )?;
    let Some(payment_id) = notification.payment_id() else {
        debug!("💻️ Notification {notification:?} is not about a payment. Ignoring it.");
        return Ok(HttpResponse::Ok().json(WebhookResponse::ignored()));
    };
    info!("💻️ Mercado Pago notification for payment {payment_id}");
    let response = match api.process_payment_notification(payment_id).await? {
        NotificationOutcome::Processed(_) => WebhookResponse::ok(),
        NotificationOutcome::Ignored(reason) => {
            debug!("💻️ Notification for payment {payment_id} ignored: {reason}");
            WebhookResponse::ignored()
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Creates an order for products in the local catalog. Returns the stored order with its lines.
pub async fn create_order<B: PaymentGatewayDatabase>(
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<InternalOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received internal order request");
    let order = api.create_internal_order(body.into_inner()).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(create_upstream_order => Post "/orders/upstream" impl PaymentGatewayDatabase);
/// Creates an order for goods from the upstream retailer, priced through the pricing engine.
pub async fn create_upstream_order<B: PaymentGatewayDatabase>(
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<UpstreamOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received upstream order request");
    let order = api.create_upstream_order(body.into_inner()).await.map_err(|e| {
        debug!("💻️ Could not create upstream order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(UpstreamOrderResult { order_id: order.order.order_id }))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(create_preference => Post "/payments/mercadopago/preference" impl PaymentGatewayDatabase, PaymentGateway);
pub async fn create_preference<B, G>(
    api: web::Data<CheckoutApi<B, G>>,
    body: web::Json<PreferenceParams>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    let PreferenceParams { order_id, user_id } = body.into_inner();
    trace!("💻️ Received preference request for order {order_id}");
    let preference = api.create_preference(&order_id, user_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(PreferenceResult::from(preference)))
}

route!(create_direct_payment => Post "/payments/mercadopago/payment" impl PaymentGatewayDatabase, PaymentGateway);
/// Charges the buyer directly. Fields the storefront collected (card token, payer, ...) are passed on to the gateway
/// as they are. Returns the gateway's response.
pub async fn create_direct_payment<B, G>(
    req: HttpRequest,
    api: web::Data<CheckoutApi<B, G>>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    let idempotency_key =
        req.headers().get(IDEMPOTENCY_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let input = direct_payment_input(body.into_inner(), idempotency_key)?;
    trace!("💻️ Received direct payment request for order {}", input.order_id);
    let payment = api.create_direct_payment(input).await?;
    Ok(HttpResponse::Ok().json(payment.raw))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(update_order_status => Patch "/orders/{order_id}/status" impl PaymentGatewayDatabase);
/// Changes the status of an order. The change must be allowed by the order status rules, unless `force` is set.
pub async fn update_order_status<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<StatusUpdateParams>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = body.status()?;
    info!("💻️ Admin request to set order {order_id} to {status} (force: {})", body.force);
    let order = api.modify_status_for_order(&order_id, status, body.force).await.map_err(|e| {
        debug!("💻️ Could not update order status. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}
