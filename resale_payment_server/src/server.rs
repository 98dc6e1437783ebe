use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use resale_payment_engine::{CheckoutApi, OrderFlowApi, PriceQuoteEngine, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::MercadoPagoGateway,
    middleware::AdminTokenMiddlewareFactory,
    routes::{
        health,
        CreateDirectPaymentRoute,
        CreateOrderRoute,
        CreatePreferenceRoute,
        CreateUpstreamOrderRoute,
        MercadopagoWebhookGetRoute,
        MercadopagoWebhookPostRoute,
        UpdateOrderStatusRoute,
    },
    signature::SignatureVerifier,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    Ok(srv.await?)
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let gateway = MercadoPagoGateway::new(config.mercadopago.clone(), &config.checkout)?;
    let pricing = PriceQuoteEngine::new(config.pricing.clone());
    // Built once, so that every worker shares the same per-payment locks
    let orders_api = OrderFlowApi::new(db, pricing, config.currency.as_str());
    let checkout_api = CheckoutApi::new(orders_api.clone(), gateway);
    let verifier = SignatureVerifier::new(config.webhook.clone());
    info!("💻️ Orders are charged in {}", config.currency);
    let admin_token = config.admin_token.clone();
    let srv = HttpServer::new(move || {
        let admin_scope = web::scope("/admin")
            .wrap(AdminTokenMiddlewareFactory::new(&admin_token))
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new());
        let api_scope = web::scope("/api")
            .service(MercadopagoWebhookGetRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(MercadopagoWebhookPostRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(CreateUpstreamOrderRoute::<SqliteDatabase>::new())
            .service(CreatePreferenceRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CreateDirectPaymentRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(admin_scope);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("rpg::access_log"))
            .app_data(web::Data::new(orders_api.clone()))
            .app_data(web::Data::new(checkout_api.clone()))
            .app_data(web::Data::new(verifier.clone()))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
