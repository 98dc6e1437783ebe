use std::{env, time::Duration};

use log::*;
use mercadopago_tools::{data_objects::BackUrls, MercadoPagoConfig};
use resale_payment_engine::PricingConfig;
use rpg_common::{
    helpers::{non_empty, parse_boolean_flag},
    Secret,
};

const DEFAULT_RPG_HOST: &str = "127.0.0.1";
const DEFAULT_RPG_PORT: u16 = 8360;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_CURRENCY: &str = "BRL";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8360";
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);
pub const WEBHOOK_PATH: &str = "/api/webhooks/mercadopago";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Shared secret for the admin endpoints. When empty, every admin call is refused.
    pub admin_token: Secret<String>,
    /// The currency that orders are charged in
    pub currency: String,
    pub pricing: PricingConfig,
    pub webhook: WebhookConfig,
    pub mercadopago: MercadoPagoConfig,
    pub checkout: CheckoutConfig,
}

/// How inbound Mercado Pago notifications are authenticated.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub secret: Secret<String>,
    /// If true, notifications are refused when no secret has been configured. Otherwise they are accepted unchecked.
    pub strict: bool,
    /// The maximum distance between the signature timestamp and the server clock
    pub tolerance: Duration,
}

/// Where the gateway sends notifications and buyers.
#[derive(Clone, Debug, Default)]
pub struct CheckoutConfig {
    /// Public url of this server, without a trailing slash
    pub public_base_url: String,
    pub back_urls: BackUrls,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPG_HOST.to_string(),
            port: DEFAULT_RPG_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            admin_token: Secret::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            pricing: PricingConfig::default(),
            webhook: WebhookConfig::default(),
            mercadopago: MercadoPagoConfig::default(),
            checkout: CheckoutConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RPG_HOST").ok().unwrap_or_else(|| DEFAULT_RPG_HOST.into());
        let port = env::var("RPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for RPG_PORT. {e} Using the default, {DEFAULT_RPG_PORT}, instead."
                    );
                    DEFAULT_RPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_RPG_PORT);
        let database_url = resale_payment_engine::db_url();
        let db_max_connections = env::var("RPG_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.trim()
                    .parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid value for RPG_DB_MAX_CONNECTIONS ({s}). {e}"))
                    .ok()
            })
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let admin_token = Secret::new(env::var("RPG_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ RPG_ADMIN_TOKEN is not set. All calls to the admin endpoints will be refused.");
            String::default()
        }));
        let currency = non_empty(env::var("RPG_CURRENCY").ok()).map(|s| s.to_ascii_uppercase()).unwrap_or_else(|| {
            info!("🪛️ RPG_CURRENCY is not set. Orders will be charged in {DEFAULT_CURRENCY}.");
            DEFAULT_CURRENCY.to_string()
        });
        let pricing = PricingConfig::from_env_or_default();
        let webhook = WebhookConfig::from_env_or_default();
        let mercadopago = MercadoPagoConfig::new_from_env_or_default();
        let checkout = CheckoutConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            admin_token,
            currency,
            pricing,
            webhook,
            mercadopago,
            checkout,
        }
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
impl Default for WebhookConfig {
    fn default() -> Self {
        Self { secret: Secret::default(), strict: false, tolerance: DEFAULT_WEBHOOK_TOLERANCE }
    }
}

impl WebhookConfig {
    pub fn new(secret: &str, strict: bool, tolerance: Duration) -> Self {
        Self { secret: Secret::new(secret.to_string()), strict, tolerance }
    }

    pub fn from_env_or_default() -> Self {
        let secret = Secret::new(env::var("RPG_MERCADOPAGO_WEBHOOK_SECRET").ok().unwrap_or_default());
        let strict = parse_boolean_flag(env::var("RPG_MERCADOPAGO_WEBHOOK_STRICT").ok(), false);
        match (secret.is_empty(), strict) {
            (true, true) => error!(
                "🪛️ RPG_MERCADOPAGO_WEBHOOK_SECRET is not set and strict mode is on. Every Mercado Pago notification \
                 will be refused."
            ),
            (true, false) => warn!(
                "🚨️ RPG_MERCADOPAGO_WEBHOOK_SECRET is not set. Mercado Pago notifications will NOT be authenticated. \
                 Do not run a production instance like this."
            ),
            _ => info!("🪛️ Mercado Pago notifications will be authenticated"),
        }
        let tolerance = configure_webhook_tolerance();
        Self { secret, strict, tolerance }
    }
}

fn configure_webhook_tolerance() -> Duration {
    let value = env::var("RPG_MERCADOPAGO_WEBHOOK_TOLERANCE_SECONDS").ok();
    if value.is_none() {
        debug!(
            "🪛️ RPG_MERCADOPAGO_WEBHOOK_TOLERANCE_SECONDS is not set. Using the default value of {} s.",
            DEFAULT_WEBHOOK_TOLERANCE.as_secs()
        );
    }
    value.map(|s| parse_webhook_tolerance(&s)).unwrap_or(DEFAULT_WEBHOOK_TOLERANCE)
}

/// Reads a positive number of seconds. Anything else falls back to the default tolerance.
fn parse_webhook_tolerance(s: &str) -> Duration {
    s.trim()
        .parse::<f64>()
        .map_err(|e| e.to_string())
        .and_then(|secs| {
            if secs > 0.0 {
                Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
            } else {
                Err("The tolerance must be positive".to_string())
            }
        })
        .unwrap_or_else(|e| {
            warn!(
                "🪛️ Invalid value for RPG_MERCADOPAGO_WEBHOOK_TOLERANCE_SECONDS ({s}). {e}. Using the default value of \
                 {} s.",
                DEFAULT_WEBHOOK_TOLERANCE.as_secs()
            );
            DEFAULT_WEBHOOK_TOLERANCE
        })
}

//-------------------------------------------------  CheckoutConfig  ---------------------------------------------------
impl CheckoutConfig {
    pub fn from_env_or_default() -> Self {
        let public_base_url = non_empty(env::var("RPG_PUBLIC_BASE_URL").ok())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                warn!(
                    "🪛️ RPG_PUBLIC_BASE_URL is not set. Mercado Pago will be told to send notifications to \
                     {DEFAULT_PUBLIC_BASE_URL}, which it cannot reach."
                );
                DEFAULT_PUBLIC_BASE_URL.to_string()
            });
        let back_urls = BackUrls {
            success: non_empty(env::var("RPG_MERCADOPAGO_SUCCESS_URL").ok()),
            pending: non_empty(env::var("RPG_MERCADOPAGO_PENDING_URL").ok()),
            failure: non_empty(env::var("RPG_MERCADOPAGO_FAILURE_URL").ok()),
        };
        if back_urls.is_empty() {
            info!("🪛️ No Mercado Pago return urls are set. Buyers will stay on the checkout page after paying.");
        }
        Self { public_base_url, back_urls }
    }

    /// The url Mercado Pago posts payment notifications to.
    pub fn notification_url(&self) -> String {
        format!("{}{WEBHOOK_PATH}", self.public_base_url)
    }
}
