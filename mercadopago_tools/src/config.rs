use std::time::Duration;

use log::*;
use rpg_common::Secret;

pub const DEFAULT_API_URL: &str = "https://api.mercadopago.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// Base url of the REST API, without a trailing slash
    pub api_url: String,
    pub access_token: Secret<String>,
    /// Upper bound for every outbound request, connection set-up included
    pub timeout: Duration,
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_API_URL.to_string(), access_token: Secret::default(), timeout: DEFAULT_TIMEOUT }
    }
}

impl MercadoPagoConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("RPG_MERCADOPAGO_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let access_token = Secret::new(std::env::var("RPG_MERCADOPAGO_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("RPG_MERCADOPAGO_ACCESS_TOKEN not set. Every call to Mercado Pago will be rejected.");
            String::default()
        }));
        let timeout = std::env::var("RPG_MERCADOPAGO_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| {
                s.trim()
                    .parse::<u64>()
                    .map_err(|e| warn!("Invalid RPG_MERCADOPAGO_TIMEOUT_SECONDS ({s}): {e}. Using the default."))
                    .ok()
            })
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { api_url, access_token, timeout }
    }
}
