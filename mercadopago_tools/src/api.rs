use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::MercadoPagoConfig,
    data_objects::{PaymentDetail, PaymentRequest, PreferenceRequest, PreferenceResponse},
    MercadoPagoApiError,
};

const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

#[derive(Clone)]
pub struct MercadoPagoApi {
    config: MercadoPagoConfig,
    client: Arc<Client>,
}

impl MercadoPagoApi {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, MercadoPagoApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.access_token.reveal());
        let mut val =
            HeaderValue::from_str(bearer.as_str()).map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        headers: &[(&'static str, String)],
        body: Option<B>,
    ) -> Result<T, MercadoPagoApiError> {
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        for (name, value) in headers {
            req = req.header(*name, value.as_str());
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MercadoPagoApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MercadoPagoApiError::RestResponseError(e.to_string()))?;
            Err(MercadoPagoApiError::QueryError { status, message })
        }
    }

    fn parse_url(&self, path: &str) -> Result<Url, MercadoPagoApiError> {
        Url::parse(&self.url(path)).map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))
    }

    /// Creates a checkout preference. The buyer completes the payment on the gateway's hosted page.
    pub async fn create_preference(
        &self,
        preference: &PreferenceRequest,
    ) -> Result<PreferenceResponse, MercadoPagoApiError> {
        let url = self.parse_url("/checkout/preferences")?;
        debug!("💳️ Creating preference for order {}", preference.external_reference);
        let raw = self.rest_query::<Value, &PreferenceRequest>(Method::POST, url, &[], Some(preference)).await?;
        let result = PreferenceResponse::from_json(raw)?;
        info!("💳️ Preference {} created for order {}", result.id, preference.external_reference);
        Ok(result)
    }

    /// Creates a payment directly (checkout bricks / transparent checkout).
    ///
    /// The gateway deduplicates requests carrying the same idempotency key. If none is supplied, a fresh one is
    /// generated, so retrying this call is only safe when the caller passes its own key.
    pub async fn create_payment(
        &self,
        payment: &PaymentRequest,
        idempotency_key: Option<String>,
    ) -> Result<PaymentDetail, MercadoPagoApiError> {
        let url = self.parse_url("/v1/payments")?;
        let key = idempotency_key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!("💳️ Creating payment of {} for order {}", payment.transaction_amount, payment.external_reference);
        let headers = [(IDEMPOTENCY_HEADER, key)];
        let raw = self.rest_query::<Value, &PaymentRequest>(Method::POST, url, &headers, Some(payment)).await?;
        let result = PaymentDetail::from_json(raw)?;
        info!(
            "💳️ Payment {} created for order {} with status {}",
            result.id,
            payment.external_reference,
            result.status.as_deref().unwrap_or("unknown")
        );
        Ok(result)
    }

    /// Fetches the authoritative state of a payment.
    pub async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, MercadoPagoApiError> {
        let mut url = self.parse_url("/v1/payments")?;
        // push() percent-encodes, so a hostile id cannot escape the payments resource
        url.path_segments_mut()
            .map_err(|_| MercadoPagoApiError::Initialization("API url cannot be a base".into()))?
            .push(payment_id);
        debug!("💳️ Fetching payment {payment_id}");
        let raw = self.rest_query::<Value, ()>(Method::GET, url, &[], None).await?;
        let result = PaymentDetail::from_json(raw)?;
        trace!("💳️ Payment {payment_id} has status {}", result.status.as_deref().unwrap_or("unknown"));
        Ok(result)
    }
}
