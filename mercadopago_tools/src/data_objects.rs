use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    helpers::{optional_string_or_number, string_or_number},
    MercadoPagoApiError,
};

/// Fields of a direct-payment request that are always computed by the caller and are never taken from the client
/// supplied passthrough body. `currency_id` is not accepted by the payments API at all.
const RESERVED_PAYMENT_FIELDS: [&str; 7] = [
    "currency_id",
    "order_id",
    "orderId",
    "transaction_amount",
    "external_reference",
    "payment_method_id",
    "installments",
];

//--------------------------------------     Preferences      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl BackUrls {
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.pending.is_none() && self.failure.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub external_reference: String,
    pub notification_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_urls: Option<BackUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
}

impl PreferenceRequest {
    /// Builds a preference request. Empty back urls are left out entirely, and the buyer is only redirected
    /// automatically when there is somewhere to send them after an approved payment.
    pub fn new(items: Vec<PreferenceItem>, external_reference: String, notification_url: String, urls: BackUrls) -> Self {
        let auto_return = urls.success.as_ref().map(|_| "approved".to_string());
        let back_urls = (!urls.is_empty()).then_some(urls);
        Self { items, external_reference, notification_url, back_urls, auto_return }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub init_point: Option<String>,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
    /// The full response, as received
    #[serde(skip)]
    pub raw: Value,
}

impl PreferenceResponse {
    pub fn from_json(raw: Value) -> Result<Self, MercadoPagoApiError> {
        let mut result: Self =
            serde_json::from_value(raw.clone()).map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))?;
        result.raw = raw;
        Ok(result)
    }
}

//--------------------------------------       Payments       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_amount: Decimal,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    /// Card token, payer details and anything else the checkout brick collected
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl PaymentRequest {
    pub fn new(transaction_amount: Decimal, external_reference: String) -> Self {
        Self {
            transaction_amount,
            external_reference,
            payment_method_id: None,
            installments: None,
            passthrough: Map::new(),
        }
    }

    pub fn with_payment_method(mut self, payment_method_id: Option<String>, installments: Option<u32>) -> Self {
        self.payment_method_id = payment_method_id;
        self.installments = installments;
        self
    }

    /// Attaches the client-supplied fields, dropping any that collide with the computed ones.
    pub fn with_passthrough(mut self, mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_PAYMENT_FIELDS {
            fields.remove(key);
        }
        self.passthrough = fields;
        self
    }
}

/// The subset of a Mercado Pago payment resource that reconciliation relies on. Everything else is kept verbatim
/// in `raw`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentDetail {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
    #[serde(default)]
    pub currency_id: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub installments: Option<u32>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub external_reference: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl PaymentDetail {
    pub fn from_json(raw: Value) -> Result<Self, MercadoPagoApiError> {
        let mut result: Self =
            serde_json::from_value(raw.clone()).map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))?;
        result.raw = raw;
        Ok(result)
    }
}
