use mercadopago_tools::helpers::value_to_id;
use resale_payment_engine::{
    db_types::{OrderId, OrderStatusType},
    order_objects::DirectPaymentInput,
    traits::CreatedPreference,
};
use rpg_common::helpers::non_empty;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ServerError;

//--------------------------------------        Webhooks         -------------------------------------------------------
/// The query string of a Mercado Pago notification. Newer notifications use `type` and `data.id`, the older IPN
/// style uses `topic` and `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookQuery {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

/// What a notification refers to, after combining the query string and the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookNotification {
    /// The resource id that the signature covers
    pub signature_id: Option<String>,
    pub topic: Option<String>,
    /// The payment to fetch from the gateway
    pub payment_id: Option<String>,
}

impl WebhookNotification {
    pub fn from_query(query: &WebhookQuery) -> Self {
        let id = non_empty(query.id.clone());
        let data_id = non_empty(query.data_id.clone());
        Self {
            signature_id: data_id.clone().or_else(|| id.clone()),
            topic: non_empty(query.topic.clone()).or_else(|| non_empty(query.kind.clone())),
            payment_id: id.or(data_id),
        }
    }

    /// Query parameters take precedence over the body, except for the topic, where an explicit `topic` parameter
    /// wins, then the body's `type` and `topic`.
    pub fn from_post(query: &WebhookQuery, body: Option<&Value>) -> Self {
        let field = |path: &[&str]| {
            let mut value = body?;
            for key in path {
                value = value.get(*key)?;
            }
            value_to_id(value)
        };
        let id = non_empty(query.id.clone());
        let data_id = non_empty(query.data_id.clone());
        let body_data_id = field(&["data", "id"]);
        Self {
            signature_id: data_id.or_else(|| body_data_id.clone()).or_else(|| id.clone()),
            topic: non_empty(query.topic.clone()).or_else(|| field(&["type"])).or_else(|| field(&["topic"])),
            payment_id: id.or(body_data_id).or_else(|| field(&["resource"])).or_else(|| field(&["id"])),
        }
    }

    /// The id of the payment to reconcile, if this is a payment notification.
    pub fn payment_id(&self) -> Option<&str> {
        match self.topic.as_deref() {
            Some("payment") => self.payment_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
}

impl WebhookResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }

    pub fn ignored() -> Self {
        Self { status: "ignored".into() }
    }
}

//--------------------------------------         Orders          -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamOrderResult {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateParams {
    pub status: String,
    #[serde(default)]
    pub force: bool,
}

impl StatusUpdateParams {
    pub fn status(&self) -> Result<OrderStatusType, ServerError> {
        self.status.parse::<OrderStatusType>().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
    }
}

//--------------------------------------        Checkout         -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceParams {
    pub order_id: OrderId,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceResult {
    pub preference_id: String,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
}

impl From<CreatedPreference> for PreferenceResult {
    fn from(p: CreatedPreference) -> Self {
        Self { preference_id: p.id, init_point: p.init_point, sandbox_init_point: p.sandbox_init_point }
    }
}

/// Fields of a direct payment body that are interpreted here, and never forwarded as they are.
const DIRECT_PAYMENT_FIELDS: [&str; 7] =
    ["order_id", "orderId", "external_reference", "currency_id", "payment_method_id", "installments", "transaction_amount"];

/// Splits a direct payment body into the fields we act on and the ones that are forwarded to the gateway untouched.
///
/// The order is named by `order_id` (or `orderId`), falling back to `external_reference`. The amount is always
/// computed from the order, so a client supplied `transaction_amount` is dropped, and so is `currency_id`.
pub fn direct_payment_input(
    mut body: Map<String, Value>,
    idempotency_key: Option<String>,
) -> Result<DirectPaymentInput, ServerError> {
    let order_id = ["order_id", "orderId", "external_reference"]
        .iter()
        .find_map(|k| body.get(*k).and_then(value_to_id))
        .ok_or_else(|| ServerError::NoRecordFound("The payment does not name an order".into()))?;
    let payment_method_id = body.get("payment_method_id").and_then(value_to_id);
    let installments = match body.get("installments") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            value_to_id(v)
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| ServerError::InvalidRequestBody(format!("Invalid number of installments: {v}")))?,
        ),
    };
    for key in DIRECT_PAYMENT_FIELDS {
        body.remove(key);
    }
    Ok(DirectPaymentInput {
        order_id: OrderId::from(order_id),
        payment_method_id,
        installments,
        passthrough: body,
        idempotency_key: non_empty(idempotency_key),
    })
}
