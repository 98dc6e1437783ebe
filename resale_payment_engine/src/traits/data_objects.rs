use rpg_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    db_types::{Order, OrderId, OrderStatusType, Payment},
    pricing::PricingError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceLine {
    pub id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

/// A hosted checkout session to be created at the gateway for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutPreference {
    pub external_reference: OrderId,
    pub currency: String,
    pub items: Vec<PreferenceLine>,
}

impl CheckoutPreference {
    pub fn total(&self) -> Result<Cents, PricingError> {
        self.items
            .iter()
            .try_fold(Cents::default(), |total, i| i.unit_price.checked_mul(i.quantity).and_then(|t| total.checked_add(t)))
            .ok_or_else(|| PricingError::TotalOverflow(format!("the preference for {}", self.external_reference)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedPreference {
    pub id: String,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
    /// The gateway's response, verbatim
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectPaymentRequest {
    pub external_reference: OrderId,
    pub amount: Cents,
    pub payment_method_id: Option<String>,
    pub installments: Option<u32>,
    /// Card token, payer and other fields collected by the storefront, forwarded untouched
    pub passthrough: Map<String, Value>,
    pub idempotency_key: Option<String>,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    /// The gateway's own status string, e.g. `approved` or `in_process`
    pub status: String,
    /// Amount in major units, as reported
    pub amount: Option<f64>,
    pub payment_method_id: Option<String>,
    pub external_reference: Option<String>,
    /// The gateway's response, verbatim
    pub raw: Value,
}

/// The result of reconciling one payment observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReconciliation {
    pub payment: Payment,
    pub order: Order,
    pub previous_status: OrderStatusType,
}

impl PaymentReconciliation {
    pub fn status_changed(&self) -> bool {
        self.order.status != self.previous_status
    }
}
