use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    db_types::{CustomerInfo, Order, OrderId, OrderItem},
    tpe_api::errors::OrderFlowError,
    traits::PaymentReconciliation,
};

//--------------------------------------    Internal orders    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalOrderLine {
    pub product_id: String,
    pub quantity: i64,
}

/// An order for products in the local catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalOrderRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub items: Vec<InternalOrderLine>,
}

impl InternalOrderRequest {
    pub fn validate(&self) -> Result<(), OrderFlowError> {
        validate_lines(self.items.iter().map(|i| (i.product_id.as_str(), i.quantity)))
    }
}

//--------------------------------------    Upstream orders    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamOrderLine {
    pub goods_no: String,
    pub quantity: i64,
    #[serde(default)]
    pub variation_id: Option<String>,
}

/// An order for products sourced from the upstream retailer, with the buyer's contact and delivery details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamOrderRequest {
    pub items: Vec<UpstreamOrderLine>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_document: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip_code: String,
}

impl UpstreamOrderRequest {
    pub fn validate(&self) -> Result<(), OrderFlowError> {
        validate_lines(self.items.iter().map(|i| (i.goods_no.as_str(), i.quantity)))?;
        let required = [
            ("customer_name", &self.customer_name),
            ("customer_email", &self.customer_email),
            ("customer_phone", &self.customer_phone),
            ("shipping_address", &self.shipping_address),
            ("shipping_city", &self.shipping_city),
            ("shipping_state", &self.shipping_state),
            ("shipping_zip_code", &self.shipping_zip_code),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(OrderFlowError::Validation(format!("{field} is required")));
        }
        let email = self.customer_email.trim();
        match email.split_once('@') {
            Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(OrderFlowError::Validation(format!("{email} is not a valid email address"))),
        }
    }

    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.customer_name.trim().to_string(),
            email: self.customer_email.trim().to_string(),
            phone: Some(self.customer_phone.trim().to_string()),
            document: self.customer_document.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            shipping_address: self.shipping_address.trim().to_string(),
            shipping_city: self.shipping_city.trim().to_string(),
            shipping_state: self.shipping_state.trim().to_string(),
            shipping_zip_code: self.shipping_zip_code.trim().to_string(),
        }
    }
}

/// The largest quantity accepted on a single order line
pub const MAX_LINE_QUANTITY: i64 = 999;

fn validate_lines<'a>(lines: impl ExactSizeIterator<Item = (&'a str, i64)>) -> Result<(), OrderFlowError> {
    if lines.len() == 0 {
        return Err(OrderFlowError::Validation("An order needs at least one item".into()));
    }
    for (product, quantity) in lines {
        if product.trim().is_empty() {
            return Err(OrderFlowError::Validation("Every item needs a product reference".into()));
        }
        if quantity < 1 {
            return Err(OrderFlowError::Validation(format!("Quantity for {product} must be at least 1")));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(OrderFlowError::Validation(format!(
                "Quantity for {product} must be at most {MAX_LINE_QUANTITY}"
            )));
        }
    }
    Ok(())
}

//--------------------------------------    OrderWithItems     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

//--------------------------------------    Direct payments    ---------------------------------------------------------
/// A request to charge the buyer directly for an order, with payment details collected by the storefront.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectPaymentInput {
    pub order_id: OrderId,
    pub payment_method_id: Option<String>,
    pub installments: Option<u32>,
    pub passthrough: Map<String, Value>,
    pub idempotency_key: Option<String>,
}

//--------------------------------------  NotificationOutcome  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    /// The notification did not refer to anything we track. The reason is for logging only.
    Ignored(String),
    Processed(PaymentReconciliation),
}

impl NotificationOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, NotificationOutcome::Ignored(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn upstream() -> UpstreamOrderRequest {
        UpstreamOrderRequest {
            items: vec![UpstreamOrderLine { goods_no: "1001".into(), quantity: 1, variation_id: None }],
            customer_name: "Ana".into(),
            customer_email: "ana@example.com".into(),
            customer_phone: "+55 11 99999-0000".into(),
            customer_document: Some("  ".into()),
            shipping_address: "Rua A, 1".into(),
            shipping_city: "São Paulo".into(),
            shipping_state: "SP".into(),
            shipping_zip_code: "01000-000".into(),
        }
    }

    #[test]
    fn upstream_validation() {
        assert!(upstream().validate().is_ok());
        let mut req = upstream();
        req.customer_email = "not-an-email".into();
        assert!(matches!(req.validate(), Err(OrderFlowError::Validation(_))));
        let mut req = upstream();
        req.shipping_city = " ".into();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("shipping_city"));
        let mut req = upstream();
        req.items[0].quantity = 0;
        assert!(req.validate().is_err());
        let mut req = upstream();
        req.items.clear();
        assert!(req.validate().is_err());
        let mut req = upstream();
        req.items[0].quantity = MAX_LINE_QUANTITY;
        assert!(req.validate().is_ok());
        req.items[0].quantity = i64::MAX;
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("at most 999"), "{err}");
    }

    #[test]
    fn blank_document_is_dropped() {
        let customer = upstream().customer();
        assert_eq!(customer.document, None);
        assert_eq!(customer.phone.as_deref(), Some("+55 11 99999-0000"));
    }

    #[test]
    fn internal_order_deserializes_without_user() {
        let req: InternalOrderRequest =
            serde_json::from_str(r#"{"items":[{"product_id":"p1","quantity":2}]}"#).unwrap();
        assert_eq!(req.user_id, None);
        assert!(req.validate().is_ok());
        let req = InternalOrderRequest { user_id: None, items: vec![] };
        assert!(req.validate().is_err());
    }
}
