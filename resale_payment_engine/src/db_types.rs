use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use rpg_common::Cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::pricing::PricingError;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The public identifier of an order. It is handed to the payment gateway as the external reference, so every
/// gateway resource can be traced back to exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------      OrderSource      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    /// Ordered from the local catalog, priced in the local currency
    Internal,
    /// Sourced from the foreign retailer and priced through the pricing engine
    Upstream,
}

impl Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSource::Internal => write!(f, "internal"),
            OrderSource::Upstream => write!(f, "upstream"),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment state of an order. Allowed transitions live in [`crate::state_machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order exists, but no payment has been captured.
    Created,
    /// The gateway has approved a payment for the order.
    Paid,
    /// The goods have been ordered from the upstream retailer.
    KtownOrdered,
    /// The upstream retailer has confirmed the order.
    KtownConfirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Created => "created",
            OrderStatusType::Paid => "paid",
            OrderStatusType::KtownOrdered => "ktown_ordered",
            OrderStatusType::KtownConfirmed => "ktown_confirmed",
            OrderStatusType::Shipped => "shipped",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    /// Case-insensitive. Unknown values are an error, never a silent fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            "ktown_ordered" => Ok(Self::KtownOrdered),
            "ktown_confirmed" => Ok(Self::KtownConfirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Cancelled,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Approved => write!(f, "APPROVED"),
            PaymentStatus::Cancelled => write!(f, "CANCELLED"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

//--------------------------------------   PaymentProvider     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentProvider {
    #[sqlx(rename = "MERCADOPAGO")]
    #[serde(rename = "MERCADOPAGO")]
    MercadoPago,
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::MercadoPago => write!(f, "MERCADOPAGO"),
        }
    }
}

//--------------------------------------     CustomerInfo      ---------------------------------------------------------
/// Contact and delivery details collected for upstream orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip_code: String,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    /// Catalog product id, or the upstream goods number
    pub product_ref: String,
    pub title: String,
    pub quantity: i64,
    /// Price per unit at the time of ordering, in the order's currency
    pub unit_price: Cents,
    /// Upstream cost per unit in the source currency, for upstream lines
    pub source_price: Option<Decimal>,
    /// Unit subtotal before fees and rounding, for upstream lines
    pub unit_subtotal: Option<Decimal>,
    pub source_currency: Option<String>,
    pub variation_id: Option<String>,
}

impl NewOrderItem {
    /// `None` if the total does not fit.
    pub fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub source: OrderSource,
    pub user_id: Option<String>,
    pub currency: String,
    pub customer: Option<CustomerInfo>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(source: OrderSource, currency: String, items: Vec<NewOrderItem>) -> Self {
        Self { order_id: OrderId::random(), source, user_id: None, currency, customer: None, items }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_customer(mut self, customer: CustomerInfo) -> Self {
        self.customer = Some(customer);
        self
    }

    /// The order total is fixed here, once, as the sum of the line totals.
    pub fn total_price(&self) -> Result<Cents, PricingError> {
        self.items
            .iter()
            .try_fold(Cents::default(), |total, item| item.line_total().and_then(|t| total.checked_add(t)))
            .ok_or_else(|| PricingError::TotalOverflow(format!("order {}", self.order_id)))
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub source: OrderSource,
    pub user_id: Option<String>,
    pub total_cents: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_document: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_zip_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    /// Row id of the owning order
    pub order_id: i64,
    pub product_ref: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub source_price: Option<String>,
    pub unit_subtotal: Option<String>,
    pub source_currency: Option<String>,
    pub variation_id: Option<String>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    /// Row id of the owning order
    pub order_id: i64,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub amount_cents: Cents,
    pub external_id: Option<String>,
    /// The last gateway response for this payment, as JSON text
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payment observation to be upserted on `(provider, external_id)` and linked to the order with the given public id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub amount: Cents,
    pub external_id: String,
    pub raw_payload: Value,
}

//--------------------------------------        Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub title: String,
    pub price_cents: Cents,
}

/// A product listed by the upstream retailer. The price is kept as the decimal text received from the retailer.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UpstreamListing {
    pub goods_no: String,
    pub name: String,
    pub price_amount: String,
    pub currency: String,
}
