use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    pricing::PricingError,
    traits::{GatewayError, PaymentGatewayError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    Database(#[from] PaymentGatewayError),
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error("Upstream listing not found: {0}")]
    ListingNotFound(String),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    ForbiddenTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Pricing error. {0}")]
    Pricing(#[from] PricingError),
}
