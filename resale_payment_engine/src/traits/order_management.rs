use crate::{
    db_types::{Order, OrderId, OrderItem, Payment, PaymentProvider},
    traits::PaymentGatewayError,
};

/// Queries for orders and the payments made against them.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// The item lines of the order, in the order they were added.
    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentGatewayError>;

    async fn fetch_payment_by_external_id(
        &self,
        provider: PaymentProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, PaymentGatewayError>;
}
