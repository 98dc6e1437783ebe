use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType},
    traits::{CatalogLookup, OrderManagement, PaymentReconciliation},
};

/// This trait defines the highest level of behaviour for storage backends supporting the payment engine.
///
/// This behaviour includes:
/// * Storing new orders together with their item lines
/// * Reconciling payment observations into payment records and order status, atomically
/// * Guarded order status updates
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement + CatalogLookup {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the order and all of its lines in a single atomic transaction. The order total is taken from
    /// [`NewOrder::total_price`].
    ///
    /// Returns the stored order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// In a single atomic transaction:
    /// * Upserts the payment on `(provider, external_id)`. An existing row is updated in place, and its `updated_at`
    ///   only changes if one of its values did.
    /// * Applies the order status implied by the payment status, if the order status rules permit it.
    ///
    /// If no order matches the payment's order id, nothing is written and `None` is returned.
    async fn reconcile_payment(&self, payment: NewPayment) -> Result<Option<PaymentReconciliation>, PaymentGatewayError>;

    /// Sets the order status to `new_status`, provided that it is still `expected`. Guards against concurrent
    /// modifications between reading the order and writing the new status.
    ///
    /// Fails with [`PaymentGatewayError::OrderModificationConflict`] if the status changed in the meantime.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("Order {0} was modified by someone else. Reload it and try again.")]
    OrderModificationConflict(OrderId),
    #[error("Could not store the payment snapshot. {0}")]
    PayloadError(String),
    #[error("The order cannot be stored. {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
