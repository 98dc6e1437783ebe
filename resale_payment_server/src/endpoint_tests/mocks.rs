use mockall::mock;
use resale_payment_engine::{
    db_types::{
        CatalogProduct,
        NewOrder,
        NewPayment,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        Payment,
        PaymentProvider,
        UpstreamListing,
    },
    traits::{CatalogLookup, OrderManagement, PaymentGatewayDatabase, PaymentGatewayError, PaymentReconciliation},
};

mock! {
    pub Backend {}
    impl Clone for Backend {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for Backend {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentGatewayError>;
        async fn fetch_payment_by_external_id(&self, provider: PaymentProvider, external_id: &str) -> Result<Option<Payment>, PaymentGatewayError>;
    }
    impl CatalogLookup for Backend {
        async fn fetch_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, PaymentGatewayError>;
        async fn fetch_upstream_listing(&self, goods_no: &str) -> Result<Option<UpstreamListing>, PaymentGatewayError>;
    }
    impl PaymentGatewayDatabase for Backend {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;
        async fn reconcile_payment(&self, payment: NewPayment) -> Result<Option<PaymentReconciliation>, PaymentGatewayError>;
        async fn update_order_status(&self, order_id: &OrderId, expected: OrderStatusType, new_status: OrderStatusType) -> Result<Order, PaymentGatewayError>;
    }
}
