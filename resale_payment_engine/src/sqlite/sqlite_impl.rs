//! `SqliteDatabase` is a concrete implementation of a resale payment engine backend.
//!
//! It uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{catalog, db_url, new_pool, orders, payments};
use crate::{
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
        PaymentStatus,
        UpstreamListing,
    },
    state_machine::StatusDecision,
    traits::{CatalogLookup, OrderManagement, PaymentGatewayDatabase, PaymentGatewayError, PaymentReconciliation},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let stored = orders::insert_order(&order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", stored.order_id, stored.id);
        Ok(stored)
    }

    /// Takes a payment observation, and in a single atomic transaction,
    /// * upserts the payment row, linking it to its order. If there is no such order, nothing further is done.
    /// * works out whether the payment status moves the order, and writes the new status if it does.
    async fn reconcile_payment(&self, payment: NewPayment) -> Result<Option<PaymentReconciliation>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(stored) = payments::upsert_payment(&payment, &mut tx).await? else {
            debug!("🗃️ No order {} for payment {}. Nothing was stored.", payment.order_id, payment.external_id);
            return Ok(None);
        };
        let order = orders::fetch_order_by_id(stored.order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(stored.order_id))?;
        let previous_status = order.status;
        let decision = stored.status.order_status_target().map(|target| order.status.reconcile_with(target));
        let order = match decision {
            Some(StatusDecision::Apply(new_status)) => {
                let updated = orders::update_order_status(order.id, new_status, &mut tx).await?;
                debug!("🗃️ Order {} moved from {previous_status} to {new_status}", order.order_id);
                updated.unwrap_or(order)
            },
            Some(StatusDecision::Skip) if stored.status == PaymentStatus::Approved && previous_status.is_terminal() => {
                warn!(
                    "🗃️ Payment {} was approved for order {}, which is {previous_status}. The money needs manual \
                     handling.",
                    stored.external_id.as_deref().unwrap_or_default(),
                    order.order_id
                );
                order
            },
            Some(StatusDecision::Skip) => {
                info!(
                    "🗃️ Payment {} is {}, but order {} is {previous_status}. Order status left alone.",
                    stored.external_id.as_deref().unwrap_or_default(),
                    stored.status,
                    order.order_id
                );
                order
            },
            Some(StatusDecision::Unchanged) | None => order,
        };
        tx.commit().await?;
        Ok(Some(PaymentReconciliation { payment: stored, order, previous_status }))
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::compare_and_set_status(order_id, expected, new_status, &mut tx).await?;
        let order = match updated {
            Some(order) => order,
            None => {
                let exists = orders::fetch_order_by_order_id(order_id, &mut tx).await?.is_some();
                return Err(if exists {
                    PaymentGatewayError::OrderModificationConflict(order_id.clone())
                } else {
                    PaymentGatewayError::OrderNotFound(order_id.clone())
                });
            },
        };
        tx.commit().await?;
        Ok(order)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_payment_by_external_id(
        &self,
        provider: PaymentProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_external_id(provider, external_id, &mut conn).await?;
        Ok(payment)
    }
}

impl CatalogLookup for SqliteDatabase {
    async fn fetch_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let product = catalog::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_upstream_listing(&self, goods_no: &str) -> Result<Option<UpstreamListing>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let listing = catalog::fetch_upstream_listing(goods_no, &mut conn).await?;
        Ok(listing)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `RPG_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Migrations that have already been applied are skipped.
    pub async fn run_migrations(&self) -> Result<(), PaymentGatewayError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
