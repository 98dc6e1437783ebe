use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts a new order, and all its lines, using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The stored total is the sum of the line totals.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let customer = order.customer.clone().unwrap_or_default();
    let has_customer = order.customer.is_some();
    let text = |s: String| has_customer.then_some(s);
    let total = order.total_price().map_err(|e| PaymentGatewayError::InvalidOrder(e.to_string()))?;
    let stored: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                source,
                user_id,
                total_cents,
                currency,
                customer_name,
                customer_email,
                customer_phone,
                customer_document,
                shipping_address,
                shipping_city,
                shipping_state,
                shipping_zip_code
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.source.to_string())
    .bind(order.user_id.as_deref())
    .bind(total.value())
    .bind(order.currency.as_str())
    .bind(text(customer.name))
    .bind(text(customer.email))
    .bind(customer.phone)
    .bind(customer.document)
    .bind(text(customer.shipping_address))
    .bind(text(customer.shipping_city))
    .bind(text(customer.shipping_state))
    .bind(text(customer.shipping_zip_code))
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        insert_order_item(stored.id, item, conn).await?;
    }
    debug!("📝️ Order [{}] inserted with id {} and {} lines", stored.order_id, stored.id, order.items.len());
    Ok(stored)
}

async fn insert_order_item(
    order_row_id: i64,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, PaymentGatewayError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (
                order_id,
                product_ref,
                title,
                quantity,
                unit_price,
                source_price,
                unit_subtotal,
                source_currency,
                variation_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order_row_id)
    .bind(item.product_ref.as_str())
    .bind(item.title.as_str())
    .bind(item.quantity)
    .bind(item.unit_price.value())
    .bind(item.source_price.map(|p| p.to_string()))
    .bind(item.unit_subtotal.map(|p| p.to_string()))
    .bind(item.source_currency.as_deref())
    .bind(item.variation_id.as_deref())
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Returns the order with the given public `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as(
        r#"
            SELECT order_items.* FROM order_items
            JOIN orders ON orders.id = order_items.order_id
            WHERE orders.order_id = $1
            ORDER BY order_items.id ASC
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Sets the status of the order with row id `id`. If the order already has this status, nothing is written and
/// `None` is returned, so that `updated_at` only moves on real changes.
pub(crate) async fn update_order_status(
    id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    trace!("📝️ Setting status of order #{id} to {status}");
    let result = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status <> $1 RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Sets the status of the order to `new_status`, but only if it is currently `expected`.
pub(crate) async fn compare_and_set_status(
    order_id: &OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 RETURNING *",
    )
    .bind(new_status.to_string())
    .bind(order_id.as_str())
    .bind(expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}
