use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentProvider},
    traits::PaymentGatewayError,
};

/// Inserts the payment, or updates the existing row for the same `(provider, external_id)` in place.
///
/// The row is linked to the order with the payment's public order id. If there is no such order, nothing is written
/// and `None` is returned. The insert and the order lookup are a single statement, so a concurrent duplicate can never
/// slip in between them. `updated_at` is only touched when the status, amount or snapshot actually changed.
///
/// A `PENDING` snapshot never replaces a payment that has already settled. Gateway snapshots can arrive out of order,
/// and a payment does not return to pending once it is approved, cancelled or failed. The settled row is returned
/// unchanged in that case.
pub async fn upsert_payment(
    payment: &NewPayment,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PaymentGatewayError> {
    let raw_payload =
        serde_json::to_string(&payment.raw_payload).map_err(|e| PaymentGatewayError::PayloadError(e.to_string()))?;
    trace!("💰️ Upserting payment {}:{} for order {}", payment.provider, payment.external_id, payment.order_id);
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, provider, status, amount_cents, external_id, raw_payload)
            SELECT id, $1, $2, $3, $4, $5 FROM orders WHERE order_id = $6
            ON CONFLICT (provider, external_id) DO UPDATE SET
                status = excluded.status,
                amount_cents = excluded.amount_cents,
                raw_payload = excluded.raw_payload,
                updated_at = CASE
                    WHEN payments.status IS NOT excluded.status
                        OR payments.amount_cents IS NOT excluded.amount_cents
                        OR payments.raw_payload IS NOT excluded.raw_payload
                    THEN CURRENT_TIMESTAMP
                    ELSE payments.updated_at
                END
            WHERE NOT (excluded.status = 'PENDING' AND payments.status <> 'PENDING')
            RETURNING *;
        "#,
    )
    .bind(payment.provider.to_string())
    .bind(payment.status.to_string())
    .bind(payment.amount.value())
    .bind(payment.external_id.as_str())
    .bind(raw_payload)
    .bind(payment.order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    if result.is_some() {
        return Ok(result);
    }
    // Either there is no order, or the update was refused because the stored payment has settled
    let existing = fetch_payment_by_external_id(payment.provider, payment.external_id.as_str(), conn).await?;
    if let Some(settled) = &existing {
        debug!(
            "💰️ Payment {}:{} is already {}. The {} snapshot is out of date and was not stored.",
            payment.provider, payment.external_id, settled.status, payment.status
        );
    }
    Ok(existing)
}

pub async fn fetch_payment_by_external_id(
    provider: PaymentProvider,
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE provider = $1 AND external_id = $2")
        .bind(provider.to_string())
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// All payments made against the order, oldest first.
pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as(
        r#"
            SELECT payments.* FROM payments
            JOIN orders ON orders.id = payments.order_id
            WHERE orders.order_id = $1
            ORDER BY payments.id ASC
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(payments)
}
