use std::fmt::Debug;

use log::*;
use rpg_common::Cents;
use rust_decimal::Decimal;

use crate::{
    db_types::{
        NewOrder,
        NewOrderItem,
        NewPayment,
        Order,
        OrderId,
        OrderSource,
        OrderStatusType,
        PaymentProvider,
        PaymentStatus,
    },
    helpers::KeyedLock,
    pricing::{PaymentMethodClass, PriceQuoteEngine},
    tpe_api::{
        errors::OrderFlowError,
        order_objects::{InternalOrderRequest, NotificationOutcome, OrderWithItems, UpstreamOrderRequest},
    },
    traits::{GatewayError, GatewayPayment, PaymentGateway, PaymentGatewayDatabase, PaymentReconciliation},
};

/// `OrderFlowApi` is the primary API for handling order and payment flows: creating orders from the two catalogs,
/// and reconciling payment notifications from the gateway into payment records and order status.
///
/// Clones share the same per-payment lock table, so a single instance should be created at start-up and cloned into
/// each worker.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    pricing: PriceQuoteEngine,
    currency: String,
    locks: KeyedLock,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({})", self.currency)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, pricing: PriceQuoteEngine, currency: impl Into<String>) -> Self {
        Self { db, pricing, currency: currency.into(), locks: KeyedLock::new() }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn pricing(&self) -> &PriceQuoteEngine {
        &self.pricing
    }

    /// The currency that orders are priced and charged in
    pub fn currency(&self) -> &str {
        self.currency.as_str()
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates an order for products from the local catalog. Unit prices are taken from the catalog as they are now.
    ///
    /// Fails with [`OrderFlowError::ProductNotFound`] if any product is unknown, in which case nothing is stored.
    pub async fn create_internal_order(&self, request: InternalOrderRequest) -> Result<OrderWithItems, OrderFlowError> {
        request.validate()?;
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product_id = line.product_id.trim();
            let product = self
                .db
                .fetch_product(product_id)
                .await?
                .ok_or_else(|| OrderFlowError::ProductNotFound(product_id.to_string()))?;
            items.push(NewOrderItem {
                product_ref: product.id,
                title: product.title,
                quantity: line.quantity,
                unit_price: product.price_cents,
                source_price: None,
                unit_subtotal: None,
                source_currency: None,
                variation_id: None,
            });
        }
        let user_id = request.user_id.filter(|u| !u.trim().is_empty());
        let order = NewOrder::new(OrderSource::Internal, self.currency.clone(), items).with_user_id(user_id);
        self.store_order(order).await
    }

    /// Creates an order for products listed by the upstream retailer. Each line is priced once, here, at the
    /// multi-installment list price. The order total is never recomputed afterwards.
    ///
    /// Fails with [`OrderFlowError::ListingNotFound`] if any listing is unknown, in which case nothing is stored.
    pub async fn create_upstream_order(&self, request: UpstreamOrderRequest) -> Result<OrderWithItems, OrderFlowError> {
        request.validate()?;
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let goods_no = line.goods_no.trim();
            let listing = self
                .db
                .fetch_upstream_listing(goods_no)
                .await?
                .ok_or_else(|| OrderFlowError::ListingNotFound(goods_no.to_string()))?;
            let cost = self.pricing.parse_cost(&listing.price_amount);
            let quote = self.pricing.quote(cost, PaymentMethodClass::MultiInstallment)?;
            let unit_price = quote.total;
            trace!("🔄️📦️ {goods_no} costs {cost} {}. Listed at {unit_price}", listing.currency);
            items.push(NewOrderItem {
                product_ref: listing.goods_no,
                title: listing.name,
                quantity: line.quantity,
                unit_price,
                source_price: Some(cost),
                unit_subtotal: Some(quote.subtotal),
                source_currency: Some(listing.currency),
                variation_id: line.variation_id.clone().filter(|v| !v.trim().is_empty()),
            });
        }
        let order = NewOrder::new(OrderSource::Upstream, self.currency.clone(), items).with_customer(request.customer());
        self.store_order(order).await
    }

    async fn store_order(&self, order: NewOrder) -> Result<OrderWithItems, OrderFlowError> {
        let order_id = order.order_id.clone();
        let total = order.total_price()?;
        trace!("🔄️📦️ Storing order {order_id} with total {total}");
        let order = self.db.insert_order(order).await?;
        let items = self.db.fetch_order_items(&order_id).await?;
        info!("🔄️📦️ Order {order_id} created with {} lines. Total: {} {}", items.len(), order.total_cents, order.currency);
        Ok(OrderWithItems { order, items })
    }

    /// Fetches an order together with its lines.
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderWithItems, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Changes the status of an order on behalf of an administrator.
    ///
    /// Without `force`, only transitions in the order status table are accepted. With `force`, any status may be set.
    /// Setting an order to the status it already has is a no-op.
    ///
    /// The write only succeeds if the order still has the status it was read with. Otherwise the call fails with a
    /// modification conflict and can be retried.
    pub async fn modify_status_for_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        force: bool,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let old_status = order.status;
        if old_status == new_status {
            debug!("🔄️📦️ Order {order_id} is already {new_status}");
            return Ok(order);
        }
        if !old_status.can_transition_to(new_status) {
            if !force {
                return Err(OrderFlowError::ForbiddenTransition {
                    order_id: order_id.clone(),
                    from: old_status,
                    to: new_status,
                });
            }
            warn!("🔄️📦️ Forcing order {order_id} from {old_status} to {new_status}");
        }
        let order = self.db.update_order_status(order_id, old_status, new_status).await?;
        info!("🔄️📦️ Order {order_id} status changed from {old_status} to {new_status}");
        Ok(order)
    }

    /// Handles a verified payment notification from the gateway.
    ///
    /// The notification body is only a pointer. The authoritative payment state is fetched from the gateway before
    /// anything is locked or written. If the gateway cannot be reached, nothing is written and the error is returned
    /// so that the gateway retries the delivery later. Payments the gateway does not know about are ignored.
    pub async fn process_payment_notification<G: PaymentGateway>(
        &self,
        gateway: &G,
        payment_id: &str,
    ) -> Result<NotificationOutcome, OrderFlowError> {
        let payment = match gateway.fetch_payment(payment_id).await {
            Ok(p) => p,
            Err(GatewayError::NotFound(id)) => {
                info!("🔄️💰️ The gateway does not know payment {id}. Ignoring the notification.");
                return Ok(NotificationOutcome::Ignored(format!("unknown payment {id}")));
            },
            Err(e) => {
                warn!("🔄️💰️ Could not fetch payment {payment_id} from the gateway. {e}");
                return Err(e.into());
            },
        };
        self.reconcile_gateway_payment(payment).await
    }

    /// Reconciles the gateway's view of a payment into our records.
    ///
    /// The payment is upserted on its gateway id and linked to the order named in its external reference. The order
    /// status then follows the payment status, within the reconciliation rules of
    /// [`OrderStatusType::reconcile_with`]. Running this again with the same payment changes nothing.
    ///
    /// Reconciliations for the same payment are serialized.
    pub async fn reconcile_gateway_payment(&self, payment: GatewayPayment) -> Result<NotificationOutcome, OrderFlowError> {
        let Some(order_id) = payment.external_reference.as_deref().map(str::trim).filter(|r| !r.is_empty()) else {
            info!("🔄️💰️ Payment {} has no external reference. Ignoring it.", payment.id);
            return Ok(NotificationOutcome::Ignored(format!("payment {} has no external reference", payment.id)));
        };
        let order_id = OrderId::from(order_id.to_string());
        let key = format!("{}:{}", PaymentProvider::MercadoPago, payment.id);
        let _guard = self.locks.lock(&key).await;
        let Some(order) = self.db.fetch_order_by_order_id(&order_id).await? else {
            info!("🔄️💰️ Payment {} refers to order {order_id}, which does not exist. Ignoring it.", payment.id);
            return Ok(NotificationOutcome::Ignored(format!("order {order_id} does not exist")));
        };
        let status = PaymentStatus::from_gateway_status(&payment.status);
        let amount = payment_amount(payment.amount).unwrap_or_else(|| {
            warn!(
                "🔄️💰️ Payment {} has no usable amount ({:?}). Using the order total of {} instead.",
                payment.id, payment.amount, order.total_cents
            );
            order.total_cents
        });
        let new_payment = NewPayment {
            order_id,
            provider: PaymentProvider::MercadoPago,
            status,
            amount,
            external_id: payment.id.clone(),
            raw_payload: payment.raw,
        };
        let outcome = match self.db.reconcile_payment(new_payment).await? {
            Some(result) => {
                log_reconciliation(&result);
                NotificationOutcome::Processed(result)
            },
            None => NotificationOutcome::Ignored(format!("order {} does not exist", order.order_id)),
        };
        Ok(outcome)
    }

    /// Records a payment we initiated ourselves (for example a checkout preference) against an order. The same
    /// reconciliation path is used as for notifications, so that any later notification for the same gateway id
    /// updates this record in place.
    pub async fn record_payment(&self, payment: NewPayment) -> Result<Option<PaymentReconciliation>, OrderFlowError> {
        let key = format!("{}:{}", payment.provider, payment.external_id);
        let _guard = self.locks.lock(&key).await;
        let result = self.db.reconcile_payment(payment).await?;
        if let Some(r) = &result {
            log_reconciliation(r);
        }
        Ok(result)
    }
}

fn log_reconciliation(result: &PaymentReconciliation) {
    let payment = &result.payment;
    let ext_id = payment.external_id.as_deref().unwrap_or_default();
    if result.status_changed() {
        info!(
            "🔄️💰️ Payment {ext_id} is {}. Order {} moved from {} to {}",
            payment.status, result.order.order_id, result.previous_status, result.order.status
        );
    } else {
        debug!("🔄️💰️ Payment {ext_id} is {}. Order {} stays {}", payment.status, result.order.order_id, result.order.status);
    }
}

/// Converts the gateway's amount in major units into cents. Missing or non-finite amounts give `None`.
fn payment_amount(amount: Option<f64>) -> Option<Cents> {
    let amount = amount.filter(|a| a.is_finite())?;
    let amount = Decimal::try_from(amount).ok()?;
    Cents::try_from(amount).ok()
}
