use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewPayment, OrderId, OrderItem, PaymentProvider, PaymentStatus},
    pricing::{parse_decimal, ChargeLine, PaymentMethodClass},
    tpe_api::{
        errors::OrderFlowError,
        order_flow_api::OrderFlowApi,
        order_objects::{DirectPaymentInput, NotificationOutcome, OrderWithItems},
    },
    traits::{
        CheckoutPreference,
        CreatedPreference,
        DirectPaymentRequest,
        GatewayPayment,
        PaymentGateway,
        PaymentGatewayDatabase,
        PreferenceLine,
    },
};

/// `CheckoutApi` connects orders to the payment gateway: hosted checkout sessions, direct payments, and the
/// notifications that follow them.
#[derive(Clone)]
pub struct CheckoutApi<B, G> {
    flow: OrderFlowApi<B>,
    gateway: G,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({:?})", self.flow)
    }
}

impl<B, G> CheckoutApi<B, G> {
    pub fn new(flow: OrderFlowApi<B>, gateway: G) -> Self {
        Self { flow, gateway }
    }

    pub fn flow(&self) -> &OrderFlowApi<B> {
        &self.flow
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    /// Creates a hosted checkout session for the order at the gateway.
    ///
    /// The line items are the unit prices recorded on the order, so they always add up to the order total. If a
    /// `user_id` is given and the order belongs to someone else, the order is reported as not found.
    ///
    /// A pending payment keyed on the preference id is recorded straight away.
    pub async fn create_preference(
        &self,
        order_id: &OrderId,
        user_id: Option<&str>,
    ) -> Result<CreatedPreference, OrderFlowError> {
        let order = self.flow.fetch_order(order_id).await?;
        if let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
            if order.order.user_id.as_deref() != Some(user_id) {
                debug!("💳️ User {user_id} asked for a preference for order {order_id}, which is not theirs");
                return Err(OrderFlowError::OrderNotFound(order_id.clone()));
            }
        }
        let items = order
            .items
            .iter()
            .map(|item| PreferenceLine {
                id: item.product_ref.clone(),
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect::<Vec<_>>();
        let preference =
            CheckoutPreference { external_reference: order_id.clone(), currency: order.order.currency.clone(), items };
        let lines_total = preference.total()?;
        if lines_total != order.order.total_cents {
            warn!(
                "💳️ The lines of order {order_id} add up to {lines_total}, but the order total is {}",
                order.order.total_cents
            );
        }
        let created = self.gateway.create_preference(preference).await?;
        info!("💳️ Preference {} created for order {order_id}", created.id);
        let pending = NewPayment {
            order_id: order_id.clone(),
            provider: PaymentProvider::MercadoPago,
            status: PaymentStatus::Pending,
            amount: order.order.total_cents,
            external_id: created.id.clone(),
            raw_payload: created.raw.clone(),
        };
        self.flow.record_payment(pending).await?;
        Ok(created)
    }

    /// Charges the buyer directly for an order.
    ///
    /// The amount is derived from the recorded order lines and the payment method: installment payments pay the
    /// total, single payments pay the price quoted for their method (see
    /// [`crate::pricing::PriceQuoteEngine::transaction_amount`]). The gateway's response is reconciled like any
    /// notification, so a webhook racing this response ends up on the same payment record.
    pub async fn create_direct_payment(&self, input: DirectPaymentInput) -> Result<GatewayPayment, OrderFlowError> {
        let OrderWithItems { order, items } = self.flow.fetch_order(&input.order_id).await?;
        let method = PaymentMethodClass::classify(input.payment_method_id.as_deref(), input.installments);
        let lines = items.iter().map(charge_line).collect::<Vec<_>>();
        let amount = self.flow.pricing().transaction_amount(&lines, method)?;
        debug!("💳️ Charging {amount} for order {} ({method:?}, total {})", order.order_id, order.total_cents);
        let request = DirectPaymentRequest {
            external_reference: order.order_id.clone(),
            amount,
            payment_method_id: input.payment_method_id,
            installments: input.installments,
            passthrough: input.passthrough,
            idempotency_key: input.idempotency_key,
        };
        let mut payment = self.gateway.create_payment(request).await?;
        info!("💳️ Payment {} for order {} is {}", payment.id, order.order_id, payment.status);
        if payment.external_reference.is_none() {
            payment.external_reference = Some(order.order_id.as_str().to_string());
        }
        if let NotificationOutcome::Ignored(reason) = self.flow.reconcile_gateway_payment(payment.clone()).await? {
            warn!("💳️ Payment {} could not be recorded: {reason}", payment.id);
        }
        Ok(payment)
    }

    /// See [`OrderFlowApi::process_payment_notification`].
    pub async fn process_payment_notification(&self, payment_id: &str) -> Result<NotificationOutcome, OrderFlowError> {
        self.flow.process_payment_notification(&self.gateway, payment_id).await
    }
}

fn charge_line(item: &OrderItem) -> ChargeLine {
    let unit_subtotal = item.unit_subtotal.as_deref().and_then(|raw| {
        let subtotal = parse_decimal(raw);
        if subtotal.is_none() {
            warn!("💳️ Order line {} has an unreadable subtotal '{raw}'. Charging it as a catalog line.", item.id);
        }
        subtotal
    });
    ChargeLine { quantity: item.quantity, unit_price: item.unit_price, unit_subtotal }
}
