//! The Mercado Pago implementation of the engine's [`PaymentGateway`] contract.
use log::*;
use mercadopago_tools::{
    data_objects::{BackUrls, PaymentDetail, PaymentRequest, PreferenceItem, PreferenceRequest},
    MercadoPagoApi,
    MercadoPagoApiError,
    MercadoPagoConfig,
};
use resale_payment_engine::traits::{
    CheckoutPreference,
    CreatedPreference,
    DirectPaymentRequest,
    GatewayError,
    GatewayPayment,
    PaymentGateway,
};

use crate::{config::CheckoutConfig, errors::ServerError};

#[derive(Clone)]
pub struct MercadoPagoGateway {
    api: MercadoPagoApi,
    notification_url: String,
    back_urls: BackUrls,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig, checkout: &CheckoutConfig) -> Result<Self, ServerError> {
        let api = MercadoPagoApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let notification_url = checkout.notification_url();
        info!("💳️ Mercado Pago will send payment notifications to {notification_url}");
        Ok(Self { api, notification_url, back_urls: checkout.back_urls.clone() })
    }
}

impl PaymentGateway for MercadoPagoGateway {
    async fn create_preference(&self, preference: CheckoutPreference) -> Result<CreatedPreference, GatewayError> {
        let currency = preference.currency.clone();
        let items = preference
            .items
            .into_iter()
            .map(|line| PreferenceItem {
                id: line.id,
                title: line.title,
                quantity: line.quantity,
                unit_price: line.unit_price.to_decimal(),
                currency_id: currency.clone(),
            })
            .collect();
        let request = PreferenceRequest::new(
            items,
            preference.external_reference.as_str().to_string(),
            self.notification_url.clone(),
            self.back_urls.clone(),
        );
        let response = self.api.create_preference(&request).await.map_err(gateway_error)?;
        Ok(CreatedPreference {
            id: response.id,
            init_point: response.init_point,
            sandbox_init_point: response.sandbox_init_point,
            raw: response.raw,
        })
    }

    async fn create_payment(&self, request: DirectPaymentRequest) -> Result<GatewayPayment, GatewayError> {
        let payment = PaymentRequest::new(request.amount.to_decimal(), request.external_reference.as_str().to_string())
            .with_payment_method(request.payment_method_id, request.installments)
            .with_passthrough(request.passthrough);
        let detail = self.api.create_payment(&payment, request.idempotency_key).await.map_err(gateway_error)?;
        Ok(gateway_payment(detail))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        match self.api.get_payment(payment_id).await {
            Ok(detail) => Ok(gateway_payment(detail)),
            Err(e) if e.is_not_found() => Err(GatewayError::NotFound(payment_id.to_string())),
            Err(e) => Err(gateway_error(e)),
        }
    }
}

fn gateway_payment(detail: PaymentDetail) -> GatewayPayment {
    GatewayPayment {
        id: detail.id,
        status: detail.status.unwrap_or_default(),
        amount: detail.transaction_amount,
        payment_method_id: detail.payment_method_id,
        external_reference: detail.external_reference,
        raw: detail.raw,
    }
}

fn gateway_error(e: MercadoPagoApiError) -> GatewayError {
    if e.is_transient() {
        return GatewayError::Unavailable(e.to_string());
    }
    match e {
        MercadoPagoApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
        MercadoPagoApiError::JsonError(msg) => GatewayError::InvalidResponse(msg),
        e => GatewayError::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_mapping() {
        let e = gateway_error(MercadoPagoApiError::QueryError { status: 503, message: "busy".into() });
        assert!(matches!(e, GatewayError::Unavailable(_)));
        let e = gateway_error(MercadoPagoApiError::QueryError { status: 400, message: "bad token".into() });
        assert!(matches!(e, GatewayError::Rejected { status: 400, .. }));
        let e = gateway_error(MercadoPagoApiError::JsonError("eof".into()));
        assert!(matches!(e, GatewayError::InvalidResponse(_)));
        let e = gateway_error(MercadoPagoApiError::RestRequestError("timed out".into()));
        assert!(e.is_retryable());
    }

    #[test]
    fn payment_conversion() {
        let raw = json!({"id": 42, "status": "approved", "transaction_amount": 99.99, "external_reference": "o-1"});
        let detail = PaymentDetail::from_json(raw.clone()).unwrap();
        let payment = gateway_payment(detail);
        assert_eq!(payment.id, "42");
        assert_eq!(payment.status, "approved");
        assert_eq!(payment.amount, Some(99.99));
        assert_eq!(payment.external_reference.as_deref(), Some("o-1"));
        assert_eq!(payment.raw, raw);
    }
}
