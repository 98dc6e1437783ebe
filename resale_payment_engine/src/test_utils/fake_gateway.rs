use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

use crate::traits::{
    CheckoutPreference,
    CreatedPreference,
    DirectPaymentRequest,
    GatewayError,
    GatewayPayment,
    PaymentGateway,
};

/// An in-memory payment gateway. Payments are registered with [`FakeGateway::set_payment`] and served back by
/// `fetch_payment`. Every request made through the trait is recorded.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<FakeGatewayState>>,
}

#[derive(Debug, Default)]
struct FakeGatewayState {
    payments: HashMap<String, GatewayPayment>,
    preferences: Vec<CheckoutPreference>,
    payment_requests: Vec<DirectPaymentRequest>,
    fetches: usize,
    failure: Option<GatewayError>,
    next_payment_status: Option<String>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the gateway's view of a payment.
    pub fn set_payment(&self, id: &str, status: &str, amount: Option<f64>, external_reference: Option<&str>) {
        let payment = GatewayPayment {
            id: id.to_string(),
            status: status.to_string(),
            amount,
            payment_method_id: Some("visa".into()),
            external_reference: external_reference.map(String::from),
            raw: json!({ "id": id, "status": status, "transaction_amount": amount, "external_reference": external_reference }),
        };
        self.state().payments.insert(id.to_string(), payment);
    }

    /// Every call fails with the given error until it is cleared with `None`.
    pub fn set_failure(&self, failure: Option<GatewayError>) {
        self.state().failure = failure;
    }

    /// The status that direct payments are created with. Defaults to `approved`.
    pub fn set_next_payment_status(&self, status: &str) {
        self.state().next_payment_status = Some(status.to_string());
    }

    pub fn preferences(&self) -> Vec<CheckoutPreference> {
        self.state().preferences.clone()
    }

    pub fn payment_requests(&self) -> Vec<DirectPaymentRequest> {
        self.state().payment_requests.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeGatewayState> {
        self.inner.lock().expect("fake gateway lock poisoned")
    }

    fn check_failure(&self) -> Result<(), GatewayError> {
        match self.state().failure.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_preference(&self, preference: CheckoutPreference) -> Result<CreatedPreference, GatewayError> {
        self.check_failure()?;
        let mut state = self.state();
        let id = format!("pref-{}", state.preferences.len() + 1);
        let raw = json!({
            "id": id,
            "external_reference": preference.external_reference.as_str(),
            "init_point": format!("https://checkout.example.com/{id}"),
        });
        state.preferences.push(preference);
        Ok(CreatedPreference {
            id: id.clone(),
            init_point: Some(format!("https://checkout.example.com/{id}")),
            sandbox_init_point: None,
            raw,
        })
    }

    async fn create_payment(&self, request: DirectPaymentRequest) -> Result<GatewayPayment, GatewayError> {
        self.check_failure()?;
        let mut state = self.state();
        let id = format!("{}", 9000 + state.payment_requests.len() + 1);
        let status = state.next_payment_status.clone().unwrap_or_else(|| "approved".into());
        let amount = request.amount.to_decimal().to_f64();
        let payment = GatewayPayment {
            id: id.clone(),
            status: status.clone(),
            amount,
            payment_method_id: request.payment_method_id.clone(),
            external_reference: Some(request.external_reference.as_str().to_string()),
            raw: json!({ "id": id, "status": status, "transaction_amount": amount }),
        };
        state.payment_requests.push(request);
        state.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.check_failure()?;
        let mut state = self.state();
        state.fetches += 1;
        state.payments.get(payment_id).cloned().ok_or_else(|| GatewayError::NotFound(payment_id.to_string()))
    }
}

