use thiserror::Error;

use crate::traits::{CheckoutPreference, CreatedPreference, DirectPaymentRequest, GatewayPayment};

/// The outbound interface to the payment processor.
///
/// Implementations must bound every call with a finite timeout. The engine never holds a lock or an open
/// transaction while one of these calls is in flight.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a hosted checkout session for the given line items.
    async fn create_preference(&self, preference: CheckoutPreference) -> Result<CreatedPreference, GatewayError>;

    /// Charges the buyer directly, with card or pix details collected by the storefront.
    async fn create_payment(&self, request: DirectPaymentRequest) -> Result<GatewayPayment, GatewayError>;

    /// Fetches the authoritative state of a payment.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway does not know about {0}")]
    NotFound(String),
    #[error("The payment gateway could not be reached or failed. {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway response could not be understood. {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether the caller's delivery layer should try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::InvalidResponse(_))
    }
}
