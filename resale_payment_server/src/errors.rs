use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use resale_payment_engine::{traits::PaymentGatewayError, OrderFlowError, PricingError};
use thiserror::Error;

use crate::signature::SignatureError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("The payment gateway request failed. {0}")]
    UpstreamGatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid webhook signature. {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("No admin token was provided.")]
    MissingAdminToken,
    #[error("The admin token is not valid.")]
    InvalidAdminToken,
    #[error("Admin access is disabled on this server.")]
    AdminAccessDisabled,
}

impl From<SignatureError> for ServerError {
    fn from(e: SignatureError) -> Self {
        Self::AuthenticationError(AuthError::InvalidSignature(e))
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Validation(_) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::OrderNotFound(_) | OrderFlowError::ProductNotFound(_) | OrderFlowError::ListingNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            OrderFlowError::ForbiddenTransition { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::Gateway(e) => Self::UpstreamGatewayError(e.to_string()),
            OrderFlowError::Database(e) => e.into(),
            OrderFlowError::Pricing(e @ PricingError::TotalOverflow(_)) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::Pricing(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(_) | PaymentGatewayError::OrderIdNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentGatewayError::OrderModificationConflict(_) => Self::Conflict(e.to_string()),
            PaymentGatewayError::InvalidOrder(_) => Self::InvalidRequestBody(e.to_string()),
            PaymentGatewayError::DatabaseError(_) | PaymentGatewayError::PayloadError(_) => {
                error!("💻️ Storage failure. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

#[cfg(test)]
mod test {
    use resale_payment_engine::{
        db_types::{OrderId, OrderStatusType},
        traits::GatewayError,
    };

    use super::*;

    #[test]
    fn status_codes() {
        let code = |e: OrderFlowError| ServerError::from(e).status_code();
        assert_eq!(code(OrderFlowError::Validation("no items".into())), StatusCode::BAD_REQUEST);
        assert_eq!(code(OrderFlowError::OrderNotFound(OrderId("x".into()))), StatusCode::NOT_FOUND);
        assert_eq!(code(OrderFlowError::ListingNotFound("1001".into())), StatusCode::NOT_FOUND);
        assert_eq!(code(GatewayError::Unavailable("timeout".into()).into()), StatusCode::BAD_GATEWAY);
        assert_eq!(
            code(GatewayError::Rejected { status: 400, message: "bad card".into() }.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            code(PaymentGatewayError::DatabaseError("disk full".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            code(OrderFlowError::ForbiddenTransition {
                order_id: OrderId("x".into()),
                from: OrderStatusType::Delivered,
                to: OrderStatusType::Paid
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(ServerError::from(SignatureError::Mismatch).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            code(OrderFlowError::Pricing(PricingError::TotalOverflow("order x".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            code(PaymentGatewayError::InvalidOrder("too large".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
