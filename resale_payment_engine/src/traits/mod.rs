//! # Backend contracts
//!
//! The engine is written against these traits. Storage backends implement the database traits, and the payment
//! gateway integration implements [`PaymentGateway`].
//!
//! * [`PaymentGatewayDatabase`] is the write side: storing orders and reconciling payments atomically.
//! * [`OrderManagement`] provides read access to orders, their lines, and their payments.
//! * [`CatalogLookup`] resolves products from the local catalog and listings from the upstream retailer.
//! * [`PaymentGateway`] is the outbound interface to the payment processor.
mod catalog;
mod data_objects;
mod order_management;
mod payment_gateway;
mod payment_gateway_database;

pub use catalog::CatalogLookup;
pub use data_objects::{
    CheckoutPreference,
    CreatedPreference,
    DirectPaymentRequest,
    GatewayPayment,
    PaymentReconciliation,
    PreferenceLine,
};
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayError, PaymentGateway};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
