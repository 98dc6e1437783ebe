//! # Resale payment engine public API
//!
//! * [`order_flow_api`] creates orders from the local catalog and from upstream listings, reconciles payment
//!   notifications into payment records and order status, and handles administrative status changes.
//! * [`checkout_api`] talks to the payment gateway on behalf of an order: hosted checkout preferences and direct
//!   payments.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits, plus a payment
//! gateway for the checkout API.
//!
//! ```rust,ignore
//! use resale_payment_engine::{CheckoutApi, OrderFlowApi, PriceQuoteEngine, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let flow = OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL");
//! let checkout = CheckoutApi::new(flow.clone(), my_gateway);
//! let outcome = checkout.process_payment_notification("123456").await?;
//! ```
pub mod checkout_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
