//! Resale Payment Engine
//!
//! The resale payment engine prices goods sourced from a foreign retailer for domestic buyers, and keeps orders in
//! step with the payment gateway that collects the money. This library contains the core logic. It is independent of
//! any web framework.
//!
//! The library is divided into these sections:
//! 1. Pricing ([`mod@pricing`]). Pure functions turning an upstream cost into the amount charged to the buyer.
//! 2. Order status rules ([`mod@state_machine`]). The order status transition table, and how payment status maps onto
//!    it.
//! 3. Storage. The traits in [`mod@traits`] define what a backend must provide. [`SqliteDatabase`] is the SQLite
//!    implementation. The data types used in the database are defined in [`mod@db_types`] and are public.
//! 4. The public API ([`OrderFlowApi`] and [`CheckoutApi`]). Order creation, checkout, and reconciliation of gateway
//!    notifications.
pub mod db_types;
pub mod helpers;
pub mod pricing;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;
mod tpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use pricing::{ChargeLine, PaymentMethodClass, PriceQuote, PriceQuoteEngine, PricingConfig, PricingError};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use tpe_api::{checkout_api::CheckoutApi, errors::OrderFlowError, order_flow_api::OrderFlowApi, order_objects};
pub use traits::{CatalogLookup, OrderManagement, PaymentGateway, PaymentGatewayDatabase};
