//! # Resale payment server
//! This crate hosts the HTTP server for the resale payment gateway. It is responsible for:
//! * Taking orders for products from the local catalog and from the upstream retailer.
//! * Creating checkout preferences and direct payments at Mercado Pago.
//! * Receiving payment notifications from Mercado Pago, authenticating them, and handing them to the reconciliation
//!   engine.
//! * An administrative endpoint for changing order status.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/webhooks/mercadopago`: Payment notifications from Mercado Pago (GET and POST).
//! * `/api/orders` and `/api/orders/upstream`: Order creation.
//! * `/api/payments/mercadopago/preference` and `/api/payments/mercadopago/payment`: Checkout.
//! * `/api/admin/orders/{order_id}/status`: Administrative status changes. Requires the `x-admin-token` header.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod signature;

#[cfg(test)]
mod endpoint_tests;
