mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::MercadoPagoApi;
pub use config::MercadoPagoConfig;
pub use error::MercadoPagoApiError;
