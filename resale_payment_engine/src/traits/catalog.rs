use crate::{
    db_types::{CatalogProduct, UpstreamListing},
    traits::PaymentGatewayError,
};

/// Read-only access to the two product catalogs. Both are populated by other services.
#[allow(async_fn_in_trait)]
pub trait CatalogLookup {
    /// Fetches a product from the local catalog, priced in the local currency.
    async fn fetch_product(&self, product_id: &str) -> Result<Option<CatalogProduct>, PaymentGatewayError>;

    /// Fetches a listing from the upstream retailer's catalog by its goods number.
    async fn fetch_upstream_listing(&self, goods_no: &str) -> Result<Option<UpstreamListing>, PaymentGatewayError>;
}
