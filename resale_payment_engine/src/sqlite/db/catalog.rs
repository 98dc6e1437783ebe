use sqlx::SqliteConnection;

use crate::db_types::{CatalogProduct, UpstreamListing};

pub async fn fetch_product(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<CatalogProduct>, sqlx::Error> {
    let product = sqlx::query_as("SELECT id, title, price_cents FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_upstream_listing(
    goods_no: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UpstreamListing>, sqlx::Error> {
    let listing =
        sqlx::query_as("SELECT goods_no, name, price_amount, currency FROM upstream_listings WHERE goods_no = $1")
            .bind(goods_no.trim())
            .fetch_optional(conn)
            .await?;
    Ok(listing)
}
