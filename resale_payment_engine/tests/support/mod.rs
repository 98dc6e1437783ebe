use resale_payment_engine::{
    db_types::Cents,
    order_objects::{InternalOrderLine, InternalOrderRequest, OrderWithItems, UpstreamOrderLine, UpstreamOrderRequest},
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_listing, seed_product},
    OrderFlowApi,
    PriceQuoteEngine,
    SqliteDatabase,
};

pub async fn setup() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_product(&db, "p1", "Photocard binder", Cents::from(1999)).await;
    seed_product(&db, "p2", "Sticker pack", Cents::from(500)).await;
    seed_listing(&db, "1001", "Album (standard)", "10").await;
    seed_listing(&db, "1002", "Lightstick", "25.50").await;
    seed_listing(&db, "1003", "Mystery item", "n/a").await;
    OrderFlowApi::new(db, PriceQuoteEngine::default(), "BRL")
}

pub fn upstream_request(lines: &[(&str, i64)]) -> UpstreamOrderRequest {
    UpstreamOrderRequest {
        items: lines
            .iter()
            .map(|(goods_no, quantity)| UpstreamOrderLine {
                goods_no: goods_no.to_string(),
                quantity: *quantity,
                variation_id: None,
            })
            .collect(),
        customer_name: "Ana Souza".into(),
        customer_email: "ana@example.com".into(),
        customer_phone: "+55 11 99999-0000".into(),
        customer_document: None,
        shipping_address: "Rua das Flores, 10".into(),
        shipping_city: "São Paulo".into(),
        shipping_state: "SP".into(),
        shipping_zip_code: "01000-000".into(),
    }
}

pub fn internal_request(user_id: Option<&str>, lines: &[(&str, i64)]) -> InternalOrderRequest {
    InternalOrderRequest {
        user_id: user_id.map(String::from),
        items: lines
            .iter()
            .map(|(product_id, quantity)| InternalOrderLine { product_id: product_id.to_string(), quantity: *quantity })
            .collect(),
    }
}

/// An upstream order for two units of a 10 USD album, listed at 94.99 each.
pub async fn album_order(api: &OrderFlowApi<SqliteDatabase>) -> OrderWithItems {
    api.create_upstream_order(upstream_request(&[("1001", 2)])).await.expect("Error creating order")
}
