use std::path::Path;

use log::*;
use rpg_common::Cents;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/rpg_test_store_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Adds a product to the local catalog.
pub async fn seed_product(db: &SqliteDatabase, id: &str, title: &str, price: Cents) {
    sqlx::query("INSERT INTO products (id, title, price_cents) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(title)
        .bind(price.value())
        .execute(db.pool())
        .await
        .expect("Error seeding product");
}

/// Adds a listing to the upstream catalog. The price is stored as text, exactly as given.
pub async fn seed_listing(db: &SqliteDatabase, goods_no: &str, name: &str, price: &str) {
    sqlx::query("INSERT INTO upstream_listings (goods_no, name, price_amount, currency) VALUES ($1, $2, $3, 'USD')")
        .bind(goods_no)
        .bind(name)
        .bind(price)
        .execute(db.pool())
        .await
        .expect("Error seeding upstream listing");
}
