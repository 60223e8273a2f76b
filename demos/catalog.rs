//! Product catalog on a generic repository.
//!
//! Shows batch puts in one transaction, a global hook writing an audit
//! trail, slot-aligned batch reads and a reusable existence check.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p sqlrepo-demos --example catalog
//! ```

use sqlrepo_core::{Column, Record, Value};
use sqlrepo_sqlite::{
    GenericRepo, Hooks, Migration, RepoConfig, Transaction, migrate, named, open_in_memory,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct Product {
    sku: String,
    name: String,
    price_cents: i64,
    discontinued: Option<String>,
}

impl Record for Product {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("sku", |p: &Product| &p.sku, |p: &mut Product| &mut p.sku),
            Column::new("name", |p: &Product| &p.name, |p: &mut Product| &mut p.name),
            Column::new(
                "price_cents",
                |p: &Product| &p.price_cents,
                |p: &mut Product| &mut p.price_cents,
            ),
            Column::new(
                "discontinued",
                |p: &Product| &p.discontinued,
                |p: &mut Product| &mut p.discontinued,
            ),
        ]
    }
}

fn product(sku: &str, name: &str, price_cents: i64) -> Product {
    Product {
        sku: sku.to_string(),
        name: name.to_string(),
        price_cents,
        discontinued: None,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let conn = open_in_memory().unwrap();
    migrate(
        &conn,
        &[Migration::sql(
            "CREATE TABLE products (
                sku TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                price_cents INTEGER NOT NULL,
                discontinued TEXT
            );
            CREATE TABLE price_log (sku TEXT NOT NULL, price_cents INTEGER NOT NULL);",
        )],
    )
    .unwrap();

    let hooks = Hooks::new().before_put(|p: &mut Product, tx: &Transaction<'_, Product>| {
        tx.exec(
            "INSERT INTO price_log (sku, price_cents) VALUES (?1, ?2)",
            &[Value::from(p.sku.as_str()), Value::Integer(p.price_cents)],
        )?;
        Ok(())
    });
    let repo = GenericRepo::new(&conn, RepoConfig::new("products", "sku").with_hooks(hooks)).unwrap();

    // === Batch insert in one transaction ===
    let mut tx = repo.begin_tx().unwrap();
    for mut p in [
        product("A-100", "Anvil", 4999),
        product("B-200", "Bellows", 2500),
        product("C-300", "Chisel", 899),
    ] {
        tx.put(&mut p).unwrap();
    }
    tx.commit().unwrap();
    info!(count = repo.count().unwrap(), "catalog loaded");

    // === Batch read ===
    let (found, missing) = repo.get_multi(&["C-300", "Z-999", "A-100"]).unwrap();
    for (slot, p) in found.iter().enumerate() {
        match p {
            Some(p) => println!("slot {slot}: {} at {} cents", p.name, p.price_cents),
            None => println!("slot {slot}: not in catalog"),
        }
    }
    if let Some(missing) = missing {
        println!("batch read: {missing}");
    }

    // === Reusable existence check ===
    let mut in_catalog = repo.exists_query();
    for sku in ["B-200", "Q-000"] {
        let present = in_catalog.bind([named("sku", sku)]).query_value().unwrap();
        println!("{sku} in catalog: {present}");
    }

    // === Ad hoc queries ===
    let cheap = repo
        .query_list(
            "SELECT * FROM products
             WHERE price_cents < ?1
             ORDER BY price_cents",
            &[Value::Integer(3000)],
        )
        .unwrap();
    println!("under $30: {:?}", cheap.iter().map(|p| &p.name).collect::<Vec<_>>());

    let result = repo
        .exec(
            "UPDATE products SET discontinued = ?1 WHERE sku = ?2",
            &[Value::from("2024-06-01"), Value::from("B-200")],
        )
        .unwrap();
    println!("discontinued {} product(s)", result.rows_affected);

    repo.delete_key("B-200").unwrap();
    repo.delete_key("B-200").unwrap();
    let log_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM price_log", [], |row| row.get(0))
        .unwrap();
    println!("{} products left, {log_rows} price log rows", repo.count().unwrap());
}
