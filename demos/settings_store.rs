//! Per-user settings on a singleton repository.
//!
//! Shows migrations, default-on-absence reads, a model hook that
//! validates before every write and a YAML-configured connection.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=sqlrepo_sqlite=trace cargo run -p sqlrepo-demos --example settings_store
//! ```

use sqlrepo_core::{Column, Record};
use sqlrepo_sqlite::{
    BeforePut, ConnectionConfig, HookResult, Hooks, Migration, RepoConfig, SingletonRepo,
    Transaction, migrate, open,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Settings {
    owner: String,
    theme: String,
    font_size: i64,
    beta: bool,
}

impl Record for Settings {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("owner", |s: &Settings| &s.owner, |s: &mut Settings| &mut s.owner),
            Column::new("theme", |s: &Settings| &s.theme, |s: &mut Settings| &mut s.theme),
            Column::new(
                "font_size",
                |s: &Settings| &s.font_size,
                |s: &mut Settings| &mut s.font_size,
            ),
            Column::new("beta", |s: &Settings| &s.beta, |s: &mut Settings| &mut s.beta),
        ]
    }
}

impl BeforePut for Settings {
    fn before_put(&mut self, _tx: &Transaction<'_, Self>) -> HookResult {
        if !(8..=48).contains(&self.font_size) {
            return Err(format!("font size {} out of range", self.font_size).into());
        }
        if self.theme.is_empty() {
            self.theme = "light".to_string();
        }
        Ok(())
    }
}

fn migrations() -> Vec<Migration> {
    vec![
        Migration::sql(
            "CREATE TABLE settings (
                owner TEXT PRIMARY KEY,
                theme TEXT NOT NULL,
                font_size INTEGER NOT NULL
            )",
        ),
        Migration::sql("ALTER TABLE settings ADD COLUMN beta INTEGER NOT NULL DEFAULT 0"),
    ]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    // === Step 1: Open a database from YAML configuration ===
    let dir = std::env::temp_dir().join("sqlrepo_settings_demo");
    let yaml = format!("path: {}\nsynchronous: full\n", dir.join("settings.db").display());
    let config = ConnectionConfig::from_yaml_str(&yaml).unwrap();
    let conn = open(&config).unwrap();

    // === Step 2: Bring the schema up to date ===
    let report = migrate(&conn, &migrations()).unwrap();
    println!(
        "schema: v{} -> v{} ({} applied)",
        report.from, report.to, report.applied
    );

    // === Step 3: Read and write settings ===
    let repo = SingletonRepo::new(
        &conn,
        RepoConfig::<Settings>::new("settings", "owner")
            .with_hooks(Hooks::new().with_model_before_put()),
    )
    .unwrap();

    let mut ada = repo.get("ada").unwrap();
    println!("ada before first save: {ada:?}");

    ada.font_size = 14;
    repo.put(&mut ada).unwrap();
    println!("ada after save: {:?}", repo.get("ada").unwrap());

    ada.font_size = 200;
    match repo.put(&mut ada) {
        Ok(()) => println!("unexpected: oversized font accepted"),
        Err(err) => println!("rejected: {err}"),
    }

    println!("stored owners: {}", repo.list().unwrap().len());

    // Cleanup
    drop(repo);
    drop(conn);
    std::fs::remove_dir_all(&dir).ok();
}
