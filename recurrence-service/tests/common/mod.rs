//! Test helper module for recurrence-service integration tests.
//!
//! Spawns the full HTTP application on a random port, backed by the
//! in-memory store so tests need no external database. Store tests that do
//! need PostgreSQL use [`TestDatabase`], which reads `TEST_DATABASE_URL`.

#![allow(dead_code)]

use recurrence_service::config::{DatabaseConfig, RecurrenceConfig, StoreBackend};
use recurrence_service::models::{CreateInvoice, CreateLineItem, Invoice, InvoiceStatus, Recurrence};
use recurrence_service::recurrence::RecurrenceEngine;
use recurrence_service::services::{Database, InvoiceStore, MemoryStore};
use recurrence_service::startup::Application;
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn test_config() -> RecurrenceConfig {
    RecurrenceConfig {
        common: CoreConfig { port: 0 }, // Random port
        service_name: "recurrence-service-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: MemoryStore,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        let app = Application::build_with_store(test_config(), Arc::new(store.clone()))
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Engine over a fresh memory store, for tests that bypass HTTP.
pub fn engine() -> (RecurrenceEngine, MemoryStore) {
    let store = MemoryStore::new();
    (RecurrenceEngine::new(Arc::new(store.clone())), store)
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

/// Recurring template input with two line items totalling 1 000.00 + 20 % tax.
pub fn template_input(number: &str, recurrence: Recurrence) -> CreateInvoice {
    let issue = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    CreateInvoice {
        invoice_number: number.to_string(),
        client_id: None,
        client_name: "Maison Roux".to_string(),
        status: InvoiceStatus::Draft,
        issue_date: issue,
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
        notes: Some("Accompagnement réseaux sociaux".to_string()),
        recurrence,
        recurrence_day: Some(15),
        next_generation_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 15),
        max_occurrences: None,
        end_date: None,
        auto_send: false,
        tax_rate: dec("20"),
        line_items: vec![
            CreateLineItem {
                description: "Community management".to_string(),
                quantity: dec("1"),
                unit_price: dec("800.00"),
            },
            CreateLineItem {
                description: "Reporting".to_string(),
                quantity: dec("2"),
                unit_price: dec("100.00"),
            },
        ],
    }
}

pub async fn create_template(store: &dyn InvoiceStore, input: CreateInvoice) -> Invoice {
    store
        .create_invoice(&input)
        .await
        .expect("Failed to create template")
        .0
}

/// Generate a unique schema name for test isolation.
fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_recurrence_{}_{}", std::process::id(), counter)
}

/// Migrated PostgreSQL store in a schema of its own.
pub struct TestDatabase {
    pub db: Database,
    base_url: String,
    schema_name: String,
}

impl TestDatabase {
    /// Connect to `TEST_DATABASE_URL`, or `None` when it is not set.
    pub async fn connect() -> Option<Self> {
        let Ok(base_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL store test");
            return None;
        };
        let schema_name = unique_schema_name();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");

        pool.close().await;

        // Use ? or & depending on whether URL already has query parameters
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let db_url_with_schema = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let db = Database::new(&db_url_with_schema, 5, 1)
            .await
            .expect("Failed to create test database");
        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        Some(TestDatabase {
            db,
            base_url,
            schema_name,
        })
    }

    /// Cleanup test resources (schema).
    pub async fn cleanup(&self) {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.base_url)
            .await
            .ok();

        if let Some(pool) = pool {
            let _ = sqlx::query(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema_name
            ))
            .execute(&pool)
            .await;
            pool.close().await;
        }
    }
}
