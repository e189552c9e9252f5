//! Shared harness: spins the service bundle up against a throwaway
//! SQLite database file.

use chrono::Utc;
use presshouse_api::{
    config::AppConfig,
    db,
    entities::customer,
    entities::order,
    services::orders::CreateOrderRequest,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    _db_dir: TempDir,
}

impl TestApp {
    /// Fresh database, migrated schema, wired services.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = db_dir.path().join("presshouse_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut cfg = AppConfig::new(url, "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("connect to test database");
        db::run_migrations(&pool).await.expect("run migrations");

        let state = AppState::build(Arc::new(pool), cfg, None);
        Self {
            state,
            _db_dir: db_dir,
        }
    }

    pub async fn seed_customer(&self) -> customer::Model {
        let now = Utc::now();
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Customer".to_string()),
            phone: Set(Some("555-0100".to_string())),
            city: Set("Riverton".to_string()),
            is_deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert customer")
    }

    /// Registers an order through the real intake path (crates included).
    pub async fn seed_order(
        &self,
        customer_id: Uuid,
        weight_kg: Decimal,
        crate_count: i32,
    ) -> order::Model {
        self.state
            .services
            .orders
            .create_order(CreateOrderRequest {
                customer_id,
                weight_kg,
                crate_count,
                total_amount: Decimal::ZERO,
                declared_pouch_count: None,
                declared_box_count: None,
                notes: None,
            })
            .await
            .expect("create order")
    }
}
