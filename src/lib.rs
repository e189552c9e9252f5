//! Presshouse fulfillment core
//!
//! Tracks the physical units of work in a juice-processing facility
//! (crates, boxes, pallets, shelves) from customer intake to pickup, with
//! capacity-safe assignment under row locks and production-day reporting.
//! HTTP, auth and rendering live in collaborating services that call into
//! this crate.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod idempotency;
pub mod ids;
pub mod logging;
pub mod migrator;
pub mod production_day;
pub mod services;

use crate::idempotency::{IdempotencyStore, InMemoryIdempotencyStore};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

/// The bundle of core services a collaborator wires against.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<services::orders::OrderService>,
    pub crates: Arc<services::crates::CrateService>,
    pub boxes: Arc<services::boxes::BoxMaterializer>,
    pub assignment: Arc<services::assignment::AssignmentService>,
    pub analytics: Arc<services::analytics::AnalyticsService>,
}

/// Application state shared across calling layers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: AppServices,
}

impl AppState {
    /// Wires the service bundle from a connected pool and configuration.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let idempotency: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let services = AppServices {
            orders: Arc::new(services::orders::OrderService::new(
                db.clone(),
                event_sender.clone(),
                idempotency,
                Duration::from_secs(config.idempotency_ttl_secs),
            )),
            crates: Arc::new(services::crates::CrateService::new(db.clone())),
            boxes: Arc::new(services::boxes::BoxMaterializer::new(
                db.clone(),
                config.processing.clone(),
                event_sender.clone(),
            )),
            assignment: Arc::new(services::assignment::AssignmentService::new(
                db.clone(),
                event_sender.clone(),
            )),
            analytics: Arc::new(services::analytics::AnalyticsService::new(
                db.clone(),
                config.processing.clone(),
            )),
        };
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
