//! Dashboard rollup tests: production-day window totals, period-over-period
//! change, and the bounded activity feed.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::TestApp;
use presshouse_api::{
    entities::order,
    production_day::Period,
    services::analytics::ActivityKind,
    services::assignment::CreateCarrierRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Inserts an order row directly so the test controls `created_at`.
#[allow(clippy::too_many_arguments)]
async fn insert_order(
    app: &TestApp,
    customer_id: Uuid,
    weight_kg: Decimal,
    declared_pouches: i32,
    actual_pouches: i32,
    created_at: DateTime<Utc>,
    is_deleted: bool,
) -> order::Model {
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        status: Set("Created".to_string()),
        weight_kg: Set(weight_kg),
        crate_count: Set(1),
        declared_pouch_count: Set(declared_pouches),
        actual_pouch_count: Set(actual_pouches),
        declared_box_count: Set(0),
        actual_box_count: Set(0),
        total_amount: Set(Decimal::ZERO),
        notes: Set(None),
        is_deleted: Set(is_deleted),
        deleted_at: Set(is_deleted.then(Utc::now)),
        ready_at: Set(None),
        created_at: Set(created_at),
        updated_at: Set(Some(created_at)),
        version: Set(1),
    }
    .insert(&*app.state.db)
    .await
    .unwrap()
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[tokio::test]
async fn daily_summary_buckets_by_production_day() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let now = at(2026, 6, 15, 12, 0);

    // Current production day: [2026-06-15 06:00, 2026-06-16 06:00).
    insert_order(&app, customer.id, dec!(30), 6, 0, at(2026, 6, 15, 10, 0), false).await;
    // Late pressing past midnight still belongs to the same shift.
    insert_order(&app, customer.id, dec!(120), 26, 30, at(2026, 6, 16, 5, 30), false).await;
    // 05:00 on the 15th is before the cutoff, so it lands in the prior day.
    insert_order(&app, customer.id, dec!(50), 0, 10, at(2026, 6, 15, 5, 0), false).await;
    // Soft-deleted intake never counts.
    insert_order(&app, customer.id, dec!(999), 99, 99, at(2026, 6, 15, 11, 0), true).await;

    let summary = app
        .state
        .services
        .analytics
        .production_summary(now, Period::Day)
        .await
        .unwrap();

    assert_eq!(summary.start, at(2026, 6, 15, 6, 0));
    assert_eq!(summary.end, at(2026, 6, 16, 6, 0));
    assert_eq!(summary.kg_processed, dec!(150));
    // Actual pouch counts win over declared once production reports them.
    assert_eq!(summary.pouches_made, 36);
    assert_eq!(summary.prior_kg_processed, dec!(50));
    assert_eq!(summary.prior_pouches_made, 10);
    assert_eq!(summary.kg_change_percent, dec!(200));
    assert_eq!(summary.pouch_change_percent, dec!(260));
}

#[tokio::test]
async fn empty_facility_reports_zeros_without_failing() {
    let app = TestApp::new().await;
    let summary = app
        .state
        .services
        .analytics
        .production_summary(at(2026, 6, 15, 12, 0), Period::Week)
        .await
        .unwrap();

    assert_eq!(summary.kg_processed, Decimal::ZERO);
    assert_eq!(summary.pouches_made, 0);
    assert_eq!(summary.kg_change_percent, Decimal::ZERO);
    assert_eq!(summary.pouch_change_percent, Decimal::ZERO);
}

#[tokio::test]
async fn weekly_window_spans_monday_to_monday() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    // 2026-06-17 is a Wednesday; the production week opened Monday 06:00.
    let now = at(2026, 6, 17, 12, 0);
    insert_order(&app, customer.id, dec!(40), 8, 0, at(2026, 6, 15, 7, 0), false).await;
    // Previous week.
    insert_order(&app, customer.id, dec!(10), 2, 0, at(2026, 6, 12, 7, 0), false).await;

    let summary = app
        .state
        .services
        .analytics
        .production_summary(now, Period::Week)
        .await
        .unwrap();

    assert_eq!(summary.start, at(2026, 6, 15, 6, 0));
    assert_eq!(summary.end, at(2026, 6, 22, 6, 0));
    assert_eq!(summary.kg_processed, dec!(40));
    assert_eq!(summary.prior_kg_processed, dec!(10));
    assert_eq!(summary.kg_change_percent, dec!(300));
}

#[tokio::test]
async fn recent_activity_is_merged_newest_first_and_bounded() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(120), 1).await;
    let boxes = services.boxes.materialize(order.id).await.unwrap();
    let pallet = services
        .assignment
        .create_pallet(CreateCarrierRequest {
            capacity: 10,
            location: "Riverton".to_string(),
        })
        .await
        .unwrap();
    services
        .assignment
        .assign_boxes_to_pallet(pallet.id, &boxes)
        .await
        .unwrap();

    let feed = services.analytics.recent_activity(50).await.unwrap();
    assert!(feed
        .iter()
        .any(|e| e.kind == ActivityKind::OrderRegistered && e.reference == order.id.to_string()));
    assert!(feed.iter().any(|e| e.kind == ActivityKind::BoxPlaced));
    assert!(feed
        .iter()
        .any(|e| e.kind == ActivityKind::PalletUpdated && e.reference == pallet.tag));
    assert!(feed
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));

    let bounded = services.analytics.recent_activity(3).await.unwrap();
    assert_eq!(bounded.len(), 3);
}
