//! Box materializer tests: weight-derived counts, idempotent creation,
//! and backward compatibility with the older box-identifier conventions.

mod common;

use chrono::Utc;
use common::TestApp;
use presshouse_api::{
    entities::box_unit::{self, Entity as BoxEntity},
    ids,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn insert_box(
    app: &TestApp,
    id: String,
    order_id: Option<Uuid>,
    customer_id: Uuid,
) -> box_unit::Model {
    let now = Utc::now();
    box_unit::ActiveModel {
        id: Set(id),
        order_id: Set(order_id),
        customer_id: Set(customer_id),
        pallet_id: Set(None),
        shelf_id: Set(None),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(&*app.state.db)
    .await
    .expect("insert box")
}

#[tokio::test]
async fn thirty_kg_order_materializes_one_box() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(30), 1).await;
    let boxes = &app.state.services.boxes;

    // floor(30 * 0.65 / 3) = 6 pouches -> ceil(6/8) = 1 box.
    assert_eq!(boxes.expected_box_count(order.id).await.unwrap(), 1);

    let ids = boxes.materialize(order.id).await.unwrap();
    assert_eq!(ids, vec![ids::encode_box_id(order.id, 1)]);

    let persisted = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.declared_box_count, 1);
    assert_eq!(persisted.declared_pouch_count, 6);
    assert_eq!(persisted.actual_box_count, 1);
}

#[tokio::test]
async fn materialize_is_idempotent() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(120), 2).await;
    let boxes = &app.state.services.boxes;

    let first = boxes.materialize(order.id).await.unwrap();
    let second = boxes.materialize(order.id).await.unwrap();
    assert_eq!(first, second);

    let rows = BoxEntity::find()
        .filter(box_unit::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), first.len());
}

#[tokio::test]
async fn declared_count_overrides_weight_estimate() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(30), 1).await;

    app.state
        .services
        .orders
        .update_order_info(
            order.id,
            presshouse_api::services::orders::UpdateOrderInfoRequest {
                declared_box_count: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The persisted override wins over the 1-box weight estimate.
    assert_eq!(
        app.state
            .services
            .boxes
            .expected_box_count(order.id)
            .await
            .unwrap(),
        5
    );
    let ids = app.state.services.boxes.materialize(order.id).await.unwrap();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn legacy_unsuffixed_box_counts_as_one() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(30), 1).await;

    // A single-box order recorded before sequence suffixes existed:
    // no order_id column, unsuffixed label.
    insert_box(
        &app,
        format!("BOX_{}", order.id),
        None,
        customer.id,
    )
    .await;

    let count =
        presshouse_api::services::boxes::BoxMaterializer::count_existing(&*app.state.db, &order)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn customer_linked_boxes_are_the_last_resort() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(30), 1).await;

    // Boxes with free-form labels, linked only through the customer.
    insert_box(&app, "LEGACY-TAG-001".to_string(), None, customer.id).await;
    insert_box(&app, "LEGACY-TAG-002".to_string(), None, customer.id).await;

    let count =
        presshouse_api::services::boxes::BoxMaterializer::count_existing(&*app.state.db, &order)
            .await
            .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn reconcile_grows_by_missing_suffixes_only() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(120), 2).await;
    let boxes = &app.state.services.boxes;

    boxes.materialize(order.id).await.unwrap();

    // Delete box 2 of 4 to simulate a lost label, then reconcile to 5.
    BoxEntity::delete_by_id(ids::encode_box_id(order.id, 2))
        .exec(&*app.state.db)
        .await
        .unwrap();

    let order_row = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .unwrap();
    let count = presshouse_api::services::boxes::BoxMaterializer::reconcile(
        &*app.state.db,
        &order_row,
        5,
    )
    .await
    .unwrap();
    assert_eq!(count, 5);

    let rows = BoxEntity::find()
        .filter(box_unit::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    let mut labels: Vec<String> = rows.into_iter().map(|b| b.id).collect();
    labels.sort();
    let mut expected: Vec<String> = (1..=5).map(|i| ids::encode_box_id(order.id, i)).collect();
    expected.sort();
    assert_eq!(labels, expected);
}
