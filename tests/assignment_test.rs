//! Capacity-safe assignment tests: conflict rejection, reassignment
//! bookkeeping, pallet/shelf mutual exclusion, and recount repair.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use presshouse_api::{
    entities::box_unit::Entity as BoxEntity,
    entities::pallet::{self, Entity as PalletEntity},
    entities::shelf::Entity as ShelfEntity,
    errors::ServiceError,
    services::assignment::{AssignmentOutcome, CarrierRef, CreateCarrierRequest},
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

async fn pallet_row(app: &TestApp, id: Uuid) -> pallet::Model {
    PalletEntity::find_by_id(id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
}

fn carrier(capacity: i32) -> CreateCarrierRequest {
    CreateCarrierRequest {
        capacity,
        location: "Riverton".to_string(),
    }
}

/// Registers a customer+order and returns the materialized box labels.
async fn seed_boxes(app: &TestApp, weight: rust_decimal::Decimal) -> Vec<String> {
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, weight, 1).await;
    app.state.services.boxes.materialize(order.id).await.unwrap()
}

#[tokio::test]
async fn non_positive_capacity_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .assignment
        .create_pallet(carrier(0))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));
    assert!(PalletEntity::find()
        .all(&*app.state.db)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn full_pallet_rejects_assignment_and_keeps_holding() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await; // 4 boxes
    let pallet = assignment.create_pallet(carrier(2)).await.unwrap();

    assignment
        .assign_box_to_pallet(&boxes[0], pallet.id)
        .await
        .unwrap();
    assignment
        .assign_box_to_pallet(&boxes[1], pallet.id)
        .await
        .unwrap();

    let full = pallet_row(&app, pallet.id).await;
    assert_eq!(full.holding, 2);
    assert_eq!(full.status, "full");

    let err = assignment
        .assign_box_to_pallet(&boxes[2], pallet.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Holding unchanged after the rejected assignment.
    let after = pallet_row(&app, pallet.id).await;
    assert_eq!(after.holding, 2);
}

#[tokio::test]
async fn reassignment_moves_the_count_between_pallets() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(30)).await; // 1 box
    let p1 = assignment.create_pallet(carrier(2)).await.unwrap();
    let p2 = assignment.create_pallet(carrier(2)).await.unwrap();

    assignment
        .assign_box_to_pallet(&boxes[0], p1.id)
        .await
        .unwrap();
    assert_eq!(pallet_row(&app, p1.id).await.holding, 1);

    assignment
        .assign_box_to_pallet(&boxes[0], p2.id)
        .await
        .unwrap();

    let old = pallet_row(&app, p1.id).await;
    assert_eq!(old.holding, 0);
    assert_eq!(old.status, "available");
    assert_eq!(pallet_row(&app, p2.id).await.holding, 1);
}

#[tokio::test]
async fn repeat_assignment_is_a_noop() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(30)).await;
    let pallet = assignment.create_pallet(carrier(2)).await.unwrap();

    assert_eq!(
        assignment
            .assign_box_to_pallet(&boxes[0], pallet.id)
            .await
            .unwrap(),
        AssignmentOutcome::Assigned
    );
    assert_eq!(
        assignment
            .assign_box_to_pallet(&boxes[0], pallet.id)
            .await
            .unwrap(),
        AssignmentOutcome::AlreadyAssigned
    );
    assert_eq!(pallet_row(&app, pallet.id).await.holding, 1);
}

#[tokio::test]
async fn scanner_noise_in_box_id_is_tolerated() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(30)).await;
    let pallet = assignment.create_pallet(carrier(2)).await.unwrap();

    // Same box, scanned with noise: spaces and uppercase key.
    let noisy = boxes[0].replace('_', " ").to_uppercase();
    assignment
        .assign_box_to_pallet(&noisy, pallet.id)
        .await
        .unwrap();
    assert_eq!(pallet_row(&app, pallet.id).await.holding, 1);
}

#[tokio::test]
async fn box_is_never_on_pallet_and_shelf_at_once() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(30)).await;
    let pallet = assignment.create_pallet(carrier(2)).await.unwrap();
    let shelf = assignment.create_shelf(carrier(4)).await.unwrap();

    assignment
        .assign_box_to_pallet(&boxes[0], pallet.id)
        .await
        .unwrap();
    assignment
        .assign_boxes_to_shelf(shelf.id, &boxes)
        .await
        .unwrap();

    let all = BoxEntity::find().all(&*app.state.db).await.unwrap();
    for bx in &all {
        assert!(
            !(bx.pallet_id.is_some() && bx.shelf_id.is_some()),
            "box {} is on both a pallet and a shelf",
            bx.id
        );
    }

    // The pallet the box left is recounted back to zero.
    assert_eq!(pallet_row(&app, pallet.id).await.holding, 0);
    let shelf_after = ShelfEntity::find_by_id(shelf.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shelf_after.holding, 1);
}

#[tokio::test]
async fn bulk_assignment_deduplicates_and_recounts() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await; // 4 boxes
    let pallet = assignment.create_pallet(carrier(10)).await.unwrap();

    // Duplicate scans of the same labels collapse to one assignment each.
    let mut scans = boxes.clone();
    scans.extend(boxes.clone());
    let moved = assignment
        .assign_boxes_to_pallet(pallet.id, &scans)
        .await
        .unwrap();
    assert_eq!(moved, 4);
    assert_eq!(pallet_row(&app, pallet.id).await.holding, 4);
}

#[tokio::test]
async fn bulk_assignment_moves_boxes_off_their_previous_carriers() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await; // 4 boxes
    let p1 = assignment.create_pallet(carrier(10)).await.unwrap();
    let shelf = assignment.create_shelf(carrier(4)).await.unwrap();
    let p2 = assignment.create_pallet(carrier(10)).await.unwrap();

    // Scatter the boxes: two on a pallet, one directly shelved.
    assignment
        .assign_boxes_to_pallet(p1.id, &boxes[..2])
        .await
        .unwrap();
    assignment
        .assign_boxes_to_shelf(shelf.id, &boxes[2..3])
        .await
        .unwrap();

    // One bulk call gathers all four onto the second pallet and settles
    // every previous carrier it touched.
    let moved = assignment
        .assign_boxes_to_pallet(p2.id, &boxes)
        .await
        .unwrap();
    assert_eq!(moved, 4);

    assert_eq!(pallet_row(&app, p2.id).await.holding, 4);
    let old_pallet = pallet_row(&app, p1.id).await;
    assert_eq!(old_pallet.holding, 0);
    assert_eq!(old_pallet.status, "empty");
    let old_shelf = ShelfEntity::find_by_id(shelf.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old_shelf.holding, 0);

    let all = BoxEntity::find().all(&*app.state.db).await.unwrap();
    assert!(all
        .iter()
        .all(|b| b.pallet_id == Some(p2.id) && b.shelf_id.is_none()));
}

#[tokio::test]
async fn bulk_assignment_over_capacity_rolls_back() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await; // 4 boxes
    let pallet = assignment.create_pallet(carrier(2)).await.unwrap();

    let err = assignment
        .assign_boxes_to_pallet(pallet.id, &boxes)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Nothing committed: no box linked, holding still zero.
    let after = pallet_row(&app, pallet.id).await;
    assert_eq!(after.holding, 0);
    let all = BoxEntity::find().all(&*app.state.db).await.unwrap();
    assert!(all.iter().all(|b| b.pallet_id.is_none()));
}

#[tokio::test]
async fn pallet_occupies_one_shelf_slot() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await;
    let pallet = assignment.create_pallet(carrier(10)).await.unwrap();
    let shelf = assignment.create_shelf(carrier(1)).await.unwrap();

    assignment
        .assign_boxes_to_pallet(pallet.id, &boxes)
        .await
        .unwrap();
    assignment
        .assign_pallet_to_shelf(pallet.id, shelf.id)
        .await
        .unwrap();

    // Four boxes on the pallet, but the shelf holds one unit.
    let shelf_after = ShelfEntity::find_by_id(shelf.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shelf_after.holding, 1);
    assert_eq!(shelf_after.status, "full");

    // A second pallet no longer fits.
    let p2 = assignment.create_pallet(carrier(2)).await.unwrap();
    let err = assignment
        .assign_pallet_to_shelf(p2.id, shelf.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn recount_repairs_drifted_holding() {
    let app = TestApp::new().await;
    let assignment = &app.state.services.assignment;
    let boxes = seed_boxes(&app, dec!(120)).await;
    let pallet = assignment.create_pallet(carrier(10)).await.unwrap();
    assignment
        .assign_boxes_to_pallet(pallet.id, &boxes)
        .await
        .unwrap();

    // Corrupt the counter to simulate drift from a partial failure.
    let row = pallet_row(&app, pallet.id).await;
    let mut active: pallet::ActiveModel = row.into();
    active.holding = Set(9);
    active.status = Set("available".to_string());
    active.update(&*app.state.db).await.unwrap();

    let recounted = assignment
        .recount_holding(CarrierRef::Pallet(pallet.id))
        .await
        .unwrap();
    assert_eq!(recounted, 4);
    let repaired = pallet_row(&app, pallet.id).await;
    assert_eq!(repaired.holding, 4);
    assert_eq!(repaired.status, "available");
}

#[tokio::test]
async fn orders_on_pallet_are_marked_ready() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let customer = app.seed_customer().await;
    let order = app.seed_order(customer.id, dec!(120), 1).await;
    let boxes = services.boxes.materialize(order.id).await.unwrap();
    let pallet = services
        .assignment
        .create_pallet(carrier(10))
        .await
        .unwrap();
    services
        .assignment
        .assign_boxes_to_pallet(pallet.id, &boxes)
        .await
        .unwrap();

    let marked = services
        .assignment
        .mark_orders_on_pallet_ready(pallet.id)
        .await
        .unwrap();
    assert_eq!(marked, 1);

    let after = services.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(after.status, "Ready for pickup");
    assert!(after.ready_at.is_some());

    // Once picked up, the order is left alone.
    services.orders.mark_picked_up(order.id).await.unwrap();
    let marked_again = services
        .assignment
        .mark_orders_on_pallet_ready(pallet.id)
        .await
        .unwrap();
    assert_eq!(marked_again, 0);
}

#[tokio::test]
async fn customer_linked_box_marks_latest_order_ready() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let customer = app.seed_customer().await;
    let _older = app.seed_order(customer.id, dec!(30), 1).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = app.seed_order(customer.id, dec!(40), 1).await;

    // A legacy box with no derivable order key.
    let now = chrono::Utc::now();
    presshouse_api::entities::box_unit::ActiveModel {
        id: Set("LEGACY-TAG-007".to_string()),
        order_id: Set(None),
        customer_id: Set(customer.id),
        pallet_id: Set(None),
        shelf_id: Set(None),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let marked = services
        .assignment
        .mark_orders_from_boxes_ready(&["LEGACY-TAG-007".to_string()])
        .await
        .unwrap();
    assert_eq!(marked, 1);

    let after = services.orders.get_order(newer.id).await.unwrap().unwrap();
    assert_eq!(after.status, "Ready for pickup");
}
