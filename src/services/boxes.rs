use crate::{
    config::ProcessingConstants,
    db::{begin_txn, DbPool},
    entities::box_unit::{self, Entity as BoxEntity},
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    ids,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Derives and maintains the box rows implied by an order.
///
/// Box records are never created by callers directly; this service owns
/// the estimate, the idempotent materialization, and the reconcile path
/// used when an order's box count is corrected.
#[derive(Clone)]
pub struct BoxMaterializer {
    db_pool: Arc<DbPool>,
    constants: ProcessingConstants,
    event_sender: Option<Arc<EventSender>>,
}

/// Weight-based estimate: pouches filled, then boxes to hold them.
///
/// `floor(weight * yield / liters-per-pouch)` pouches, grouped
/// `pouches_per_box` to a box, rounded up, never less than one box for a
/// positive weight.
pub fn estimate_counts(weight_kg: Decimal, constants: &ProcessingConstants) -> (i32, i32) {
    if weight_kg <= Decimal::ZERO {
        return (0, 0);
    }
    let pouches = (weight_kg * constants.yield_rate / constants.pouch_liters)
        .floor()
        .to_i32()
        .unwrap_or(0)
        .max(0);
    let per_box = constants.pouches_per_box.max(1);
    let boxes = ((pouches + per_box - 1) / per_box).max(1);
    (pouches, boxes)
}

impl BoxMaterializer {
    pub fn new(
        db_pool: Arc<DbPool>,
        constants: ProcessingConstants,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            constants,
            event_sender,
        }
    }

    /// The authoritative number of boxes for an order: the persisted
    /// declared count when positive, otherwise the weight-based estimate,
    /// which is persisted before being returned so later calls agree.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn expected_box_count(&self, order_id: Uuid) -> Result<i32, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        if order.declared_box_count > 0 {
            return Ok(order.declared_box_count);
        }

        let (pouches, boxes) = estimate_counts(order.weight_kg, &self.constants);

        let mut active: order::ActiveModel = order.clone().into();
        active.declared_box_count = Set(boxes);
        if order.declared_pouch_count == 0 {
            active.declared_pouch_count = Set(pouches);
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::Database)?;

        info!(boxes, pouches, "Box count estimated from weight");
        Ok(boxes)
    }

    /// Idempotently creates the box rows `BOX_<order>_1..N` and refreshes
    /// the persisted actual count from what exists. Re-running with no
    /// intervening change is a no-op.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn materialize(&self, order_id: Uuid) -> Result<Vec<String>, ServiceError> {
        let expected = self.expected_box_count(order_id).await?;

        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let now = Utc::now();
        let models: Vec<box_unit::ActiveModel> = (1..=expected)
            .map(|i| box_unit::ActiveModel {
                id: Set(ids::encode_box_id(order_id, i as u32)),
                order_id: Set(Some(order_id)),
                customer_id: Set(order.customer_id),
                pallet_id: Set(None),
                shelf_id: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            })
            .collect();

        if !models.is_empty() {
            BoxEntity::insert_many(models)
                .on_conflict(
                    OnConflict::column(box_unit::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(ServiceError::Database)?;
        }

        let actual = Self::count_existing(&txn, &order).await?;

        let mut active: order::ActiveModel = order.into();
        active.actual_box_count = Set(actual);
        active.updated_at = Set(Some(now));
        active.update(&txn).await.map_err(ServiceError::Database)?;

        txn.commit().await.map_err(ServiceError::Database)?;

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::BoxesMaterialized {
                    order_id,
                    count: actual,
                })
                .await
            {
                warn!(error = %e, "Failed to send boxes materialized event");
            }
        }

        Ok((1..=expected)
            .map(|i| ids::encode_box_id(order_id, i as u32))
            .collect())
    }

    /// Counts the boxes that belong to an order, trying the identifier
    /// conventions the data has accumulated, newest first: the explicit
    /// foreign key, the suffixed label, the single unsuffixed label, and
    /// finally plain customer linkage.
    pub async fn count_existing<C: ConnectionTrait>(
        conn: &C,
        order: &order::Model,
    ) -> Result<i32, ServiceError> {
        let by_fk = BoxEntity::find()
            .filter(box_unit::Column::OrderId.eq(order.id))
            .count(conn)
            .await
            .map_err(ServiceError::Database)?;
        if by_fk > 0 {
            return Ok(by_fk as i32);
        }

        let suffixed_prefix = format!("{}_{}_", ids::BOX_PREFIX, order.id);
        let by_suffix = BoxEntity::find()
            .filter(box_unit::Column::Id.starts_with(suffixed_prefix.as_str()))
            .count(conn)
            .await
            .map_err(ServiceError::Database)?;
        if by_suffix > 0 {
            return Ok(by_suffix as i32);
        }

        let unsuffixed = format!("{}_{}", ids::BOX_PREFIX, order.id);
        let single = BoxEntity::find_by_id(&unsuffixed)
            .count(conn)
            .await
            .map_err(ServiceError::Database)?;
        if single > 0 {
            return Ok(1);
        }

        let by_customer = BoxEntity::find()
            .filter(box_unit::Column::CustomerId.eq(order.customer_id))
            .count(conn)
            .await
            .map_err(ServiceError::Database)?;
        Ok(by_customer as i32)
    }

    /// Reconciles an order's box rows to `new_count` on the caller's
    /// connection, so a surrounding order update stays atomic.
    ///
    /// Growth inserts only the missing suffixes. Shrinking deletes the
    /// rows beyond `new_count` and fails with a conflict if any of them
    /// is already placed on a pallet or shelf. Returns the resulting box
    /// count.
    pub async fn reconcile<C: ConnectionTrait>(
        conn: &C,
        order: &order::Model,
        new_count: i32,
    ) -> Result<i32, ServiceError> {
        if new_count < 0 {
            return Err(ServiceError::Validation(
                "box count must not be negative".to_string(),
            ));
        }

        let owned = Self::find_owned(conn, order).await?;

        // Sequence map: an unsuffixed single-box label counts as slot 1.
        let mut by_seq: BTreeMap<u32, &box_unit::Model> = BTreeMap::new();
        for bx in &owned {
            let seq = ids::decode_box_seq(&bx.id).unwrap_or(1);
            by_seq.entry(seq).or_insert(bx);
        }

        let doomed: Vec<&box_unit::Model> = by_seq
            .iter()
            .filter(|(seq, _)| **seq > new_count as u32)
            .map(|(_, bx)| *bx)
            .collect();
        if doomed.iter().any(|bx| bx.is_placed()) {
            return Err(ServiceError::Conflict(
                "boxes in use: cannot shrink box count while boxes are on a pallet or shelf"
                    .to_string(),
            ));
        }
        if !doomed.is_empty() {
            let ids_to_delete: Vec<String> = doomed.iter().map(|bx| bx.id.clone()).collect();
            BoxEntity::delete_many()
                .filter(box_unit::Column::Id.is_in(ids_to_delete))
                .exec(conn)
                .await
                .map_err(ServiceError::Database)?;
        }

        let now = Utc::now();
        let missing: Vec<box_unit::ActiveModel> = (1..=new_count.max(0) as u32)
            .filter(|seq| !by_seq.contains_key(seq))
            .map(|seq| box_unit::ActiveModel {
                id: Set(ids::encode_box_id(order.id, seq)),
                order_id: Set(Some(order.id)),
                customer_id: Set(order.customer_id),
                pallet_id: Set(None),
                shelf_id: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            })
            .collect();
        if !missing.is_empty() {
            BoxEntity::insert_many(missing)
                .on_conflict(
                    OnConflict::column(box_unit::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(conn)
                .await
                .map_err(ServiceError::Database)?;
        }

        Self::count_existing(conn, order).await
    }

    /// Boxes belonging to an order under any identifier convention,
    /// deduplicated by label.
    pub async fn find_owned<C: ConnectionTrait>(
        conn: &C,
        order: &order::Model,
    ) -> Result<Vec<box_unit::Model>, ServiceError> {
        let suffixed_prefix = format!("{}_{}_", ids::BOX_PREFIX, order.id);
        let unsuffixed = format!("{}_{}", ids::BOX_PREFIX, order.id);

        let rows = BoxEntity::find()
            .filter(
                box_unit::Column::OrderId
                    .eq(order.id)
                    .or(box_unit::Column::Id.starts_with(suffixed_prefix.as_str()))
                    .or(box_unit::Column::Id.eq(unsuffixed.as_str())),
            )
            .all(conn)
            .await
            .map_err(ServiceError::Database)?;
        Ok(rows)
    }
}
