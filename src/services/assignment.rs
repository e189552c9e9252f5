use crate::{
    db::{begin_txn, lock_for_update, DbPool},
    entities::box_unit::{self, Entity as BoxEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::pallet::{self, Entity as PalletEntity},
    entities::shelf::{self, Entity as ShelfEntity},
    entities::{CarrierStatus, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    ids,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Result of a single-box assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned,
    /// The box was already on the requested carrier; nothing changed.
    AlreadyAssigned,
}

/// Identifies a pallet or shelf for the repair/recount operation.
#[derive(Debug, Clone, Copy)]
pub enum CarrierRef {
    Pallet(Uuid),
    Shelf(Uuid),
}

#[derive(Debug, Validate)]
pub struct CreateCarrierRequest {
    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: i32,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
}

/// Moves boxes and pallets between carriers while keeping every holding
/// counter inside `[0, capacity]`.
///
/// All mutations run in one transaction with the box row locked before the
/// carrier row, giving a total lock order that prevents deadlock between
/// concurrent assignments touching the same box/pallet pair. Carrier-level
/// contention is serialized by the carrier row lock itself.
#[derive(Clone)]
pub struct AssignmentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl AssignmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }

    /// Registers a new pallet. Capacity is validated before anything
    /// touches the database.
    pub async fn create_pallet(
        &self,
        request: CreateCarrierRequest,
    ) -> Result<pallet::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let model = pallet::ActiveModel {
            id: Set(id),
            tag: Set(ids::encode_pallet_tag(id)),
            capacity: Set(request.capacity),
            holding: Set(0),
            location: Set(request.location),
            status: Set(CarrierStatus::Empty.to_string()),
            shelf_id: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        model
            .insert(&*self.db_pool)
            .await
            .map_err(ServiceError::Database)
    }

    /// Registers a new shelf.
    pub async fn create_shelf(
        &self,
        request: CreateCarrierRequest,
    ) -> Result<shelf::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let model = shelf::ActiveModel {
            id: Set(id),
            tag: Set(ids::encode_shelf_tag(id)),
            capacity: Set(request.capacity),
            holding: Set(0),
            location: Set(request.location),
            status: Set(CarrierStatus::Empty.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        model
            .insert(&*self.db_pool)
            .await
            .map_err(ServiceError::Database)
    }

    /// Places one box on a pallet.
    ///
    /// Lock order is box first, then carriers. Already-on-this-pallet is a
    /// no-op success so retries are safe. A full pallet is a conflict and
    /// leaves every counter untouched.
    #[instrument(skip(self), fields(pallet_id = %pallet_id))]
    pub async fn assign_box_to_pallet(
        &self,
        raw_box_id: &str,
        pallet_id: Uuid,
    ) -> Result<AssignmentOutcome, ServiceError> {
        let box_id = ids::normalize_scanned_id(raw_box_id);
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let backend = txn.get_database_backend();

        let bx = lock_for_update(BoxEntity::find_by_id(&box_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Box", &box_id))?;

        if bx.pallet_id == Some(pallet_id) {
            txn.commit().await.map_err(ServiceError::Database)?;
            return Ok(AssignmentOutcome::AlreadyAssigned);
        }

        let target = lock_for_update(PalletEntity::find_by_id(pallet_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Pallet", pallet_id))?;

        if target.holding >= target.capacity {
            return Err(ServiceError::Conflict(format!(
                "pallet {} is full ({}/{})",
                pallet_id, target.holding, target.capacity
            )));
        }

        if let Some(prev_pallet) = bx.pallet_id {
            Self::release_from_pallet(&txn, backend, prev_pallet).await?;
        }
        if let Some(prev_shelf) = bx.shelf_id {
            Self::release_from_shelf(&txn, backend, prev_shelf).await?;
        }

        let mut box_active: box_unit::ActiveModel = bx.into();
        box_active.pallet_id = Set(Some(pallet_id));
        box_active.shelf_id = Set(None);
        box_active.updated_at = Set(Some(Utc::now()));
        box_active.update(&txn).await.map_err(ServiceError::Database)?;

        let new_holding = target.holding + 1;
        let capacity = target.capacity;
        let mut pallet_active: pallet::ActiveModel = target.into();
        pallet_active.holding = Set(new_holding);
        pallet_active.status =
            Set(CarrierStatus::derive_incremental(new_holding, capacity).to_string());
        pallet_active.updated_at = Set(Some(Utc::now()));
        pallet_active
            .update(&txn)
            .await
            .map_err(ServiceError::Database)?;

        txn.commit().await.map_err(ServiceError::Database)?;

        info!(box_id = %box_id, holding = new_holding, "Box assigned to pallet");
        self.emit(Event::BoxAssignedToPallet { box_id, pallet_id }).await;
        Ok(AssignmentOutcome::Assigned)
    }

    /// Bulk box-to-pallet assignment. The pallet's holding is rebuilt from
    /// a fresh count afterwards instead of incremental arithmetic, so a
    /// partially applied earlier bulk run cannot leave drift behind.
    #[instrument(skip(self, raw_box_ids), fields(pallet_id = %pallet_id, count = raw_box_ids.len()))]
    pub async fn assign_boxes_to_pallet(
        &self,
        pallet_id: Uuid,
        raw_box_ids: &[String],
    ) -> Result<u64, ServiceError> {
        let box_ids = Self::normalize_unique(raw_box_ids);
        if box_ids.is_empty() {
            return Ok(0);
        }

        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let backend = txn.get_database_backend();

        // Box rows are locked before the carrier, the same total order as
        // the single-box path.
        let affected = lock_for_update(
            BoxEntity::find().filter(box_unit::Column::Id.is_in(box_ids.clone())),
            backend,
        )
        .all(&txn)
        .await
        .map_err(ServiceError::Database)?;
        let prev_pallets: HashSet<Uuid> = affected
            .iter()
            .filter_map(|b| b.pallet_id)
            .filter(|p| *p != pallet_id)
            .collect();
        let prev_shelves: HashSet<Uuid> = affected.iter().filter_map(|b| b.shelf_id).collect();

        let target = lock_for_update(PalletEntity::find_by_id(pallet_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Pallet", pallet_id))?;

        let result = BoxEntity::update_many()
            .col_expr(box_unit::Column::PalletId, Expr::value(pallet_id))
            .col_expr(box_unit::Column::ShelfId, Expr::value(None::<Uuid>))
            .col_expr(box_unit::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(box_unit::Column::Id.is_in(box_ids))
            .exec(&txn)
            .await
            .map_err(ServiceError::Database)?;

        for prev in prev_pallets {
            Self::recount_pallet(&txn, backend, prev).await?;
        }
        for prev in prev_shelves {
            Self::recount_shelf(&txn, backend, prev).await?;
        }

        let holding = Self::recount_pallet(&txn, backend, pallet_id).await?;
        if holding > target.capacity {
            return Err(ServiceError::Conflict(format!(
                "pallet {} is full ({}/{})",
                pallet_id, holding, target.capacity
            )));
        }

        txn.commit().await.map_err(ServiceError::Database)?;
        info!(moved = result.rows_affected, holding, "Boxes bulk-assigned to pallet");
        Ok(result.rows_affected)
    }

    /// Places a pallet on a shelf; a pallet occupies exactly one shelf
    /// slot regardless of how many boxes it carries.
    #[instrument(skip(self), fields(pallet_id = %pallet_id, shelf_id = %shelf_id))]
    pub async fn assign_pallet_to_shelf(
        &self,
        pallet_id: Uuid,
        shelf_id: Uuid,
    ) -> Result<AssignmentOutcome, ServiceError> {
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let backend = txn.get_database_backend();

        let pallet = lock_for_update(PalletEntity::find_by_id(pallet_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Pallet", pallet_id))?;

        if pallet.shelf_id == Some(shelf_id) {
            txn.commit().await.map_err(ServiceError::Database)?;
            return Ok(AssignmentOutcome::AlreadyAssigned);
        }

        let target = lock_for_update(ShelfEntity::find_by_id(shelf_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Shelf", shelf_id))?;

        if target.holding >= target.capacity {
            return Err(ServiceError::Conflict(format!(
                "shelf {} is full ({}/{})",
                shelf_id, target.holding, target.capacity
            )));
        }

        if let Some(prev_shelf) = pallet.shelf_id {
            Self::release_from_shelf(&txn, backend, prev_shelf).await?;
        }

        let mut pallet_active: pallet::ActiveModel = pallet.into();
        pallet_active.shelf_id = Set(Some(shelf_id));
        pallet_active.updated_at = Set(Some(Utc::now()));
        pallet_active
            .update(&txn)
            .await
            .map_err(ServiceError::Database)?;

        let new_holding = target.holding + 1;
        let capacity = target.capacity;
        let mut shelf_active: shelf::ActiveModel = target.into();
        shelf_active.holding = Set(new_holding);
        shelf_active.status =
            Set(CarrierStatus::derive_incremental(new_holding, capacity).to_string());
        shelf_active.updated_at = Set(Some(Utc::now()));
        shelf_active
            .update(&txn)
            .await
            .map_err(ServiceError::Database)?;

        txn.commit().await.map_err(ServiceError::Database)?;
        self.emit(Event::PalletAssignedToShelf { pallet_id, shelf_id }).await;
        Ok(AssignmentOutcome::Assigned)
    }

    /// Direct-to-shelf flow: boxes bypass pallets entirely. Any existing
    /// pallet link is cleared and the affected pallets are recounted.
    #[instrument(skip(self, raw_box_ids), fields(shelf_id = %shelf_id, count = raw_box_ids.len()))]
    pub async fn assign_boxes_to_shelf(
        &self,
        shelf_id: Uuid,
        raw_box_ids: &[String],
    ) -> Result<u64, ServiceError> {
        let box_ids = Self::normalize_unique(raw_box_ids);
        if box_ids.is_empty() {
            return Ok(0);
        }

        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let backend = txn.get_database_backend();

        // Same lock order as the pallet path: boxes first, carrier second.
        let affected = lock_for_update(
            BoxEntity::find().filter(box_unit::Column::Id.is_in(box_ids.clone())),
            backend,
        )
        .all(&txn)
        .await
        .map_err(ServiceError::Database)?;
        let prev_pallets: HashSet<Uuid> = affected.iter().filter_map(|b| b.pallet_id).collect();

        let target = lock_for_update(ShelfEntity::find_by_id(shelf_id), backend)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Shelf", shelf_id))?;

        let result = BoxEntity::update_many()
            .col_expr(box_unit::Column::ShelfId, Expr::value(shelf_id))
            .col_expr(box_unit::Column::PalletId, Expr::value(None::<Uuid>))
            .col_expr(box_unit::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(box_unit::Column::Id.is_in(box_ids))
            .exec(&txn)
            .await
            .map_err(ServiceError::Database)?;

        for prev in prev_pallets {
            Self::recount_pallet(&txn, backend, prev).await?;
        }

        let holding = Self::recount_shelf(&txn, backend, shelf_id).await?;
        if holding > target.capacity {
            return Err(ServiceError::Conflict(format!(
                "shelf {} is full ({}/{})",
                shelf_id, holding, target.capacity
            )));
        }

        txn.commit().await.map_err(ServiceError::Database)?;
        self.emit(Event::BoxesAssignedToShelf {
            shelf_id,
            count: result.rows_affected as usize,
        })
        .await;
        Ok(result.rows_affected)
    }

    /// Authoritative repair: recomputes a carrier's holding from its live
    /// children and rewrites the derived status. Safe to call any time.
    #[instrument(skip(self))]
    pub async fn recount_holding(&self, carrier: CarrierRef) -> Result<i32, ServiceError> {
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let backend = txn.get_database_backend();

        let (carrier_id, holding) = match carrier {
            CarrierRef::Pallet(id) => (id, Self::recount_pallet(&txn, backend, id).await?),
            CarrierRef::Shelf(id) => (id, Self::recount_shelf(&txn, backend, id).await?),
        };

        txn.commit().await.map_err(ServiceError::Database)?;
        self.emit(Event::HoldingRecounted {
            carrier_id,
            holding,
        })
        .await;
        Ok(holding)
    }

    /// Marks every order with a box on this pallet as ready for pickup.
    /// Orders already picked up are left alone.
    #[instrument(skip(self), fields(pallet_id = %pallet_id))]
    pub async fn mark_orders_on_pallet_ready(&self, pallet_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let boxes = BoxEntity::find()
            .filter(box_unit::Column::PalletId.eq(pallet_id))
            .all(db)
            .await
            .map_err(ServiceError::Database)?;
        self.mark_resolved_orders_ready(&boxes).await
    }

    /// Marks the orders behind an explicit set of scanned boxes as ready.
    #[instrument(skip(self, raw_box_ids), fields(count = raw_box_ids.len()))]
    pub async fn mark_orders_from_boxes_ready(
        &self,
        raw_box_ids: &[String],
    ) -> Result<u64, ServiceError> {
        let box_ids = Self::normalize_unique(raw_box_ids);
        let db = &*self.db_pool;
        let boxes = BoxEntity::find()
            .filter(box_unit::Column::Id.is_in(box_ids))
            .all(db)
            .await
            .map_err(ServiceError::Database)?;
        self.mark_resolved_orders_ready(&boxes).await
    }

    async fn mark_resolved_orders_ready(
        &self,
        boxes: &[box_unit::Model],
    ) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let mut order_ids: HashSet<Uuid> = HashSet::new();

        for bx in boxes {
            match ids::resolve_box_owner(bx.order_id, &bx.id, bx.customer_id) {
                ids::BoxOwner::Order(order_id) => {
                    order_ids.insert(order_id);
                }
                // Boxes predating order-keyed labels: fall back to the
                // customer's latest order.
                ids::BoxOwner::Customer(customer_id) => {
                    let latest = OrderEntity::find()
                        .filter(order::Column::CustomerId.eq(customer_id))
                        .filter(order::Column::IsDeleted.eq(false))
                        .order_by_desc(order::Column::CreatedAt)
                        .one(db)
                        .await
                        .map_err(ServiceError::Database)?;
                    if let Some(o) = latest {
                        order_ids.insert(o.id);
                    }
                }
            }
        }

        if order_ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::ReadyForPickup.to_string()),
            )
            .col_expr(order::Column::ReadyAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.is_in(order_ids.into_iter().collect::<Vec<_>>()))
            .filter(order::Column::Status.ne(OrderStatus::PickedUp.to_string()))
            .exec(db)
            .await
            .map_err(ServiceError::Database)?;

        info!(orders_marked = result.rows_affected, "Orders marked ready from boxes");
        Ok(result.rows_affected)
    }

    fn normalize_unique(raw: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.iter()
            .map(|s| ids::normalize_scanned_id(s))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect()
    }

    /// Decrements a pallet the box is leaving, floored at zero.
    async fn release_from_pallet(
        txn: &DatabaseTransaction,
        backend: sea_orm::DbBackend,
        pallet_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(prev) = lock_for_update(PalletEntity::find_by_id(pallet_id), backend)
            .one(txn)
            .await
            .map_err(ServiceError::Database)?
        else {
            return Ok(());
        };
        let holding = (prev.holding - 1).max(0);
        let capacity = prev.capacity;
        let mut active: pallet::ActiveModel = prev.into();
        active.holding = Set(holding);
        active.status = Set(CarrierStatus::derive_incremental(holding, capacity).to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(txn).await.map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn release_from_shelf(
        txn: &DatabaseTransaction,
        backend: sea_orm::DbBackend,
        shelf_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(prev) = lock_for_update(ShelfEntity::find_by_id(shelf_id), backend)
            .one(txn)
            .await
            .map_err(ServiceError::Database)?
        else {
            return Ok(());
        };
        let holding = (prev.holding - 1).max(0);
        let capacity = prev.capacity;
        let mut active: shelf::ActiveModel = prev.into();
        active.holding = Set(holding);
        active.status = Set(CarrierStatus::derive_incremental(holding, capacity).to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(txn).await.map_err(ServiceError::Database)?;
        Ok(())
    }

    /// Recounts a pallet from its live boxes. Holding is clamped into
    /// `[0, capacity]`; an over-capacity count is logged for follow-up.
    async fn recount_pallet(
        txn: &DatabaseTransaction,
        backend: sea_orm::DbBackend,
        pallet_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let Some(p) = lock_for_update(PalletEntity::find_by_id(pallet_id), backend)
            .one(txn)
            .await
            .map_err(ServiceError::Database)?
        else {
            return Ok(0);
        };
        let count = BoxEntity::find()
            .filter(box_unit::Column::PalletId.eq(pallet_id))
            .count(txn)
            .await
            .map_err(ServiceError::Database)? as i32;
        if count > p.capacity {
            warn!(pallet_id = %pallet_id, count, capacity = p.capacity, "Pallet over capacity");
        }
        let capacity = p.capacity;
        let mut active: pallet::ActiveModel = p.into();
        active.holding = Set(count.min(capacity));
        active.status = Set(CarrierStatus::derive(count, capacity).to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(txn).await.map_err(ServiceError::Database)?;
        Ok(count)
    }

    /// Recounts a shelf: pallets on it plus boxes shelved directly.
    async fn recount_shelf(
        txn: &DatabaseTransaction,
        backend: sea_orm::DbBackend,
        shelf_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let Some(s) = lock_for_update(ShelfEntity::find_by_id(shelf_id), backend)
            .one(txn)
            .await
            .map_err(ServiceError::Database)?
        else {
            return Ok(0);
        };
        let pallets = PalletEntity::find()
            .filter(pallet::Column::ShelfId.eq(shelf_id))
            .count(txn)
            .await
            .map_err(ServiceError::Database)? as i32;
        let direct_boxes = BoxEntity::find()
            .filter(box_unit::Column::ShelfId.eq(shelf_id))
            .count(txn)
            .await
            .map_err(ServiceError::Database)? as i32;
        let count = pallets + direct_boxes;
        if count > s.capacity {
            warn!(shelf_id = %shelf_id, count, capacity = s.capacity, "Shelf over capacity");
        }
        let capacity = s.capacity;
        let mut active: shelf::ActiveModel = s.into();
        active.holding = Set(count.min(capacity));
        active.status = Set(CarrierStatus::derive(count, capacity).to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(txn).await.map_err(ServiceError::Database)?;
        Ok(count)
    }
}
