use crate::{
    db::{begin_txn, DbPool},
    entities::box_unit::{self, Entity as BoxEntity},
    entities::crate_unit::{self, Entity as CrateEntity},
    entities::customer::{self, Entity as CustomerEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::IdempotencyStore,
    services::boxes::BoxMaterializer,
    services::crates::CrateService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub weight_kg: Decimal,
    #[validate(range(min = 0, max = 1000, message = "Crate count out of range"))]
    pub crate_count: i32,
    pub total_amount: Decimal,
    pub declared_pouch_count: Option<i32>,
    pub declared_box_count: Option<i32>,
    pub notes: Option<String>,
}

/// Partial order mutation. `None` fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateOrderInfoRequest {
    pub weight_kg: Option<Decimal>,
    pub status: Option<OrderStatus>,
    pub declared_pouch_count: Option<i32>,
    pub actual_pouch_count: Option<i32>,
    pub declared_box_count: Option<i32>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Owns order status progression, soft delete/restore and order mutation,
/// with box housekeeping cascaded through the materializer in the same
/// transaction.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    idempotency: Arc<dyn IdempotencyStore>,
    notify_ttl: Duration,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        idempotency: Arc<dyn IdempotencyStore>,
        notify_ttl: Duration,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            idempotency,
            notify_ttl,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }

    /// Intake registration: creates the order and its crate batch
    /// atomically.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if request.weight_kg < Decimal::ZERO {
            return Err(ServiceError::Validation(
                "weight must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let customer = CustomerEntity::find_by_id(request.customer_id)
            .one(db)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Customer", request.customer_id))?;
        if customer.is_deleted {
            return Err(ServiceError::Conflict(format!(
                "customer {} is deleted",
                customer.id
            )));
        }

        let txn = begin_txn(db).await?;

        let model = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(request.customer_id),
            status: Set(OrderStatus::Created.to_string()),
            weight_kg: Set(request.weight_kg),
            crate_count: Set(request.crate_count),
            declared_pouch_count: Set(request.declared_pouch_count.unwrap_or(0)),
            actual_pouch_count: Set(0),
            declared_box_count: Set(request.declared_box_count.unwrap_or(0)),
            actual_box_count: Set(0),
            total_amount: Set(request.total_amount),
            notes: Set(request.notes),
            is_deleted: Set(false),
            deleted_at: Set(None),
            ready_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };
        let created = model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::Database(e)
        })?;

        CrateService::create_batch(&txn, order_id, request.customer_id, request.crate_count)
            .await?;

        txn.commit().await.map_err(ServiceError::Database)?;

        info!(order_id = %order_id, crates = request.crate_count, "Order registered");
        self.emit(Event::OrderCreated(order_id)).await;
        Ok(created)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        let db = &*self.db_pool;
        OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::Database)
    }

    pub async fn list_orders(&self, page: u64, per_page: u64) -> Result<OrderListPage, ServiceError> {
        let db = &*self.db_pool;
        let paginator = OrderEntity::find()
            .filter(order::Column::IsDeleted.eq(false))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::Database)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::Database)?;

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Advances an order's status through the enforced lifecycle. Backward
    /// moves are conflicts; administrative corrections go through
    /// [`override_status`](Self::override_status).
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;

        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let old_status = OrderStatus::from_str(&current.status)
            .map_err(|_| ServiceError::InvalidStatus(current.status.clone()))?;
        if !old_status.can_advance_to(new_status) {
            return Err(ServiceError::Conflict(format!(
                "status cannot move from '{}' to '{}'",
                old_status, new_status
            )));
        }

        let updated = self
            .apply_status(&txn, current, new_status)
            .await?;
        txn.commit().await.map_err(ServiceError::Database)?;

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
        })
        .await;
        Ok(updated)
    }

    /// Unconditional status set for administrative correction. Bypasses
    /// the lifecycle check on purpose and is logged loudly for the audit
    /// trail.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn override_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;

        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        let old_status = current.status.clone();

        warn!(order_id = %order_id, old_status = %old_status, new_status = %new_status,
            "Order status overridden outside the normal lifecycle");

        let updated = self.apply_status(&txn, current, new_status).await?;
        txn.commit().await.map_err(ServiceError::Database)?;

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: new_status.to_string(),
        })
        .await;
        Ok(updated)
    }

    async fn apply_status(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        current: order::Model,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let version = current.version;
        let mut active: order::ActiveModel = current.into();
        active.status = Set(new_status.to_string());
        if new_status == OrderStatus::ReadyForPickup {
            active.ready_at = Set(Some(Utc::now()));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        active.update(txn).await.map_err(ServiceError::Database)
    }

    /// Marks an order ready for pickup unless it was already picked up.
    /// Returns the number of rows changed (0 or 1), letting callers tell
    /// "already completed or missing" apart from a normal transition.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_ready(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::ReadyForPickup.to_string()),
            )
            .col_expr(order::Column::ReadyAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.ne(OrderStatus::PickedUp.to_string()))
            .exec(db)
            .await
            .map_err(ServiceError::Database)?;

        if result.rows_affected > 0 {
            self.emit(Event::OrderReady(order_id)).await;
        }
        Ok(result.rows_affected)
    }

    /// Unconditional completion: the order left the facility.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_picked_up(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::PickedUp.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .exec(db)
            .await
            .map_err(ServiceError::Database)?;

        if result.rows_affected > 0 {
            self.emit(Event::OrderPickedUp(order_id)).await;
        }
        Ok(result.rows_affected)
    }

    /// Partial update of order fields. A box-count change reconciles the
    /// box rows inside the same transaction; if the reconcile refuses
    /// (boxes already placed), nothing is committed.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order_info(
        &self,
        order_id: Uuid,
        request: UpdateOrderInfoRequest,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;

        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        if let Some(status) = request.status {
            let old_status = OrderStatus::from_str(&current.status)
                .map_err(|_| ServiceError::InvalidStatus(current.status.clone()))?;
            if status != old_status && !old_status.can_advance_to(status) {
                return Err(ServiceError::Conflict(format!(
                    "status cannot move from '{}' to '{}'",
                    old_status, status
                )));
            }
        }

        let box_count_change = request
            .declared_box_count
            .filter(|n| *n != current.declared_box_count);
        let actual_boxes = match box_count_change {
            Some(new_count) => Some(BoxMaterializer::reconcile(&txn, &current, new_count).await?),
            None => None,
        };

        let version = current.version;
        let mut active: order::ActiveModel = current.into();
        if let Some(weight) = request.weight_kg {
            if weight < Decimal::ZERO {
                return Err(ServiceError::Validation(
                    "weight must not be negative".to_string(),
                ));
            }
            active.weight_kg = Set(weight);
        }
        if let Some(status) = request.status {
            active.status = Set(status.to_string());
            if status == OrderStatus::ReadyForPickup {
                active.ready_at = Set(Some(Utc::now()));
            }
        }
        if let Some(n) = request.declared_pouch_count {
            active.declared_pouch_count = Set(n);
        }
        if let Some(n) = request.actual_pouch_count {
            active.actual_pouch_count = Set(n);
        }
        if let Some(n) = request.declared_box_count {
            active.declared_box_count = Set(n);
        }
        if let Some(actual) = actual_boxes {
            active.actual_box_count = Set(actual);
        }
        if let Some(amount) = request.total_amount {
            active.total_amount = Set(amount);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(ServiceError::Database)?;
        txn.commit().await.map_err(ServiceError::Database)?;

        info!(order_id = %order_id, "Order info updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn soft_delete(&self, order_id: Uuid) -> Result<(), ServiceError> {
        self.set_deleted(order_id, true).await?;
        self.emit(Event::OrderSoftDeleted(order_id)).await;
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn restore(&self, order_id: Uuid) -> Result<(), ServiceError> {
        self.set_deleted(order_id, false).await?;
        self.emit(Event::OrderRestored(order_id)).await;
        Ok(())
    }

    async fn set_deleted(&self, order_id: Uuid, deleted: bool) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let mut active: order::ActiveModel = order.into();
        active.is_deleted = Set(deleted);
        active.deleted_at = Set(deleted.then(Utc::now));
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::Database)?;
        Ok(())
    }

    /// Hard-deletes a customer and everything that hangs off them: boxes,
    /// crates and orders are removed in one transaction so no dangling
    /// child survives a crash mid-delete.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn force_delete_customer(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let customer = CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_id))?;

        let txn = begin_txn(db).await?;

        BoxEntity::delete_many()
            .filter(box_unit::Column::CustomerId.eq(customer_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::Database)?;
        CrateEntity::delete_many()
            .filter(crate_unit::Column::CustomerId.eq(customer_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::Database)?;
        OrderEntity::delete_many()
            .filter(order::Column::CustomerId.eq(customer_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::Database)?;
        let active: customer::ActiveModel = customer.into();
        active.delete(&txn).await.map_err(ServiceError::Database)?;

        txn.commit().await.map_err(ServiceError::Database)?;

        info!(customer_id = %customer_id, "Customer force-deleted with cascade");
        self.emit(Event::CustomerForceDeleted(customer_id)).await;
        Ok(())
    }

    /// Queues a ready-for-pickup notification at most once per TTL window.
    /// Best-effort dedup only; returns whether a notification was queued.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn notify_ready(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let order = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let key = format!("notify:{}:{}", order_id, order.status);
        if !self.idempotency.put_if_absent(&key, self.notify_ttl).await {
            info!(order_id = %order_id, "Notification suppressed by idempotency window");
            return Ok(false);
        }

        self.emit(Event::PickupNotificationQueued(order_id)).await;
        Ok(true)
    }
}
