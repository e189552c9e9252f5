use crate::{
    db::{begin_txn, DbPool},
    entities::crate_unit::{self, Entity as CrateEntity},
    errors::ServiceError,
    ids,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Manages an order's crate batch: the N physical crates registered at
/// intake, labelled `CRATE_<order>_<i>` with position `"i/N"`.
#[derive(Clone)]
pub struct CrateService {
    db_pool: Arc<DbPool>,
}

impl CrateService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Inserts crates `1..=count` for an order on the given connection, so
    /// intake registration can run it inside the order-creation
    /// transaction. Positions are stamped `"i/count"`.
    pub async fn create_batch<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        customer_id: Uuid,
        count: i32,
    ) -> Result<Vec<String>, ServiceError> {
        let now = Utc::now();
        let mut ids_out = Vec::with_capacity(count.max(0) as usize);
        let mut models = Vec::with_capacity(count.max(0) as usize);

        for i in 1..=count.max(0) {
            let id = ids::encode_crate_id(order_id, i as u32);
            ids_out.push(id.clone());
            models.push(crate_unit::ActiveModel {
                id: Set(id),
                order_id: Set(order_id),
                customer_id: Set(customer_id),
                status: Set(crate_unit::STATUS_CREATED.to_string()),
                position: Set(format!("{}/{}", i, count)),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            });
        }

        if !models.is_empty() {
            CrateEntity::insert_many(models)
                .exec(conn)
                .await
                .map_err(ServiceError::Database)?;
        }
        Ok(ids_out)
    }

    /// Resizes an order's crate batch to `new_count`.
    ///
    /// Growing inserts the missing sequences. Shrinking is only permitted
    /// while every removed crate is still in its initial `Created` status;
    /// otherwise the whole resize rolls back with a conflict. Surviving
    /// positions are renumbered to `"i/new_count"`.
    #[instrument(skip(self), fields(order_id = %order_id, new_count = new_count))]
    pub async fn resize(&self, order_id: Uuid, new_count: i32) -> Result<(), ServiceError> {
        if new_count < 0 {
            return Err(ServiceError::Validation(
                "crate count must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = begin_txn(db).await?;
        let now = Utc::now();

        let existing = CrateEntity::find()
            .filter(crate_unit::Column::OrderId.eq(order_id))
            .order_by_asc(crate_unit::Column::Id)
            .all(&txn)
            .await
            .map_err(ServiceError::Database)?;
        let old_count = existing.len() as i32;

        let customer_id = match existing.first() {
            Some(c) => c.customer_id,
            None if new_count == 0 => {
                txn.commit().await.map_err(ServiceError::Database)?;
                return Ok(());
            }
            None => {
                return Err(ServiceError::not_found("Crate batch for order", order_id));
            }
        };

        if new_count < old_count {
            // Crates beyond the new count have deterministic labels.
            let removed: Vec<String> = (new_count + 1..=old_count)
                .map(|i| ids::encode_crate_id(order_id, i as u32))
                .collect();
            let blocked = existing.iter().any(|c| {
                removed.contains(&c.id) && c.status != crate_unit::STATUS_CREATED
            });
            if blocked {
                return Err(ServiceError::Conflict(
                    "cannot shrink crate batch: removed crates are no longer in Created status"
                        .to_string(),
                ));
            }
            CrateEntity::delete_many()
                .filter(crate_unit::Column::Id.is_in(removed))
                .exec(&txn)
                .await
                .map_err(ServiceError::Database)?;
        } else if new_count > old_count {
            let mut models = Vec::with_capacity((new_count - old_count) as usize);
            for i in old_count + 1..=new_count {
                models.push(crate_unit::ActiveModel {
                    id: Set(ids::encode_crate_id(order_id, i as u32)),
                    order_id: Set(order_id),
                    customer_id: Set(customer_id),
                    status: Set(crate_unit::STATUS_CREATED.to_string()),
                    position: Set(format!("{}/{}", i, new_count)),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                });
            }
            CrateEntity::insert_many(models)
                .exec(&txn)
                .await
                .map_err(ServiceError::Database)?;
        }

        // Keep every surviving position consistent with the new batch size.
        for i in 1..=new_count.min(old_count) {
            let id = ids::encode_crate_id(order_id, i as u32);
            let mut active: crate_unit::ActiveModel = Default::default();
            active.id = Set(id);
            active.position = Set(format!("{}/{}", i, new_count));
            active.updated_at = Set(Some(now));
            active.update(&txn).await.map_err(ServiceError::Database)?;
        }

        txn.commit().await.map_err(ServiceError::Database)?;
        info!(old_count, new_count, "Crate batch resized");
        Ok(())
    }

    /// All crates belonging to an order, in label order.
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<crate_unit::Model>, ServiceError> {
        let db = &*self.db_pool;
        CrateEntity::find()
            .filter(crate_unit::Column::OrderId.eq(order_id))
            .order_by_asc(crate_unit::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::Database)
    }
}
