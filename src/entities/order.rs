use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An intake order: one customer's batch of raw material moving through
/// pressing, pouching and boxing until pickup.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub weight_kg: Decimal,
    pub crate_count: i32,
    /// Operator-declared pouch count; 0 means not declared.
    pub declared_pouch_count: i32,
    /// Pouches actually filled by production.
    pub actual_pouch_count: i32,
    /// Declared or previously computed box count; 0 means not yet known.
    /// Doubles as the persisted override consulted by the materializer.
    pub declared_box_count: i32,
    /// Box rows that actually exist, maintained by the materializer.
    pub actual_box_count: i32,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::crate_unit::Entity")]
    Crates,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::crate_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Crates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
