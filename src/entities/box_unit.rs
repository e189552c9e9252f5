use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Packaged box, the unit physically placed on a pallet or shelf.
///
/// The primary key is the printed label. `order_id` is the authoritative
/// link to the originating order; legacy rows created before that column
/// existed are resolved through the identifier codec or, failing that,
/// through `customer_id`. At most one of `pallet_id` / `shelf_id` is set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "boxes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub order_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub pallet_id: Option<Uuid>,
    pub shelf_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_placed(&self) -> bool {
        self.pallet_id.is_some() || self.shelf_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::pallet::Entity",
        from = "Column::PalletId",
        to = "super::pallet::Column::Id"
    )]
    Pallet,
    #[sea_orm(
        belongs_to = "super::shelf::Entity",
        from = "Column::ShelfId",
        to = "super::shelf::Column::Id"
    )]
    Shelf,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::pallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pallet.def()
    }
}

impl Related<super::shelf::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shelf.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
