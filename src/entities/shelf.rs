use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage shelf. Holds pallets (one slot each) or, at branches using the
/// direct-to-shelf flow, boxes without an intermediate pallet.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shelves")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tag: String,
    pub capacity: i32,
    pub holding: i32,
    pub location: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pallet::Entity")]
    Pallets,
    #[sea_orm(has_many = "super::box_unit::Entity")]
    Boxes,
}

impl Related<super::pallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
