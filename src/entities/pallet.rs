use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Physical carrier holding boxes. `holding` is maintained under row locks
/// and repaired by recount; `status` is always derived from holding vs
/// capacity. A pallet placed on a shelf occupies exactly one shelf slot.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tag: String,
    pub capacity: i32,
    pub holding: i32,
    pub location: String,
    pub status: String,
    pub shelf_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::box_unit::Entity")]
    Boxes,
    #[sea_orm(
        belongs_to = "super::shelf::Entity",
        from = "Column::ShelfId",
        to = "super::shelf::Column::Id"
    )]
    Shelf,
}

impl Related<super::box_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Boxes.def()
    }
}

impl Related<super::shelf::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shelf.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
