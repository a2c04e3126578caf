//! Edge entity model
//!
//! Site gateways at the top of the device hierarchy.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "edge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rsu::Entity")]
    Rsu,
}

impl Related<super::rsu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rsu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
