//! OBU entity model
//!
//! On-board units attached to a roadside unit.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "obu")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub rsu_id: i32,

    pub cpu: f64,

    pub ram: f64,

    pub tx: f64,

    pub rx: f64,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rsu::Entity",
        from = "Column::RsuId",
        to = "super::rsu::Column::Id"
    )]
    Rsu,
}

impl Related<super::rsu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rsu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
