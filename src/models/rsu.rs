//! RSU entity model
//!
//! Roadside units belong to one edge and carry the latest telemetry reported
//! by availability events.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rsu")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub edge_id: i32,

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
        belongs_to = "super::edge::Entity",
        from = "Column::EdgeId",
        to = "super::edge::Column::Id"
    )]
    Edge,
    #[sea_orm(has_many = "super::obu::Entity")]
    Obu,
}

impl Related<super::edge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Edge.def()
    }
}

impl Related<super::obu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
