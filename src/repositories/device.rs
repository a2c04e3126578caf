//! # Device Repository
//!
//! Telemetry updates addressed by device name and the nested edge → RSU → OBU
//! hierarchy used to draw the dashboard diagram.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::error::RepositoryError;
use crate::models::event::AvailabilityInfo;
use crate::models::hierarchy::{DeviceHierarchy, EdgeNode, ObuNode, RsuNode};
use crate::models::{Edge, Obu, Rsu, edge, obu, rsu};

/// Which table, if any, absorbed a telemetry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryTarget {
    Rsu,
    Obu,
    NotFound,
}

/// Repository for device database operations
pub struct DeviceRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> DeviceRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Overwrites cpu, ram, tx and rx on the RSU or OBU called `name`.
    ///
    /// RSUs are tried first. A name matching neither table is not an error.
    pub async fn update_telemetry_by_name(
        &self,
        name: &str,
        info: &AvailabilityInfo,
    ) -> Result<TelemetryTarget, RepositoryError> {
        let now = Utc::now().fixed_offset();

        let updated = Rsu::update_many()
            .col_expr(rsu::Column::Cpu, Expr::value(info.cpu))
            .col_expr(rsu::Column::Ram, Expr::value(info.ram))
            .col_expr(rsu::Column::Tx, Expr::value(info.nic.tx))
            .col_expr(rsu::Column::Rx, Expr::value(info.nic.rx))
            .col_expr(rsu::Column::UpdatedAt, Expr::value(now))
            .filter(rsu::Column::Name.eq(name))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if updated.rows_affected > 0 {
            return Ok(TelemetryTarget::Rsu);
        }

        let updated = Obu::update_many()
            .col_expr(obu::Column::Cpu, Expr::value(info.cpu))
            .col_expr(obu::Column::Ram, Expr::value(info.ram))
            .col_expr(obu::Column::Tx, Expr::value(info.nic.tx))
            .col_expr(obu::Column::Rx, Expr::value(info.nic.rx))
            .col_expr(obu::Column::UpdatedAt, Expr::value(now))
            .filter(obu::Column::Name.eq(name))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if updated.rows_affected > 0 {
            return Ok(TelemetryTarget::Obu);
        }

        Ok(TelemetryTarget::NotFound)
    }

    /// Loads every edge with its RSUs and their OBUs, each level ordered by id.
    pub async fn load_hierarchy(&self) -> Result<DeviceHierarchy, RepositoryError> {
        let (edges, rsus, obus) = tokio::try_join!(
            Edge::find().order_by_asc(edge::Column::Id).all(self.db),
            Rsu::find().order_by_asc(rsu::Column::Id).all(self.db),
            Obu::find().order_by_asc(obu::Column::Id).all(self.db),
        )
        .map_err(RepositoryError::database_error)?;

        let mut obus_by_rsu: HashMap<i32, Vec<ObuNode>> = HashMap::new();
        for obu in obus {
            obus_by_rsu.entry(obu.rsu_id).or_default().push(ObuNode {
                id: obu.id,
                name: obu.name,
                cpu: obu.cpu,
                ram: obu.ram,
                tx: obu.tx,
                rx: obu.rx,
            });
        }

        let mut rsus_by_edge: HashMap<i32, Vec<RsuNode>> = HashMap::new();
        for rsu in rsus {
            rsus_by_edge.entry(rsu.edge_id).or_default().push(RsuNode {
                list_obu: obus_by_rsu.remove(&rsu.id).unwrap_or_default(),
                id: rsu.id,
                name: rsu.name,
                cpu: rsu.cpu,
                ram: rsu.ram,
                tx: rsu.tx,
                rx: rsu.rx,
            });
        }

        let list_edge = edges
            .into_iter()
            .map(|edge| EdgeNode {
                list_rsu: rsus_by_edge.remove(&edge.id).unwrap_or_default(),
                id: edge.id,
                name: edge.name,
            })
            .collect();

        Ok(DeviceHierarchy { list_edge })
    }
}
