//! # Event Repository
//!
//! Executes the event queries: offset paging with a concurrent total count,
//! cursor paging with a one-row probe, inserts, and age-based pruning of
//! availability telemetry.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::event::{
    ActiveModel as EventActiveModel, Category, Column, Entity as Event, EventData, EventRecord,
};
use crate::query::{
    EventFilter, LoadMoreEvents, LoadMoreQuery, PaginationEvents, PagingQuery, total_pages,
};

/// Repository for event database operations
pub struct EventRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> EventRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    fn filtered(&self, filter: &EventFilter) -> Select<Event> {
        Event::find().filter(filter.condition(self.db.get_database_backend()))
    }

    fn newest_first(select: Select<Event>) -> Select<Event> {
        select
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
    }

    /// Offset pagination. The page rows and the total count share one predicate
    /// and are fetched concurrently.
    pub async fn find_all_paging(
        &self,
        query: &PagingQuery,
    ) -> Result<PaginationEvents, RepositoryError> {
        if query.filter.is_empty() {
            return Ok(PaginationEvents::empty(query.page));
        }

        let select = self.filtered(&query.filter);
        let rows = Self::newest_first(select.clone())
            .offset(query.offset())
            .limit(query.size)
            .all(self.db);
        let count = select.count(self.db);

        let (rows, total_records) =
            tokio::try_join!(rows, count).map_err(RepositoryError::database_error)?;

        Ok(PaginationEvents {
            total_records,
            total_pages: total_pages(total_records, query.size),
            current_page: query.page,
            list_event: rows.into_iter().map(EventRecord::from).collect(),
        })
    }

    /// Cursor pagination over rows strictly older than `last_record_created_time`.
    pub async fn find_all_load_more(
        &self,
        query: &LoadMoreQuery,
    ) -> Result<LoadMoreEvents, RepositoryError> {
        if query.filter.is_empty() {
            return Ok(LoadMoreEvents::empty());
        }

        let mut select = self.filtered(&query.filter);
        if let Some(cursor) = query.last_record_created_time {
            select = select.filter(Column::CreatedAt.lt(cursor));
        }

        let rows = Self::newest_first(select)
            .limit(query.size.saturating_add(1))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(LoadMoreEvents::from_probe(
            rows.into_iter().map(EventRecord::from).collect(),
            query.size,
        ))
    }

    /// Persists a new event stamped with `created_at`.
    pub async fn insert(
        &self,
        data: EventData,
        created_at: DateTime<Utc>,
    ) -> Result<EventRecord, RepositoryError> {
        let model = EventActiveModel {
            id: Set(Uuid::new_v4()),
            category: Set(data.category),
            detection_node: Set(data.detection_node),
            send_node: Set(data.send_node),
            send_node_type: Set(data.send_node_type),
            receive_node: Set(data.receive_node),
            event_info: Set(data.event_info),
            created_at: Set(created_at.fixed_offset()),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)?;

        Ok(model.into())
    }

    /// Deletes availability events created before `cutoff`. Other categories are kept.
    pub async fn delete_before_time(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = Event::delete_many()
            .filter(Column::Category.eq(Category::AvailabilityStatusTransfer))
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EventRecord>, RepositoryError> {
        let model = Event::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(model.map(EventRecord::from))
    }
}
