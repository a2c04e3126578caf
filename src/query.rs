//! Event query shapes and the filter predicate shared by the store and live updates.
//!
//! [`EventFilter::condition`] renders the filter as a SeaORM condition for the
//! event store and [`EventFilter::matches`] evaluates the same rules in memory,
//! so polled pages and pushed events agree on what belongs in a list. Keyword
//! case folding is ASCII-only on both sides.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, DbBackend};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::event::{Category, Column, EventRecord};

/// Text columns searched by the keyword filter.
const KEYWORD_COLUMNS: [Column; 4] = [
    Column::DetectionNode,
    Column::SendNode,
    Column::SendNodeType,
    Column::ReceiveNode,
];

/// Filter applied to both retrieval strategies.
///
/// `start_time` is inclusive and `end_time` exclusive. An empty category set
/// selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(rename = "category", default)]
    #[schema(value_type = Vec<u8>, example = json!([1, 2, 3]))]
    pub categories: BTreeSet<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn all_categories() -> Self {
        Self {
            categories: Category::ALL.into_iter().collect(),
            ..Default::default()
        }
    }

    /// True when no row can match, so the store need not be queried.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Trimmed, ASCII-lower-cased keyword; blank keywords are treated as absent.
    pub fn normalized_keyword(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// SQL predicate for this filter as run on `backend`.
    pub fn condition(&self, backend: DbBackend) -> Condition {
        let mut condition =
            Condition::all().add(Column::Category.is_in(self.categories.iter().copied()));

        if let Some(keyword) = self.normalized_keyword() {
            let pattern = format!("%{}%", escape_like(&keyword));
            let any_column = KEYWORD_COLUMNS.iter().fold(Condition::any(), |acc, column| {
                acc.add(
                    Expr::expr(ascii_lower(*column, backend))
                        .like(LikeExpr::new(pattern.clone()).escape('\\')),
                )
            });
            condition = condition.add(any_column);
        }

        if let Some(start) = self.start_time {
            condition = condition.add(Column::CreatedAt.gte(start));
        }

        if let Some(end) = self.end_time {
            condition = condition.add(Column::CreatedAt.lt(end));
        }

        condition
    }

    /// In-memory evaluation of [`EventFilter::condition`].
    pub fn matches(&self, event: &EventRecord) -> bool {
        if !self.categories.contains(&event.category) {
            return false;
        }

        if let Some(keyword) = self.normalized_keyword() {
            let fields = [
                event.detection_node.as_str(),
                event.send_node.as_str(),
                event.send_node_type.as_str(),
                event.receive_node.as_str(),
            ];
            if !fields
                .iter()
                .any(|field| field.to_ascii_lowercase().contains(&keyword))
            {
                return false;
            }
        }

        if self.start_time.is_some_and(|start| event.created_at < start) {
            return false;
        }

        if self.end_time.is_some_and(|end| event.created_at >= end) {
            return false;
        }

        true
    }
}

/// `LOWER(column)` restricted to ASCII letters. SQLite's `LOWER` already is;
/// Postgres needs the "C" collation to stop it folding other scripts.
fn ascii_lower(column: Column, backend: DbBackend) -> SimpleExpr {
    match backend {
        DbBackend::Postgres => Expr::cust_with_exprs(
            "LOWER($1 COLLATE \"C\")",
            [SimpleExpr::from(Expr::col(column))],
        ),
        _ => Func::lower(Expr::col(column)).into(),
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Offset pagination request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagingQuery {
    /// 1-based page number
    #[schema(example = 1, minimum = 1)]
    pub page: u64,
    #[schema(example = 20, minimum = 1)]
    pub size: u64,
    #[serde(flatten)]
    pub filter: EventFilter,
}

impl PagingQuery {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }

    /// Row offset of this page, or `None` when it exceeds what SQL `OFFSET` accepts.
    pub fn checked_offset(&self) -> Option<u64> {
        self.page
            .checked_sub(1)?
            .checked_mul(self.size)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

/// Cursor ("load more") request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoreQuery {
    #[schema(example = 20, minimum = 1)]
    pub size: u64,
    /// `createdAt` of the last event already shown; only strictly older rows are returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_record_created_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub filter: EventFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationEvents {
    pub total_records: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub list_event: Vec<EventRecord>,
}

impl PaginationEvents {
    pub fn empty(page: u64) -> Self {
        Self {
            total_records: 0,
            total_pages: 0,
            current_page: page,
            list_event: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoreEvents {
    pub has_next: bool,
    pub list_event: Vec<EventRecord>,
}

impl LoadMoreEvents {
    pub fn empty() -> Self {
        Self {
            has_next: false,
            list_event: Vec::new(),
        }
    }

    /// Builds a page from a `size + 1` probe, trimming the extra row.
    pub fn from_probe(mut rows: Vec<EventRecord>, size: u64) -> Self {
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let has_next = rows.len() > size;
        rows.truncate(size);
        Self {
            has_next,
            list_event: rows,
        }
    }
}

pub fn total_pages(total_records: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    total_records.div_ceil(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::DeviceType;
    use chrono::TimeZone;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};
    use serde_json::json;
    use uuid::Uuid;

    fn event(category: Category, send_node: &str, at: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            category,
            detection_node: send_node.to_string(),
            send_node: send_node.to_string(),
            send_node_type: DeviceType::Rsu,
            receive_node: "EDGE1".to_string(),
            event_info: json!({}),
            created_at: at,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn filter_deserializes_from_wire_shape() {
        let query: PagingQuery = serde_json::from_value(json!({
            "page": 2,
            "size": 10,
            "category": [1, 3],
            "keyword": "rsu",
            "startTime": "2024-05-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(query.offset(), 10);
        assert_eq!(
            query.filter.categories,
            BTreeSet::from([Category::AvailabilityStatusTransfer, Category::Communication])
        );
        assert_eq!(query.filter.start_time, Some(at(0)));
        assert_eq!(query.filter.end_time, None);
    }

    #[test]
    fn matches_requires_category_membership() {
        let filter = EventFilter {
            categories: BTreeSet::from([Category::Virus]),
            ..Default::default()
        };
        assert!(filter.matches(&event(Category::Virus, "RSU1", at(1))));
        assert!(!filter.matches(&event(Category::Communication, "RSU1", at(1))));
        assert!(!EventFilter::default().matches(&event(Category::Virus, "RSU1", at(1))));
    }

    #[test]
    fn keyword_is_case_insensitive_substring_over_node_fields() {
        let mut filter = EventFilter::all_categories();
        filter.keyword = Some("  rsu ".to_string());
        assert!(filter.matches(&event(Category::Virus, "RSU12", at(1))));

        filter.keyword = Some("edge".to_string());
        assert!(filter.matches(&event(Category::Virus, "RSU12", at(1))));

        filter.keyword = Some("obu".to_string());
        assert!(!filter.matches(&event(Category::Virus, "RSU12", at(1))));

        filter.keyword = Some("   ".to_string());
        assert!(filter.matches(&event(Category::Virus, "RSU12", at(1))));
    }

    #[test]
    fn time_bounds_are_start_inclusive_end_exclusive() {
        let mut filter = EventFilter::all_categories();
        filter.start_time = Some(at(2));
        filter.end_time = Some(at(4));

        assert!(!filter.matches(&event(Category::Virus, "A", at(1))));
        assert!(filter.matches(&event(Category::Virus, "A", at(2))));
        assert!(filter.matches(&event(Category::Virus, "A", at(3))));
        assert!(!filter.matches(&event(Category::Virus, "A", at(4))));
    }

    #[test]
    fn condition_renders_lowercase_like_with_escape() {
        let mut filter = EventFilter::all_categories();
        filter.keyword = Some("50%_Off".to_string());
        let sql = crate::models::event::Entity::find()
            .filter(filter.condition(DbBackend::Sqlite))
            .build(DbBackend::Sqlite)
            .to_string();

        assert!(sql.contains("LOWER(\"detection_node\")"), "{sql}");
        assert!(sql.contains("_off%"), "{sql}");
        assert!(!sql.contains("_Off"), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");
        assert!(sql.contains("\"category\" IN (1, 2, 3)"), "{sql}");
    }

    #[test]
    fn postgres_condition_folds_ascii_only() {
        let mut filter = EventFilter::all_categories();
        filter.keyword = Some("rsu".to_string());
        let sql = crate::models::event::Entity::find()
            .filter(filter.condition(DbBackend::Postgres))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains("LOWER(\"detection_node\" COLLATE \"C\")"), "{sql}");
    }

    #[test]
    fn keyword_folding_leaves_non_ascii_letters_alone() {
        let upper = event(Category::Virus, "ÄRSU1", at(1));
        let mut filter = EventFilter::all_categories();

        filter.keyword = Some("ärsu".to_string());
        assert!(!filter.matches(&upper));

        filter.keyword = Some("ÄRSU".to_string());
        assert!(filter.matches(&upper));
        assert_eq!(filter.normalized_keyword().as_deref(), Some("Ärsu"));
    }

    #[test]
    fn checked_offset_rejects_unrepresentable_pages() {
        let query = |page| PagingQuery {
            page,
            size: 20,
            filter: EventFilter::all_categories(),
        };
        assert_eq!(query(1).checked_offset(), Some(0));
        assert_eq!(query(3).checked_offset(), Some(40));
        assert_eq!(query(0).checked_offset(), None);
        assert_eq!(query(u64::MAX).checked_offset(), None);
        assert_eq!(query(i64::MAX as u64 / 10).checked_offset(), None);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn load_more_probe_trims_extra_row() {
        let rows: Vec<_> = (0..4)
            .map(|h| event(Category::Virus, "A", at(h)))
            .collect();

        let page = LoadMoreEvents::from_probe(rows.clone(), 3);
        assert!(page.has_next);
        assert_eq!(page.list_event.len(), 3);

        let page = LoadMoreEvents::from_probe(rows[..3].to_vec(), 3);
        assert!(!page.has_next);
        assert_eq!(page.list_event.len(), 3);
    }
}
