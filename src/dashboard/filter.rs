//! List Filter/Cursor Logic
//!
//! Maps the event list filter form onto a paging or load-more request, and
//! decides whether a pushed event belongs in the list currently displayed.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::models::event::{Category, EventRecord};
use crate::query::{EventFilter, LoadMoreQuery, PagingQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Paging,
    LoadMore,
}

/// Filter form as edited by the user.
///
/// Category ids are the checkbox values ("1", "2", "3"); the date range is a
/// pair of calendar days in UTC, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEventForm {
    pub keyword: String,
    pub date_range: (Option<NaiveDate>, Option<NaiveDate>),
    pub category_ids: Vec<String>,
    pub page: u64,
    pub size: u64,
    pub last_record_created_time: Option<DateTime<Utc>>,
}

impl Default for ListEventForm {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            date_range: (None, None),
            category_ids: Category::ALL.iter().map(|c| c.id().to_string()).collect(),
            page: 1,
            size: 20,
            last_record_created_time: None,
        }
    }
}

impl ListEventForm {
    pub fn categories(&self) -> BTreeSet<Category> {
        self.category_ids
            .iter()
            .filter_map(|id| id.trim().parse::<u8>().ok())
            .filter_map(|id| Category::try_from(id).ok())
            .collect()
    }

    /// Filter described by the form, or `None` while the date range is half filled or reversed.
    pub fn filter(&self) -> Option<EventFilter> {
        let (start_time, end_time) = match self.date_range {
            (None, None) => (None, None),
            (Some(start), Some(end)) if start <= end => {
                let end = end.checked_add_days(Days::new(1))?;
                (Some(start_of_day(start)), Some(start_of_day(end)))
            }
            _ => return None,
        };

        let keyword = self.keyword.trim();
        Some(EventFilter {
            categories: self.categories(),
            keyword: (!keyword.is_empty()).then(|| keyword.to_string()),
            start_time,
            end_time,
        })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListEventRequest {
    Paging(PagingQuery),
    LoadMore(LoadMoreQuery),
}

impl ListEventRequest {
    pub fn filter(&self) -> &EventFilter {
        match self {
            ListEventRequest::Paging(query) => &query.filter,
            ListEventRequest::LoadMore(query) => &query.filter,
        }
    }
}

/// Builds the request for `mode`; `None` means no query must be issued.
pub fn build_request(form: &ListEventForm, mode: ListMode) -> Option<ListEventRequest> {
    if form.size == 0 {
        return None;
    }
    let filter = form.filter()?;

    match mode {
        ListMode::Paging => {
            if form.page == 0 {
                return None;
            }
            Some(ListEventRequest::Paging(PagingQuery {
                page: form.page,
                size: form.size,
                filter,
            }))
        }
        ListMode::LoadMore => Some(ListEventRequest::LoadMore(LoadMoreQuery {
            size: form.size,
            last_record_created_time: form.last_record_created_time,
            filter,
        })),
    }
}

/// Whether a pushed event belongs in a list showing `filter`.
pub fn is_socket_event_valid(event: &EventRecord, filter: &EventFilter) -> bool {
    filter.matches(event)
}
