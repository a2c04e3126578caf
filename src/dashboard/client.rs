//! HTTP client for the event query and device endpoints.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::hierarchy::DeviceHierarchy;
use crate::query::{LoadMoreEvents, LoadMoreQuery, PaginationEvents, PagingQuery};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

/// Read side of the backend used by the dashboard views.
#[async_trait]
pub trait EventQueryClient: Send + Sync {
    async fn paging(&self, query: &PagingQuery) -> Result<PaginationEvents, ClientError>;

    async fn load_more(&self, query: &LoadMoreQuery) -> Result<LoadMoreEvents, ClientError>;

    async fn relationship(&self) -> Result<DeviceHierarchy, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpEventClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpEventClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last path segment unless it ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let response = self.http.get(url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, message });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

#[async_trait]
impl EventQueryClient for HttpEventClient {
    async fn paging(&self, query: &PagingQuery) -> Result<PaginationEvents, ClientError> {
        self.post("events/paging", query).await
    }

    async fn load_more(&self, query: &LoadMoreQuery) -> Result<LoadMoreEvents, ClientError> {
        self.post("events/load-more", query).await
    }

    async fn relationship(&self) -> Result<DeviceHierarchy, ClientError> {
        self.get("devices/relationship").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EventFilter;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn paging_posts_filter_and_decodes_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/events/paging"))
            .and(body_partial_json(json!({"page": 2, "size": 5, "category": [2]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalRecords": 7,
                "totalPages": 2,
                "currentPage": 2,
                "listEvent": []
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpEventClient::new(&format!("{}/api", mock_server.uri())).unwrap();
        let mut filter = EventFilter::default();
        filter.categories.insert(crate::models::event::Category::Virus);

        let page = client
            .paging(&PagingQuery {
                page: 2,
                size: 5,
                filter,
            })
            .await
            .unwrap();
        assert_eq!(page.total_records, 7);
        assert_eq!(page.current_page, 2);
    }

    #[tokio::test]
    async fn load_more_sends_cursor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/events/load-more"))
            .and(body_partial_json(json!({
                "size": 3,
                "lastRecordCreatedTime": "2024-05-01T10:00:00Z"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"hasNext": true, "listEvent": []})),
            )
            .mount(&mock_server)
            .await;

        let client = HttpEventClient::new(&mock_server.uri()).unwrap();
        let page = client
            .load_more(&LoadMoreQuery {
                size: 3,
                last_record_created_time: Some("2024-05-01T10:00:00Z".parse().unwrap()),
                filter: EventFilter::all_categories(),
            })
            .await
            .unwrap();
        assert!(page.has_next);
    }

    #[tokio::test]
    async fn error_status_and_bad_body_are_distinguished() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/events/paging"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/devices/relationship"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = HttpEventClient::new(&mock_server.uri()).unwrap();
        let err = client
            .paging(&PagingQuery {
                page: 1,
                size: 10,
                filter: EventFilter::all_categories(),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, ClientError::Status { status: 503, ref message } if message == "down")
        );

        let err = client.relationship().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpEventClient::new("not a url"),
            Err(ClientError::Url(_))
        ));
    }
}
