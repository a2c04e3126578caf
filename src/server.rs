//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the fleet monitor API.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderName, Method},
    middleware,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::ingest::EventIngest;
use crate::models::event::EventRecord;
use crate::retention::RetentionSweeper;
use crate::telemetry::{self, REQUEST_ID_HEADER};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub ingest: EventIngest,
}

impl AppState {
    /// Builds the state together with the real-time event channel.
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Self {
        let (events, _) = broadcast::channel::<EventRecord>(config.event_channel_capacity);
        let ingest = EventIngest::new(db.clone(), events);
        Self { config, db, ingest }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("content-type"), REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER])
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/events", post(handlers::events::create_event))
        .route("/events/paging", post(handlers::events::find_all_paging))
        .route("/events/load-more", post(handlers::events::find_all_load_more))
        .route(
            "/events/availability",
            delete(handlers::events::delete_availability_before),
        )
        .route(
            "/devices/relationship",
            get(handlers::devices::relationship),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Serves the API and runs the retention sweep until `shutdown` fires.
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> Result<()> {
    let state = AppState::new(Arc::clone(&config), db);

    let sweeper = RetentionSweeper::new(Arc::new(config.retention.clone()), state.ingest.clone());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.child_token()));

    let app = create_app(state);

    let addr = config.bind_addr().context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, profile = %config.profile, "Server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(err) = sweeper_handle.await {
        tracing::warn!(error = ?err, "Retention sweeper task ended abnormally");
    }

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::events::create_event,
        crate::handlers::events::find_all_paging,
        crate::handlers::events::find_all_load_more,
        crate::handlers::events::delete_availability_before,
        crate::handlers::devices::relationship,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::models::event::EventData,
            crate::models::event::EventRecord,
            crate::models::event::DeviceType,
            crate::models::event::AvailabilityInfo,
            crate::models::event::NicInfo,
            crate::models::event::VirusInfo,
            crate::models::event::CommunicationInfo,
            crate::query::EventFilter,
            crate::query::PagingQuery,
            crate::query::LoadMoreQuery,
            crate::query::PaginationEvents,
            crate::query::LoadMoreEvents,
            crate::handlers::events::DeleteResult,
            crate::models::hierarchy::DeviceHierarchy,
            crate::models::hierarchy::EdgeNode,
            crate::models::hierarchy::RsuNode,
            crate::models::hierarchy::ObuNode,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "events", description = "Device event log"),
        (name = "devices", description = "Device hierarchy"),
    ),
    info(
        title = "Fleet Monitor API",
        description = "Device event log and hierarchy for the fleet monitoring dashboard",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
