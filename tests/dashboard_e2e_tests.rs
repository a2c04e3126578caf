//! End-to-end tests driving the dashboard logic against a served API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fleet_monitor::config::AppConfig;
use fleet_monitor::dashboard::{
    ChannelNotifier, DashboardSession, DashboardTimings, EventQueryClient, HttpEventClient,
    ListController, ListEventForm, ListMode, NodeStatus, NotificationCode,
};
use fleet_monitor::ingest::EventIngest;
use fleet_monitor::models::event::{Category, DeviceType};
use fleet_monitor::server::{AppState, create_app};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{event_data, seed_hierarchy, setup_test_db};

const WAIT: Duration = Duration::from_secs(5);

fn fast_timings() -> DashboardTimings {
    DashboardTimings {
        blink: Duration::from_millis(150),
        connection_change: Duration::from_millis(80),
        diagram_debounce: Duration::from_millis(20),
        filter_debounce: Duration::from_millis(20),
    }
}

/// Serves the API on an ephemeral port and returns its base URL with the ingest side.
async fn serve() -> Result<(String, EventIngest)> {
    let db = setup_test_db().await?;
    seed_hierarchy(&db).await?;

    let state = AppState::new(Arc::new(AppConfig::default()), db);
    let ingest = state.ingest.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, create_app(state)).await;
    });

    Ok((format!("http://{addr}"), ingest))
}

async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, predicate: F) -> Result<()>
where
    F: FnMut(&T) -> bool,
{
    timeout(WAIT, rx.wait_for(predicate)).await??;
    Ok(())
}

#[tokio::test]
async fn relationship_is_served_over_http() -> Result<()> {
    let (base_url, _ingest) = serve().await?;
    let client = HttpEventClient::new(&base_url)?;

    let hierarchy = client.relationship().await?;
    assert_eq!(hierarchy.list_edge.len(), 2);
    assert_eq!(hierarchy.list_edge[0].list_rsu[0].list_obu.len(), 2);
    Ok(())
}

#[tokio::test]
async fn virus_event_blinks_the_device_in_the_diagram() -> Result<()> {
    let (base_url, ingest) = serve().await?;
    let client = HttpEventClient::new(&base_url)?;
    let (notifier, mut notifications) = ChannelNotifier::channel();

    let session = DashboardSession::connect(
        &client,
        ingest.subscribe(),
        Arc::new(notifier),
        fast_timings(),
    )
    .await?;
    assert_eq!(session.current().len(), 9);

    let mut diagram = session.diagram();
    let created = ingest
        .create(event_data(
            Category::Virus,
            "RSU1",
            DeviceType::Rsu,
            "EDGE1",
            json!({"fileName": "worm.exe"}),
        ))
        .await?;

    wait_until(&mut diagram, |nodes| {
        nodes
            .iter()
            .any(|node| node.id == "RSU1" && node.node_status == Some(NodeStatus::VirusExceed))
    })
    .await?;

    let notification = timeout(WAIT, notifications.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("notifier closed"))?;
    assert_eq!(notification.code, NotificationCode::NewEvent);
    assert_eq!(notification.event_id, Some(created.id));

    wait_until(&mut diagram, |nodes| {
        nodes
            .iter()
            .any(|node| node.id == "RSU1" && node.node_status.is_none())
    })
    .await?;

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn load_more_list_fetches_over_http_and_prepends_live_events() -> Result<()> {
    let (base_url, ingest) = serve().await?;
    for name in ["a.exe", "b.exe", "c.exe"] {
        ingest
            .create(event_data(
                Category::Virus,
                "RSU2",
                DeviceType::Rsu,
                "EDGE1",
                json!({"fileName": name}),
            ))
            .await?;
    }

    let client = Arc::new(HttpEventClient::new(&base_url)?);
    let (notifier, _notifications) = ChannelNotifier::channel();
    let list = ListController::spawn(
        client,
        Arc::new(notifier),
        ListMode::LoadMore,
        ListEventForm::default(),
        ingest.subscribe(),
        fast_timings().filter_debounce,
    );

    let mut state = list.state();
    wait_until(&mut state, |s| !s.loading && s.items.len() == 3).await?;
    assert!(!list.current().has_next);

    let live = ingest
        .create(event_data(
            Category::Communication,
            "OBU1",
            DeviceType::Obu,
            "RSU1",
            json!({"info": "turn around"}),
        ))
        .await?;

    wait_until(&mut state, |s| s.items.len() == 4).await?;
    assert_eq!(list.current().items[0].id, live.id);

    list.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn paging_list_follows_page_changes() -> Result<()> {
    let (base_url, ingest) = serve().await?;
    for i in 0..5 {
        ingest
            .create(event_data(
                Category::Virus,
                "RSU3",
                DeviceType::Rsu,
                "EDGE2",
                json!({"fileName": format!("{i}.exe")}),
            ))
            .await?;
    }

    let client = Arc::new(HttpEventClient::new(&base_url)?);
    let (notifier, _notifications) = ChannelNotifier::channel();
    let form = ListEventForm {
        size: 2,
        ..Default::default()
    };
    let list = ListController::spawn(
        client,
        Arc::new(notifier),
        ListMode::Paging,
        form,
        ingest.subscribe(),
        fast_timings().filter_debounce,
    );

    let mut state = list.state();
    wait_until(&mut state, |s| !s.loading && s.total_records == 5).await?;
    assert_eq!(list.current().total_pages, 3);

    assert!(list.go_to_page(3).await);
    wait_until(&mut state, |s| !s.loading && s.current_page == 3).await?;
    assert_eq!(list.current().items.len(), 1);

    list.shutdown().await;
    Ok(())
}
