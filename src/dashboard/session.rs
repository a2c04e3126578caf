//! Dashboard session driver.
//!
//! One session owns one [`LiveReconciler`] and runs it on a single task: it
//! consumes the real-time event channel, arms per-node delayed tasks for the
//! steps the reconciler schedules, and publishes debounced diagram snapshots
//! on a watch channel for the rendering layer.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::DashboardTimings;
use super::client::{ClientError, EventQueryClient};
use super::debounce::Debouncer;
use super::diagram::{DiagramNode, flatten};
use super::notification::{Notification, Notifier};
use super::reconciler::{LiveReconciler, ReconcileError, Scheduled, Transition};
use super::timers::DelayedTasks;
use crate::models::event::EventRecord;
use crate::models::hierarchy::DeviceHierarchy;

pub type DiagramSnapshot = Arc<Vec<DiagramNode>>;

#[derive(Debug)]
struct StepDue {
    node_id: String,
    generation: u64,
}

pub struct DashboardSession {
    reconciler: LiveReconciler,
    timers: DelayedTasks<String>,
    due_tx: mpsc::UnboundedSender<StepDue>,
    debouncer: Debouncer,
    diagram_tx: watch::Sender<DiagramSnapshot>,
    notifier: Arc<dyn Notifier>,
    afk: bool,
}

/// Owner-side handle of a running session. Dropping it stops the session.
pub struct SessionHandle {
    diagram: watch::Receiver<DiagramSnapshot>,
    afk: watch::Sender<bool>,
    reload: mpsc::Sender<Vec<DiagramNode>>,
    shutdown: CancellationToken,
    _stop: DropGuard,
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Subscribes to committed diagram snapshots.
    pub fn diagram(&self) -> watch::Receiver<DiagramSnapshot> {
        self.diagram.clone()
    }

    pub fn current(&self) -> DiagramSnapshot {
        Arc::clone(&self.diagram.borrow())
    }

    /// While idle the session drops real-time events.
    pub fn set_afk(&self, afk: bool) {
        self.afk.send_replace(afk);
    }

    /// Replaces the diagram with a freshly fetched hierarchy.
    pub async fn reload(&self, hierarchy: &DeviceHierarchy) -> bool {
        self.reload.send(flatten(hierarchy)).await.is_ok()
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.join.await {
            warn!(error = %err, "Dashboard session task ended abnormally");
        }
    }
}

impl DashboardSession {
    /// Starts a session over `hierarchy`; the initial diagram is published immediately.
    pub fn spawn(
        hierarchy: &DeviceHierarchy,
        events: broadcast::Receiver<EventRecord>,
        notifier: Arc<dyn Notifier>,
        timings: DashboardTimings,
    ) -> SessionHandle {
        let reconciler = LiveReconciler::new(flatten(hierarchy), timings.reconcile());
        let (diagram_tx, diagram_rx) = watch::channel(Arc::new(reconciler.snapshot()));
        let (afk_tx, afk_rx) = watch::channel(false);
        let (reload_tx, reload_rx) = mpsc::channel(4);
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let session = DashboardSession {
            reconciler,
            timers: DelayedTasks::new(),
            due_tx,
            debouncer: Debouncer::new(timings.diagram_debounce),
            diagram_tx,
            notifier,
            afk: false,
        };

        let join = tokio::spawn(session.run(events, due_rx, afk_rx, reload_rx, shutdown.clone()));

        SessionHandle {
            diagram: diagram_rx,
            afk: afk_tx,
            reload: reload_tx,
            _stop: shutdown.clone().drop_guard(),
            shutdown,
            join,
        }
    }

    /// Fetches the device hierarchy and starts a session over it.
    pub async fn connect(
        client: &dyn EventQueryClient,
        events: broadcast::Receiver<EventRecord>,
        notifier: Arc<dyn Notifier>,
        timings: DashboardTimings,
    ) -> Result<SessionHandle, ClientError> {
        let hierarchy = match client.relationship().await {
            Ok(hierarchy) => hierarchy,
            Err(err) => {
                if !err.is_cancelled() {
                    notifier.notify(Notification::fetch_failed(&err));
                }
                return Err(err);
            }
        };
        Ok(Self::spawn(&hierarchy, events, notifier, timings))
    }

    async fn run(
        mut self,
        mut events: broadcast::Receiver<EventRecord>,
        mut due_rx: mpsc::UnboundedReceiver<StepDue>,
        mut afk_rx: watch::Receiver<bool>,
        mut reload_rx: mpsc::Receiver<Vec<DiagramNode>>,
        shutdown: CancellationToken,
    ) {
        info!(nodes = self.reconciler.len(), "Dashboard session started");
        let mut events_open = true;
        let mut afk_open = true;

        loop {
            let commit_at = self.debouncer.deadline();

            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv(), if events_open => match received {
                    Ok(event) => self.on_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dashboard session fell behind the event channel");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event channel closed");
                        events_open = false;
                    }
                },
                Some(due) = due_rx.recv() => self.on_step_due(due),
                changed = afk_rx.changed(), if afk_open => match changed {
                    Ok(()) => {
                        self.afk = *afk_rx.borrow_and_update();
                        debug!(afk = self.afk, "Dashboard idle flag changed");
                    }
                    Err(_) => afk_open = false,
                },
                Some(nodes) = reload_rx.recv() => self.reload(nodes),
                _ = sleep_until(commit_at.unwrap_or_else(Instant::now)), if commit_at.is_some() => {
                    if self.debouncer.take_if_due(Instant::now()) {
                        self.commit();
                    }
                }
            }
        }

        self.timers.cancel_all();
        info!("Dashboard session stopped");
    }

    fn on_event(&mut self, event: EventRecord) {
        if self.afk {
            debug!(event_id = %event.id, "Session idle, event ignored");
            return;
        }

        self.notifier.notify(Notification::new_event(&event));

        let now = Instant::now();
        match self.reconciler.handle_event(&event, now) {
            Ok(Some(step)) => {
                self.arm(step);
                self.debouncer.touch(now);
            }
            Ok(None) => {}
            Err(ReconcileError::NodeNotFound { event_id, node_id }) => {
                counter!("dashboard_device_not_found_total").increment(1);
                warn!(%event_id, %node_id, "Event references a device missing from the diagram");
                self.notifier
                    .notify(Notification::device_not_found(event_id, &node_id));
            }
        }
    }

    fn on_step_due(&mut self, due: StepDue) {
        let now = Instant::now();
        match self.reconciler.fire(&due.node_id, due.generation, now) {
            Transition::Stale => {}
            Transition::Settled => self.debouncer.touch(now),
            Transition::Continue(step) => {
                self.arm(step);
                self.debouncer.touch(now);
            }
        }
    }

    fn arm(&mut self, step: Scheduled) {
        let Scheduled {
            node_id,
            generation,
            delay,
        } = step;
        let due_tx = self.due_tx.clone();
        let key = node_id.clone();

        self.timers.schedule(key, delay, async move {
            let _ = due_tx.send(StepDue {
                node_id,
                generation,
            });
        });
    }

    fn reload(&mut self, nodes: Vec<DiagramNode>) {
        self.timers.cancel_all();
        self.reconciler.load(nodes);
        self.debouncer.cancel();
        self.commit();
        info!(nodes = self.reconciler.len(), "Dashboard diagram reloaded");
    }

    fn commit(&self) {
        self.diagram_tx
            .send_replace(Arc::new(self.reconciler.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::diagram::{ROOT_ID, Source};
    use crate::dashboard::notification::{ChannelNotifier, NotificationCode};
    use crate::dashboard::status::NodeStatus;
    use crate::dashboard::test_support::{event, sample_hierarchy};
    use crate::models::event::{Category, DeviceType};
    use crate::models::hierarchy::EdgeNode;
    use crate::query::{LoadMoreEvents, LoadMoreQuery, PaginationEvents, PagingQuery};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    const TIMINGS: DashboardTimings = DashboardTimings {
        blink: Duration::from_millis(3000),
        connection_change: Duration::from_millis(1500),
        diagram_debounce: Duration::from_millis(200),
        filter_debounce: Duration::from_millis(500),
    };

    struct Harness {
        events: broadcast::Sender<EventRecord>,
        notifications: mpsc::UnboundedReceiver<Notification>,
        handle: SessionHandle,
    }

    fn start() -> Harness {
        let (events, rx) = broadcast::channel(16);
        let (notifier, notifications) = ChannelNotifier::channel();
        let handle = DashboardSession::spawn(&sample_hierarchy(), rx, Arc::new(notifier), TIMINGS);
        Harness {
            events,
            notifications,
            handle,
        }
    }

    fn virus(send_node: &str) -> EventRecord {
        event(
            Category::Virus,
            send_node,
            DeviceType::Rsu,
            "EDGE1",
            json!({"fileName": "x"}),
        )
    }

    fn status_of(snapshot: &DiagramSnapshot, id: &str) -> Option<NodeStatus> {
        snapshot
            .iter()
            .find(|node| node.id == id)
            .and_then(|node| node.node_status)
    }

    #[tokio::test(start_paused = true)]
    async fn initial_diagram_is_published_immediately() {
        let harness = start();
        let snapshot = harness.handle.current();
        assert_eq!(snapshot.len(), 9);
        assert_eq!(snapshot[0].id, ROOT_ID);
        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn alert_is_committed_after_debounce_and_reverted_after_blink() {
        let harness = start();
        let mut diagram = harness.handle.diagram();
        let started = Instant::now();

        harness.events.send(virus("RSU1")).unwrap();

        diagram.changed().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300));
        assert_eq!(
            status_of(&diagram.borrow_and_update(), "RSU1"),
            Some(NodeStatus::VirusExceed)
        );

        diagram.changed().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3200) && elapsed < Duration::from_millis(3300));
        assert_eq!(status_of(&diagram.borrow_and_update(), "RSU1"), None);

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_alert_restarts_the_countdown() {
        let harness = start();
        let mut diagram = harness.handle.diagram();
        let started = Instant::now();

        harness.events.send(virus("OBU1")).unwrap();
        diagram.changed().await.unwrap();
        sleep(Duration::from_millis(800)).await;
        harness.events.send(virus("OBU1")).unwrap();

        diagram.changed().await.unwrap();
        assert_eq!(
            status_of(&diagram.borrow_and_update(), "OBU1"),
            Some(NodeStatus::VirusExceed)
        );

        diagram
            .wait_for(|snapshot| status_of(snapshot, "OBU1").is_none())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(4000));

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_commits_once() {
        let harness = start();
        let mut diagram = harness.handle.diagram();

        for node in ["RSU1", "RSU2", "OBU3"] {
            harness.events.send(virus(node)).unwrap();
        }

        diagram.changed().await.unwrap();
        let snapshot = diagram.borrow_and_update().clone();
        for node in ["RSU1", "RSU2", "OBU3"] {
            assert_eq!(status_of(&snapshot, node), Some(NodeStatus::VirusExceed));
        }

        sleep(Duration::from_millis(1000)).await;
        assert!(!diagram.has_changed().unwrap());

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn communication_walks_through_its_phases() {
        let harness = start();
        let mut diagram = harness.handle.diagram();
        let comm = event(
            Category::Communication,
            "RSU1",
            DeviceType::Rsu,
            "EDGE1",
            json!({"info": "pass"}),
        );

        harness.events.send(comm).unwrap();

        fn edge1(snapshot: &DiagramSnapshot) -> DiagramNode {
            snapshot
                .iter()
                .find(|node| node.id == "EDGE1")
                .cloned()
                .unwrap()
        }

        diagram.changed().await.unwrap();
        let node = edge1(&diagram.borrow_and_update());
        let Some(Source::Connections(list)) = node.source else {
            panic!("connection phase should rewrite the source list");
        };
        assert!(!list[1].edge_animated);

        diagram.changed().await.unwrap();
        let node = edge1(&diagram.borrow_and_update());
        let Some(Source::Connections(list)) = node.source else {
            panic!("communication phase keeps the source list");
        };
        assert!(list[1].edge_animated);

        diagram.changed().await.unwrap();
        let node = edge1(&diagram.borrow_and_update());
        assert_eq!(node.source, Some(Source::Parent(ROOT_ID.to_string())));

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_device_notifies_without_touching_the_diagram() {
        let mut harness = start();
        let diagram = harness.handle.diagram();
        let missing = virus("RSU404");

        harness.events.send(missing.clone()).unwrap();

        let first = harness.notifications.recv().await.unwrap();
        assert_eq!(first.code, NotificationCode::NewEvent);
        let second = harness.notifications.recv().await.unwrap();
        assert_eq!(second.code, NotificationCode::DeviceNotFound);
        assert_eq!(second.event_id, Some(missing.id));

        sleep(Duration::from_millis(500)).await;
        assert!(!diagram.has_changed().unwrap());

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_ignores_events_until_resumed() {
        let mut harness = start();
        let mut diagram = harness.handle.diagram();

        harness.handle.set_afk(true);
        sleep(Duration::from_millis(10)).await;
        harness.events.send(virus("RSU1")).unwrap();
        sleep(Duration::from_millis(500)).await;
        assert!(!diagram.has_changed().unwrap());
        assert!(harness.notifications.try_recv().is_err());

        harness.handle.set_afk(false);
        sleep(Duration::from_millis(10)).await;
        harness.events.send(virus("RSU1")).unwrap();
        diagram.changed().await.unwrap();
        assert_eq!(
            status_of(&diagram.borrow_and_update(), "RSU1"),
            Some(NodeStatus::VirusExceed)
        );

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reload_replaces_diagram_and_drops_pending_steps() {
        let harness = start();
        let mut diagram = harness.handle.diagram();

        harness.events.send(virus("RSU1")).unwrap();
        diagram.changed().await.unwrap();

        let smaller = DeviceHierarchy {
            list_edge: vec![EdgeNode {
                id: 9,
                name: "EDGE9".to_string(),
                list_rsu: Vec::new(),
            }],
        };
        assert!(harness.handle.reload(&smaller).await);
        diagram.changed().await.unwrap();
        assert_eq!(diagram.borrow_and_update().len(), 2);

        sleep(Duration::from_millis(5000)).await;
        assert!(!diagram.has_changed().unwrap());

        harness.handle.shutdown().await;
    }

    struct StaticClient(Result<DeviceHierarchy, u16>);

    #[async_trait]
    impl EventQueryClient for StaticClient {
        async fn paging(&self, _query: &PagingQuery) -> Result<PaginationEvents, ClientError> {
            Ok(PaginationEvents::empty(1))
        }

        async fn load_more(&self, _query: &LoadMoreQuery) -> Result<LoadMoreEvents, ClientError> {
            Ok(LoadMoreEvents::empty())
        }

        async fn relationship(&self) -> Result<DeviceHierarchy, ClientError> {
            self.0.clone().map_err(|status| ClientError::Status {
                status,
                message: "unavailable".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_loads_hierarchy_or_reports_failure() {
        let (events, _) = broadcast::channel::<EventRecord>(4);
        let (notifier, mut notifications) = ChannelNotifier::channel();
        let notifier = Arc::new(notifier);

        let handle = DashboardSession::connect(
            &StaticClient(Ok(sample_hierarchy())),
            events.subscribe(),
            notifier.clone(),
            TIMINGS,
        )
        .await
        .unwrap();
        assert_eq!(handle.current().len(), 9);
        handle.shutdown().await;

        let result = DashboardSession::connect(
            &StaticClient(Err(503)),
            events.subscribe(),
            notifier,
            TIMINGS,
        )
        .await;
        assert!(matches!(result, Err(ClientError::Status { status: 503, .. })));
        assert_eq!(
            notifications.recv().await.unwrap().code,
            NotificationCode::FetchFailed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_session() {
        let Harness {
            events,
            notifications: _notifications,
            handle,
        } = start();
        events.send(virus("RSU1")).unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(events.receiver_count(), 1);

        drop(handle);
        for _ in 0..20 {
            if events.receiver_count() == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(events.receiver_count(), 0);
    }
}
