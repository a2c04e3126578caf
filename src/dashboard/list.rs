//! Event list views.
//!
//! A [`ListController`] backs one list view in either paging or load-more
//! mode. Form edits are debounced; every fetch runs under a cancellation token
//! owned by the view, and responses tagged with an older generation are
//! dropped so a superseded filter never overwrites newer state.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use super::client::{ClientError, EventQueryClient};
use super::debounce::Debouncer;
use super::filter::{
    ListEventForm, ListEventRequest, ListMode, build_request, is_socket_event_valid,
};
use super::notification::{Notification, Notifier};
use crate::models::event::EventRecord;
use crate::query::{EventFilter, LoadMoreEvents, PaginationEvents, total_pages};

/// What the view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub mode: ListMode,
    /// Form the displayed rows were requested with.
    pub form: ListEventForm,
    /// Filter of the displayed rows; `None` until the first page arrives.
    pub filter: Option<EventFilter>,
    pub items: Vec<EventRecord>,
    pub has_next: bool,
    pub total_records: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub loading: bool,
}

impl ListState {
    fn new(mode: ListMode, form: ListEventForm) -> Self {
        Self {
            mode,
            current_page: form.page,
            form,
            filter: None,
            items: Vec::new(),
            has_next: false,
            total_records: 0,
            total_pages: 0,
            loading: false,
        }
    }
}

#[derive(Debug)]
enum ListCommand {
    SetForm(ListEventForm),
    LoadMore,
    GoToPage(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Replace,
    Append,
}

#[derive(Debug)]
enum FetchedPage {
    Paging(PaginationEvents),
    LoadMore(LoadMoreEvents),
}

#[derive(Debug)]
struct FetchDone {
    generation: u64,
    kind: FetchKind,
    form: ListEventForm,
    filter: EventFilter,
    result: Result<FetchedPage, ClientError>,
}

/// Owner-side handle of a mounted list view. Dropping it unmounts the view.
pub struct ListHandle {
    commands: mpsc::Sender<ListCommand>,
    state: watch::Receiver<ListState>,
    shutdown: CancellationToken,
    _unmount: DropGuard,
    join: JoinHandle<()>,
}

impl ListHandle {
    pub fn state(&self) -> watch::Receiver<ListState> {
        self.state.clone()
    }

    pub fn current(&self) -> ListState {
        self.state.borrow().clone()
    }

    /// Queues a form edit; the query runs once edits pause for the debounce window.
    pub async fn set_form(&self, form: ListEventForm) -> bool {
        self.commands.send(ListCommand::SetForm(form)).await.is_ok()
    }

    pub async fn load_more(&self) -> bool {
        self.commands.send(ListCommand::LoadMore).await.is_ok()
    }

    pub async fn go_to_page(&self, page: u64) -> bool {
        self.commands.send(ListCommand::GoToPage(page)).await.is_ok()
    }

    /// Unmounts the view, cancelling any request in flight.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.join.await {
            warn!(error = %err, "List view task ended abnormally");
        }
    }
}

pub struct ListController {
    client: Arc<dyn EventQueryClient>,
    notifier: Arc<dyn Notifier>,
    state: ListState,
    state_tx: watch::Sender<ListState>,
    pending_form: Option<ListEventForm>,
    debouncer: Debouncer,
    shutdown: CancellationToken,
    view_token: CancellationToken,
    generation: u64,
    done_tx: mpsc::UnboundedSender<FetchDone>,
}

impl ListController {
    /// Mounts a list view and issues the first query for `form` right away.
    pub fn spawn(
        client: Arc<dyn EventQueryClient>,
        notifier: Arc<dyn Notifier>,
        mode: ListMode,
        form: ListEventForm,
        events: broadcast::Receiver<EventRecord>,
        filter_debounce: Duration,
    ) -> ListHandle {
        let state = ListState::new(mode, form);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let controller = ListController {
            client,
            notifier,
            state,
            state_tx,
            pending_form: None,
            debouncer: Debouncer::new(filter_debounce),
            view_token: shutdown.child_token(),
            shutdown: shutdown.clone(),
            generation: 0,
            done_tx,
        };

        let join = tokio::spawn(controller.run(commands_rx, done_rx, events));

        ListHandle {
            commands: commands_tx,
            state: state_rx,
            _unmount: shutdown.clone().drop_guard(),
            shutdown,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ListCommand>,
        mut done_rx: mpsc::UnboundedReceiver<FetchDone>,
        mut events: broadcast::Receiver<EventRecord>,
    ) {
        let form = self.state.form.clone();
        self.fetch(form, FetchKind::Replace);
        let mut events_open = true;

        loop {
            let apply_at = self.debouncer.deadline();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(command) = commands.recv() => self.on_command(command),
                Some(done) = done_rx.recv() => self.on_fetch_done(done),
                received = events.recv(), if events_open => match received {
                    Ok(event) => self.on_live_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "List view fell behind the event channel");
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
                _ = sleep_until(apply_at.unwrap_or_else(Instant::now)), if apply_at.is_some() => {
                    if self.debouncer.take_if_due(Instant::now()) {
                        if let Some(form) = self.pending_form.take() {
                            self.apply_form(form);
                        }
                    }
                }
            }
        }

        self.view_token.cancel();
        debug!("List view stopped");
    }

    fn on_command(&mut self, command: ListCommand) {
        match command {
            ListCommand::SetForm(form) => {
                self.pending_form = Some(form);
                self.debouncer.touch(Instant::now());
            }
            ListCommand::LoadMore => {
                if self.state.mode != ListMode::LoadMore
                    || self.state.loading
                    || !self.state.has_next
                {
                    debug!("Load more ignored");
                    return;
                }
                let mut form = self.state.form.clone();
                form.last_record_created_time =
                    self.state.items.last().map(|event| event.created_at);
                self.fetch(form, FetchKind::Append);
            }
            ListCommand::GoToPage(page) => {
                if self.state.mode != ListMode::Paging {
                    return;
                }
                let mut form = self.state.form.clone();
                form.page = page;
                self.fetch(form, FetchKind::Replace);
            }
        }
    }

    /// A filter edit restarts the listing from the top.
    fn apply_form(&mut self, mut form: ListEventForm) {
        form.page = 1;
        form.last_record_created_time = None;
        self.fetch(form, FetchKind::Replace);
    }

    fn fetch(&mut self, form: ListEventForm, kind: FetchKind) {
        let Some(request) = build_request(&form, self.state.mode) else {
            debug!("Filter form incomplete, no query issued");
            return;
        };

        self.view_token.cancel();
        self.view_token = self.shutdown.child_token();
        self.generation += 1;

        let filter = request.filter().clone();
        if filter.is_empty() {
            let page = match &request {
                ListEventRequest::Paging(query) => {
                    FetchedPage::Paging(PaginationEvents::empty(query.page))
                }
                ListEventRequest::LoadMore(_) => FetchedPage::LoadMore(LoadMoreEvents::empty()),
            };
            self.state.loading = false;
            self.apply_page(kind, form, filter, page);
            return;
        }

        self.state.loading = true;
        self.publish();

        let client = Arc::clone(&self.client);
        let token = self.view_token.clone();
        let done_tx = self.done_tx.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(ClientError::Cancelled),
                result = execute(client.as_ref(), &request) => result,
            };
            let _ = done_tx.send(FetchDone {
                generation,
                kind,
                form,
                filter,
                result,
            });
        });
    }

    fn on_fetch_done(&mut self, done: FetchDone) {
        if done.generation != self.generation {
            debug!(generation = done.generation, "Stale list response dropped");
            return;
        }
        self.state.loading = false;

        match done.result {
            Ok(page) => self.apply_page(done.kind, done.form, done.filter, page),
            Err(err) if err.is_cancelled() => self.publish(),
            Err(err) => {
                warn!(error = %err, "Event list query failed");
                self.notifier.notify(Notification::fetch_failed(&err));
                self.publish();
            }
        }
    }

    fn apply_page(
        &mut self,
        kind: FetchKind,
        form: ListEventForm,
        filter: EventFilter,
        page: FetchedPage,
    ) {
        match page {
            FetchedPage::Paging(page) => {
                self.state.items = page.list_event;
                self.state.total_records = page.total_records;
                self.state.total_pages = page.total_pages;
                self.state.current_page = page.current_page;
                self.state.has_next = page.current_page < page.total_pages;
            }
            FetchedPage::LoadMore(page) => {
                if kind == FetchKind::Replace {
                    self.state.items = page.list_event;
                } else {
                    for event in page.list_event {
                        if !self.state.items.iter().any(|item| item.id == event.id) {
                            self.state.items.push(event);
                        }
                    }
                }
                self.state.has_next = page.has_next;
            }
        }
        self.state.form = form;
        self.state.filter = Some(filter);
        self.publish();
    }

    fn on_live_event(&mut self, event: EventRecord) {
        let Some(filter) = &self.state.filter else {
            return;
        };
        if !is_socket_event_valid(&event, filter) {
            return;
        }
        if self.state.items.iter().any(|item| item.id == event.id) {
            return;
        }

        match self.state.mode {
            ListMode::LoadMore => self.state.items.insert(0, event),
            ListMode::Paging => {
                self.state.total_records += 1;
                self.state.total_pages =
                    total_pages(self.state.total_records, self.state.form.size);
                if self.state.current_page == 1 {
                    self.state.items.insert(0, event);
                    let size = usize::try_from(self.state.form.size).unwrap_or(usize::MAX);
                    self.state.items.truncate(size);
                }
                self.state.has_next = self.state.current_page < self.state.total_pages;
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

async fn execute(
    client: &dyn EventQueryClient,
    request: &ListEventRequest,
) -> Result<FetchedPage, ClientError> {
    match request {
        ListEventRequest::Paging(query) => client.paging(query).await.map(FetchedPage::Paging),
        ListEventRequest::LoadMore(query) => {
            client.load_more(query).await.map(FetchedPage::LoadMore)
        }
    }
}
