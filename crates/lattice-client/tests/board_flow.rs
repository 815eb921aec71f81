//! Board actor flows against an in-memory transport.
//!
//! Every test runs on a paused clock: sleeps auto-advance time once all tasks
//! are idle, so debounce windows elapse deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use lattice_client::constants::DISCONNECT_NOTICE;
use lattice_client::{
    BoardError, BoardHandle, BoardTransport, FeedSignal, LiveFeed, MoveOutcome, SubscriptionState,
    SyncConfig, TransportError, spawn_board,
};
use lattice_types::{
    DiffKind, ProjectScope, SpecRevision, SpecSection, Stage, SubjectCount, WorkItem, WorkItemId,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

// ============================================================================
// Fake transport
// ============================================================================

#[derive(Default)]
struct FakeState {
    items: Vec<WorkItem>,
    counts: Vec<SubjectCount>,
    history: Vec<SpecRevision>,
    fail_moves: bool,
    fail_refresh: bool,
    /// Serve every item regardless of the requested scope.
    ignore_scope: bool,
    move_gate: Option<Arc<Notify>>,
    list_gate: Option<(ProjectScope, Arc<Notify>)>,
    feeds: Vec<(ProjectScope, UnboundedSender<FeedSignal>)>,
}

/// Server stand-in. Lists are filtered by the requested scope.
#[derive(Default)]
struct FakeTransport {
    state: Mutex<FakeState>,
    list_calls: AtomicUsize,
    move_calls: AtomicUsize,
}

impl FakeTransport {
    fn with_items(items: Vec<WorkItem>) -> Arc<Self> {
        let transport = Self::default();
        transport.state.lock().items = items;
        Arc::new(transport)
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn move_calls(&self) -> usize {
        self.move_calls.load(Ordering::SeqCst)
    }

    /// Sender of the most recently opened feed for `scope`.
    fn feed(&self, scope: &ProjectScope) -> UnboundedSender<FeedSignal> {
        self.state
            .lock()
            .feeds
            .iter()
            .rev()
            .find(|(s, _)| s == scope)
            .map(|(_, tx)| tx.clone())
            .expect("no feed opened for scope")
    }

    fn set_stage(&self, id: &WorkItemId, stage: Stage) {
        let mut state = self.state.lock();
        if let Some(item) = state.items.iter_mut().find(|i| &i.id == id) {
            item.stage = stage;
        }
    }

    fn delete(&self, id: &WorkItemId) {
        self.state.lock().items.retain(|i| &i.id != id);
    }

    fn gate_moves(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().move_gate = Some(gate.clone());
        gate
    }

    /// Hold list fetches for `scope` until the returned gate is notified.
    fn gate_list(&self, scope: &ProjectScope) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().list_gate = Some((scope.clone(), gate.clone()));
        gate
    }
}

#[async_trait]
impl BoardTransport for FakeTransport {
    async fn fetch_list(&self, scope: &ProjectScope) -> Result<Vec<WorkItem>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .state
            .lock()
            .list_gate
            .as_ref()
            .filter(|(gated, _)| gated == scope)
            .map(|(_, gate)| gate.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state.lock();
        if state.fail_refresh {
            return Err(TransportError::Status { status: 500, message: "boom".into() });
        }
        Ok(state
            .items
            .iter()
            .filter(|i| state.ignore_scope || i.scope() == scope)
            .cloned()
            .collect())
    }

    async fn fetch_open_question_counts(
        &self,
        _scope: &ProjectScope,
    ) -> Result<Vec<SubjectCount>, TransportError> {
        Ok(self.state.lock().counts.clone())
    }

    async fn move_remote(
        &self,
        _scope: &ProjectScope,
        id: &WorkItemId,
        target: Stage,
    ) -> Result<WorkItem, TransportError> {
        self.move_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().move_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if state.fail_moves {
            return Err(TransportError::Status { status: 409, message: "conflict".into() });
        }
        let item = state
            .items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or(TransportError::Status { status: 404, message: "not found".into() })?;
        item.stage = target;
        item.sort_order += 100.0;
        Ok(item.clone())
    }

    async fn fetch_section_history(
        &self,
        _scope: &ProjectScope,
        section: SpecSection,
    ) -> Result<Vec<SpecRevision>, TransportError> {
        Ok(self.state.lock().history.iter().filter(|r| r.section == section).cloned().collect())
    }

    fn open_live_feed(&self, scope: &ProjectScope) -> LiveFeed {
        let (tx, rx) = unbounded();
        self.state.lock().feeds.push((scope.clone(), tx));
        rx.boxed()
    }
}

// ============================================================================
// Shared test setup
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn lat() -> ProjectScope {
    ProjectScope::parse("LAT").unwrap()
}

fn ops() -> ProjectScope {
    ProjectScope::parse("OPS").unwrap()
}

fn id(s: &str) -> WorkItemId {
    WorkItemId::new(s).unwrap()
}

fn item(raw_id: &str, number: u64, stage: Stage) -> WorkItem {
    item_in(&lat(), raw_id, number, stage)
}

fn item_in(scope: &ProjectScope, raw_id: &str, number: u64, stage: Stage) -> WorkItem {
    WorkItem::new(id(raw_id), scope.display_key(number), raw_id, stage, number as f64)
}

/// Board with X in backlog and Y in ready, already loaded for LAT.
async fn loaded_board() -> (Arc<FakeTransport>, BoardHandle) {
    init_tracing();
    let transport = FakeTransport::with_items(vec![
        item("x", 1, Stage::Backlog),
        item("y", 2, Stage::Ready),
    ]);
    let board = spawn_board(transport.clone(), SyncConfig::default());
    board.activate_scope(lat()).await.unwrap();
    (transport, board)
}

fn event(project: &str, action: &str, task_id: &str) -> FeedSignal {
    FeedSignal::Message {
        event: action.to_string(),
        data: serde_json::json!({
            "id": "evt-1",
            "project": project,
            "task_id": task_id,
            "task_number": 1,
            "task_display_key": format!("{project}-1"),
            "action": action,
            "actor": "agent",
            "detail": {},
            "created_at": "2026-01-01T00:00:00Z",
        })
        .to_string(),
    }
}

/// Let the forwarder and the actor drain their queues without moving time.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Sleep past one quiet window.
async fn past_window() {
    tokio::time::sleep(Duration::from_millis(300)).await;
    settle().await;
}

fn stage_of(board: &BoardHandle, raw_id: &str) -> Option<Stage> {
    board.snapshot().store.get(&id(raw_id)).map(|i| i.stage)
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_initial_load_then_moved_event_refreshes_once() {
    let (transport, board) = loaded_board().await;
    assert_eq!(transport.list_calls(), 1);
    assert_eq!(stage_of(&board, "x"), Some(Stage::Backlog));
    assert_eq!(stage_of(&board, "y"), Some(Stage::Ready));

    // Another actor moves X on the server.
    transport.set_stage(&id("x"), Stage::Done);
    transport.feed(&lat()).unbounded_send(event("LAT", "task.moved", "x")).unwrap();
    settle().await;

    // Moves are not projected incrementally.
    assert_eq!(stage_of(&board, "x"), Some(Stage::Backlog));
    assert_eq!(transport.list_calls(), 1);

    past_window().await;
    assert_eq!(transport.list_calls(), 2);
    assert_eq!(stage_of(&board, "x"), Some(Stage::Done));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_coalesces_into_one_refresh() {
    let (transport, _board) = loaded_board().await;
    let feed = transport.feed(&lat());

    for _ in 0..10 {
        feed.unbounded_send(event("LAT", "task.updated", "y")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    past_window().await;

    assert_eq!(transport.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_events_each_refresh() {
    let (transport, _board) = loaded_board().await;
    let feed = transport.feed(&lat());

    for _ in 0..3 {
        feed.unbounded_send(event("LAT", "task.updated", "y")).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
    settle().await;

    assert_eq!(transport.list_calls(), 4);
}

// ============================================================================
// Optimistic moves
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_move_visible_before_server_answers() {
    let (transport, board) = loaded_board().await;
    let gate = transport.gate_moves();
    let mut snapshots = board.subscribe();

    let mover = board.clone();
    let task = tokio::spawn(async move { mover.move_item(id("x"), Stage::InProgress).await });

    snapshots
        .wait_for(|s| s.store.get(&id("x")).map(|i| i.stage) == Some(Stage::InProgress))
        .await
        .unwrap();
    settle().await;
    assert!(!task.is_finished());
    assert_eq!(transport.move_calls(), 1);

    gate.notify_one();
    let outcome = task.await.unwrap().unwrap();
    let MoveOutcome::Moved(server) = outcome else {
        panic!("expected a settled move");
    };
    assert_eq!(server.stage, Stage::InProgress);

    // Local copy adopts the server's representation.
    let snapshot = board.snapshot();
    assert_eq!(snapshot.store.get(&id("x")).unwrap().sort_order, server.sort_order);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_move_rolls_back() {
    let (transport, board) = loaded_board().await;
    transport.state.lock().fail_moves = true;
    let before = board.snapshot().store.get(&id("x")).cloned();

    let err = board.move_item(id("x"), Stage::Done).await.unwrap_err();
    assert!(matches!(err, BoardError::MoveRejected { ref id, .. } if id.as_str() == "x"));
    assert_eq!(board.snapshot().store.get(&id("x")).cloned(), before);

    // A rejection does not schedule a refresh.
    past_window().await;
    assert_eq!(transport.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_stage_move_is_local_noop() {
    let (transport, board) = loaded_board().await;
    let version = board.snapshot().version;

    let outcome = board.move_item(id("x"), Stage::Backlog).await.unwrap();
    assert_eq!(outcome, MoveOutcome::Unchanged);
    assert_eq!(transport.move_calls(), 0);
    assert_eq!(board.snapshot().version, version);
}

#[tokio::test(start_paused = true)]
async fn test_move_of_unknown_item() {
    let (transport, board) = loaded_board().await;
    let err = board.move_item(id("ghost"), Stage::Done).await.unwrap_err();
    assert!(matches!(err, BoardError::NotTracked(_)));
    assert_eq!(transport.move_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_successful_move_schedules_refresh() {
    let (transport, board) = loaded_board().await;
    board.move_item(id("y"), Stage::Review).await.unwrap();
    assert_eq!(transport.list_calls(), 1);

    past_window().await;
    assert_eq!(transport.list_calls(), 2);
    assert_eq!(stage_of(&board, "y"), Some(Stage::Review));
}

// ============================================================================
// Live events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_deletion_applies_before_pending_refresh() {
    let (transport, board) = loaded_board().await;
    let feed = transport.feed(&lat());

    feed.unbounded_send(event("LAT", "task.updated", "y")).unwrap();
    transport.delete(&id("x"));
    feed.unbounded_send(event("LAT", "task.deleted", "x")).unwrap();
    settle().await;

    assert_eq!(transport.list_calls(), 1);
    assert!(!board.snapshot().store.contains(&id("x")));

    past_window().await;
    assert_eq!(transport.list_calls(), 2);
    assert!(!board.snapshot().store.contains(&id("x")));
    assert!(board.snapshot().store.contains(&id("y")));
}

#[tokio::test(start_paused = true)]
async fn test_question_counters_follow_events() {
    let (transport, board) = loaded_board().await;
    let feed = transport.feed(&lat());

    feed.unbounded_send(event("LAT", "question.created", "x")).unwrap();
    feed.unbounded_send(event("LAT", "question.created", "x")).unwrap();
    feed.unbounded_send(event("LAT", "question.resolved", "x")).unwrap();
    settle().await;
    assert_eq!(board.snapshot().store.open_question_count(&id("x")), 1);

    feed.unbounded_send(event("LAT", "question.resolved", "y")).unwrap();
    settle().await;
    assert_eq!(board.snapshot().store.open_question_count(&id("y")), 0);
}

#[tokio::test(start_paused = true)]
async fn test_other_scope_events_have_no_effect() {
    let (transport, board) = loaded_board().await;
    let version = board.snapshot().version;

    transport.feed(&lat()).unbounded_send(event("OPS", "task.deleted", "x")).unwrap();
    settle().await;
    past_window().await;

    assert_eq!(board.snapshot().version, version);
    assert!(board.snapshot().store.contains(&id("x")));
    assert_eq!(transport.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_events_dropped() {
    let (transport, board) = loaded_board().await;
    let feed = transport.feed(&lat());
    feed.unbounded_send(FeedSignal::Message { event: "task.deleted".into(), data: "{oops".into() })
        .unwrap();
    feed.unbounded_send(event("LAT", "task.teleported", "x")).unwrap();
    past_window().await;

    assert!(board.snapshot().store.contains(&id("x")));
    assert_eq!(transport.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_warning() {
    let (transport, board) = loaded_board().await;
    let feed = transport.feed(&lat());
    let mut snapshots = board.subscribe();
    assert_eq!(board.snapshot().connection, SubscriptionState::Connecting);

    feed.unbounded_send(FeedSignal::Opened).unwrap();
    snapshots.wait_for(|s| s.connection == SubscriptionState::Open).await.unwrap();

    feed.unbounded_send(FeedSignal::Error("socket reset".into())).unwrap();
    snapshots.wait_for(|s| s.connection == SubscriptionState::Retrying).await.unwrap();
    assert_eq!(board.snapshot().warning.as_deref(), Some(DISCONNECT_NOTICE));

    feed.unbounded_send(FeedSignal::Opened).unwrap();
    snapshots.wait_for(|s| s.connection == SubscriptionState::Open).await.unwrap();
    assert_eq!(board.snapshot().warning, None);
}

// ============================================================================
// Scope switching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scope_switch_closes_old_feed() {
    let (transport, board) = loaded_board().await;
    let old_feed = transport.feed(&lat());

    board.activate_scope(ops()).await.unwrap();
    settle().await;

    assert!(old_feed.is_closed());
    assert!(!transport.feed(&ops()).is_closed());
    assert_eq!(board.snapshot().scope(), Some(&ops()));
    assert_eq!(transport.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scope_switch_cancels_pending_refresh() {
    let (transport, board) = loaded_board().await;
    transport.feed(&lat()).unbounded_send(event("LAT", "task.updated", "y")).unwrap();
    settle().await;

    board.deactivate().await.unwrap();
    past_window().await;

    assert_eq!(transport.list_calls(), 1);
    assert!(board.snapshot().scope().is_none());
    assert!(board.snapshot().store.is_empty());
    assert_eq!(board.snapshot().connection, SubscriptionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_move_settling_after_scope_switch_is_discarded() {
    let (transport, board) = loaded_board().await;
    let gate = transport.gate_moves();
    let mut snapshots = board.subscribe();

    let mover = board.clone();
    let task = tokio::spawn(async move { mover.move_item(id("x"), Stage::Done).await });
    snapshots
        .wait_for(|s| s.store.get(&id("x")).map(|i| i.stage) == Some(Stage::Done))
        .await
        .unwrap();

    board.activate_scope(ops()).await.unwrap();
    gate.notify_one();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err, BoardError::ScopeChanged);
    assert_eq!(board.snapshot().scope(), Some(&ops()));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_settling_after_scope_switch_is_discarded() {
    init_tracing();
    let transport = FakeTransport::with_items(vec![
        item("x", 1, Stage::Backlog),
        item_in(&ops(), "z", 1, Stage::Ready),
    ]);
    let gate = transport.gate_list(&lat());
    let board = spawn_board(transport.clone(), SyncConfig::default());

    let first = board.clone();
    let first_load = tokio::spawn(async move { first.activate_scope(lat()).await });
    settle().await;
    assert_eq!(transport.list_calls(), 1);

    board.activate_scope(ops()).await.unwrap();
    gate.notify_one();

    assert_eq!(first_load.await.unwrap(), Err(BoardError::ScopeChanged));
    settle().await;

    let snapshot = board.snapshot();
    assert_eq!(snapshot.scope(), Some(&ops()));
    assert_eq!(snapshot.store.len(), 1);
    assert!(snapshot.store.contains(&id("z")));
    assert!(!snapshot.store.contains(&id("x")));
}

#[tokio::test(start_paused = true)]
async fn test_operations_without_scope() {
    init_tracing();
    let transport = FakeTransport::with_items(Vec::new());
    let board = spawn_board(transport.clone(), SyncConfig::default());

    assert_eq!(board.move_item(id("x"), Stage::Done).await, Err(BoardError::NoActiveScope));
    assert_eq!(board.refresh_now().await, Err(BoardError::NoActiveScope));
    assert_eq!(
        board.compare_revision(SpecSection::Overview, "r1").await,
        Err(BoardError::NoActiveScope)
    );
    assert_eq!(transport.list_calls(), 0);
}

// ============================================================================
// Refresh and history
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_keeps_state_and_reports() {
    let (transport, board) = loaded_board().await;
    transport.state.lock().fail_refresh = true;

    let err = board.refresh_now().await.unwrap_err();
    assert!(matches!(err, BoardError::RefreshFailed(TransportError::Status { status: 500, .. })));
    let snapshot = board.snapshot();
    assert_eq!(snapshot.store.len(), 2);
    assert!(snapshot.refresh_error.is_some());

    transport.state.lock().fail_refresh = false;
    board.refresh_now().await.unwrap();
    assert_eq!(board.snapshot().refresh_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_drops_items_of_other_scopes() {
    init_tracing();
    let transport = FakeTransport::with_items(vec![
        item("x", 1, Stage::Backlog),
        item_in(&ops(), "z", 1, Stage::Ready),
    ]);
    transport.state.lock().ignore_scope = true;
    let board = spawn_board(transport.clone(), SyncConfig::default());

    board.activate_scope(lat()).await.unwrap();

    let snapshot = board.snapshot();
    assert_eq!(snapshot.store.len(), 1);
    assert!(snapshot.store.contains(&id("x")));
    assert!(!snapshot.store.contains(&id("z")));
}

#[tokio::test(start_paused = true)]
async fn test_compare_revision() {
    let (transport, board) = loaded_board().await;
    let rev = |id: &str, content: &str| SpecRevision {
        id: id.to_string(),
        section: SpecSection::Requirements,
        content: content.to_string(),
        edited_by: "human".to_string(),
        created_at: String::new(),
    };
    transport.state.lock().history = vec![rev("r2", "a\nc"), rev("r1", "a\nb\nc")];

    let diff = board.compare_revision(SpecSection::Requirements, "r2").await.unwrap();
    let kinds: Vec<_> = diff.iter().map(|l| l.kind).collect();
    assert_eq!(kinds, vec![DiffKind::Context, DiffKind::Removed, DiffKind::Context]);

    let err = board.compare_revision(SpecSection::Requirements, "r9").await.unwrap_err();
    assert_eq!(err, BoardError::RevisionNotFound("r9".to_string()));
}
