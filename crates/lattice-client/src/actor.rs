//! Board actor: the single writer of the local board.
//!
//! [`spawn_board`] starts one task that owns the [`EntityStore`], the
//! [`MutationExecutor`], the [`EventSubscriber`] and the [`RefreshCoalescer`].
//! Commands from any number of [`BoardHandle`] clones, completions of remote
//! calls and live feed signals are processed strictly one at a time. Remote
//! calls run in their own tasks and post their results back, so the actor
//! never awaits I/O and a slow request does not stall the board.
//!
//! ```text
//!   BoardHandle (Clone)        mpsc        BoardActor (tokio::spawn)
//!   ┌──────────────────┐   ──────────▶   ┌─────────────────────────────┐
//!   │ .activate_scope()│                 │ EntityStore                 │
//!   │ .move_item()     │   ◀──────────   │ MutationExecutor            │
//!   │ .refresh_now()   │    oneshot      │ EventSubscriber ◀── feed    │
//!   │ .snapshot()      │   ◀──────────   │ RefreshCoalescer            │
//!   └──────────────────┘     watch       └─────────────────────────────┘
//!                                          ▲ spawned remote calls post
//!                                          └─ completions back
//! ```
//!
//! Every scope activation and teardown bumps the epoch. Completions carry the
//! epoch they were started under and are discarded when it no longer matches.

use std::sync::Arc;

use lattice_types::{
    ProjectScope, RevisionDiff, SpecSection, Stage, SubjectCount, WorkItem, WorkItemId,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::coalescer::{RefreshCoalescer, until};
use crate::config::SyncConfig;
use crate::diff::compare_with_previous;
use crate::mutation::{MoveOutcome, MutationExecutor, PendingMove};
use crate::store::EntityStore;
use crate::subscriptions::{EventSubscriber, FeedEnvelope, SubscriptionState};
use crate::transport::{BoardTransport, TransportError};

// ============================================================================
// Error Type
// ============================================================================

/// Errors from board operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("no project scope is active")]
    NoActiveScope,
    #[error("work item {0} is not on the board")]
    NotTracked(WorkItemId),
    #[error("move of {id} rejected: {source}")]
    MoveRejected {
        id: WorkItemId,
        #[source]
        source: TransportError,
    },
    #[error("refresh failed: {0}")]
    RefreshFailed(#[source] TransportError),
    #[error("failed to load section history: {0}")]
    HistoryFailed(#[source] TransportError),
    #[error("revision {0} not found in section history")]
    RevisionNotFound(String),
    #[error("project scope changed before the request settled")]
    ScopeChanged,
    #[error("board actor shut down")]
    Shutdown,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Read-only view of the board, published after every visible change.
#[derive(Clone, Debug, Default)]
pub struct BoardSnapshot {
    pub store: EntityStore,
    pub connection: SubscriptionState,
    /// Connectivity warning while the live feed retries.
    pub warning: Option<String>,
    /// Message of the last failed full refresh, cleared by the next success.
    pub refresh_error: Option<String>,
    /// Bumped on every publish.
    pub version: u64,
}

impl BoardSnapshot {
    pub fn scope(&self) -> Option<&ProjectScope> {
        self.store.scope()
    }
}

// ============================================================================
// Commands (internal)
// ============================================================================

type Reply<T> = oneshot::Sender<Result<T, BoardError>>;

/// Sent from BoardHandle → BoardActor.
enum BoardCommand {
    Activate { scope: ProjectScope, reply: Reply<()> },
    Deactivate { reply: oneshot::Sender<()> },
    Move { id: WorkItemId, target: Stage, reply: Reply<MoveOutcome> },
    RefreshNow { reply: Reply<()> },
    CompareRevision { section: SpecSection, revision_id: String, reply: Reply<RevisionDiff> },
}

type RefreshResult = Result<(Vec<WorkItem>, Vec<SubjectCount>), TransportError>;

/// Posted back to the actor by spawned remote calls.
enum Completion {
    Refreshed {
        epoch: u64,
        result: RefreshResult,
        reply: Option<Reply<()>>,
    },
    MoveSettled {
        epoch: u64,
        pending: PendingMove,
        result: Result<WorkItem, TransportError>,
        reply: Reply<MoveOutcome>,
    },
}

// ============================================================================
// BoardHandle (Send + Sync public API)
// ============================================================================

/// Cloneable handle to a running board actor.
///
/// Mutating methods send a command and await the reply. Reads go through the
/// watch channel and never wait on the actor.
#[derive(Clone)]
pub struct BoardHandle {
    tx: mpsc::UnboundedSender<BoardCommand>,
    snapshots: watch::Receiver<BoardSnapshot>,
}

impl BoardHandle {
    /// Switch the board to `scope` and load it.
    ///
    /// Resolves when the initial full load settles. The feed stays open even
    /// if that load fails; the next refresh can still populate the board.
    pub async fn activate_scope(&self, scope: ProjectScope) -> Result<(), BoardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::Activate { scope, reply })
            .map_err(|_| BoardError::Shutdown)?;
        rx.await.map_err(|_| BoardError::Shutdown)?
    }

    /// Close the feed, cancel pending refreshes and clear the board.
    pub async fn deactivate(&self) -> Result<(), BoardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::Deactivate { reply })
            .map_err(|_| BoardError::Shutdown)?;
        rx.await.map_err(|_| BoardError::Shutdown)
    }

    /// Move a work item to `target` optimistically.
    ///
    /// The local stage changes before the server answers; observers see it
    /// through [`subscribe`](Self::subscribe) while this call is pending.
    pub async fn move_item(&self, id: WorkItemId, target: Stage) -> Result<MoveOutcome, BoardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::Move { id, target, reply })
            .map_err(|_| BoardError::Shutdown)?;
        rx.await.map_err(|_| BoardError::Shutdown)?
    }

    /// Run a full refresh now, outside the debounce.
    pub async fn refresh_now(&self) -> Result<(), BoardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::RefreshNow { reply })
            .map_err(|_| BoardError::Shutdown)?;
        rx.await.map_err(|_| BoardError::Shutdown)?
    }

    /// Diff a revision of a spec section against the revision before it.
    pub async fn compare_revision(
        &self,
        section: SpecSection,
        revision_id: &str,
    ) -> Result<RevisionDiff, BoardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::CompareRevision {
                section,
                revision_id: revision_id.to_string(),
                reply,
            })
            .map_err(|_| BoardError::Shutdown)?;
        rx.await.map_err(|_| BoardError::Shutdown)?
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> BoardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch for new snapshots.
    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshots.clone()
    }
}

// ============================================================================
// BoardActor (internal)
// ============================================================================

struct BoardActor {
    transport: Arc<dyn BoardTransport>,
    store: EntityStore,
    mutations: MutationExecutor,
    subscriber: EventSubscriber,
    coalescer: RefreshCoalescer,
    /// Bumped on every activation and teardown.
    epoch: u64,
    refresh_error: Option<String>,
    published: u64,
    completions: mpsc::UnboundedSender<Completion>,
    snapshots: watch::Sender<BoardSnapshot>,
}

impl BoardActor {
    /// Process commands, completions and feed signals until every handle is dropped.
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<BoardCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut feed: mpsc::UnboundedReceiver<FeedEnvelope>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = completions.recv() => self.handle_completion(done),
                Some(envelope) = feed.recv() => self.handle_feed(envelope),
                _ = until(self.coalescer.deadline()) => self.refresh_due(),
            }
        }
        self.subscriber.close();
        debug!("board actor shutting down: all handles dropped");
    }

    fn handle_command(&mut self, cmd: BoardCommand) {
        match cmd {
            BoardCommand::Activate { scope, reply } => self.activate(scope, reply),
            BoardCommand::Deactivate { reply } => {
                self.teardown(None);
                self.publish();
                let _ = reply.send(());
            }
            BoardCommand::Move { id, target, reply } => self.begin_move(id, target, reply),
            BoardCommand::RefreshNow { reply } => {
                if self.store.scope().is_none() {
                    let _ = reply.send(Err(BoardError::NoActiveScope));
                    return;
                }
                self.spawn_refresh(Some(reply));
            }
            BoardCommand::CompareRevision { section, revision_id, reply } => {
                self.compare_revision(section, revision_id, reply);
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Refreshed { epoch, result, reply } => {
                let outcome = self.apply_refresh(epoch, result);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Completion::MoveSettled { epoch, pending, result, reply } => {
                if epoch != self.epoch {
                    self.mutations.abandon(&pending);
                    let _ = reply.send(Err(BoardError::ScopeChanged));
                    return;
                }
                let outcome = self.mutations.settle(&mut self.store, pending, result);
                if outcome.is_ok() {
                    self.coalescer.schedule();
                }
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    fn handle_feed(&mut self, envelope: FeedEnvelope) {
        let dispatch = self.subscriber.on_signal(envelope, &mut self.store, &mut self.coalescer);
        if dispatch.is_visible() {
            self.publish();
        }
    }

    fn refresh_due(&mut self) {
        if self.coalescer.take_due(Instant::now()) {
            trace!("quiet window elapsed, refreshing");
            self.spawn_refresh(None);
        }
    }

    // ── Scope ────────────────────────────────────────────────────────────

    /// Close the feed, cancel the debounce and clear the store.
    fn teardown(&mut self, next: Option<ProjectScope>) {
        self.epoch = self.epoch.wrapping_add(1);
        self.subscriber.close();
        if self.coalescer.cancel() {
            debug!("cancelled pending refresh on scope change");
        }
        self.store.reset(next);
        self.refresh_error = None;
    }

    fn activate(&mut self, scope: ProjectScope, reply: Reply<()>) {
        self.teardown(Some(scope.clone()));
        info!(%scope, epoch = self.epoch, "activating board scope");
        self.subscriber.open_for(self.transport.as_ref(), scope, self.epoch);
        self.publish();
        self.spawn_refresh(Some(reply));
    }

    // ── Refresh ──────────────────────────────────────────────────────────

    /// Fetch the list and the counters concurrently for the current epoch.
    fn spawn_refresh(&mut self, reply: Option<Reply<()>>) {
        let Some(scope) = self.store.scope().cloned() else {
            if let Some(reply) = reply {
                let _ = reply.send(Err(BoardError::NoActiveScope));
            }
            return;
        };
        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = futures::try_join!(
                transport.fetch_list(&scope),
                transport.fetch_open_question_counts(&scope),
            );
            let _ = completions.send(Completion::Refreshed { epoch, result, reply });
        });
    }

    fn apply_refresh(&mut self, epoch: u64, result: RefreshResult) -> Result<(), BoardError> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "discarding refresh for a closed scope");
            return Err(BoardError::ScopeChanged);
        }
        match result {
            Ok((mut items, counts)) => {
                if let Some(scope) = self.store.scope() {
                    let fetched = items.len();
                    items.retain(|item| item.scope() == scope);
                    if items.len() < fetched {
                        warn!(%scope, dropped = fetched - items.len(), "refresh returned work items of another scope");
                    }
                }
                self.store.replace_all(items, counts);
                self.refresh_error = None;
                if let Some(scope) = self.store.scope() {
                    info!(%scope, items = self.store.len(), "board refreshed");
                }
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "board refresh failed, keeping local state");
                self.refresh_error = Some(e.to_string());
                self.publish();
                Err(BoardError::RefreshFailed(e))
            }
        }
    }

    // ── Moves ────────────────────────────────────────────────────────────

    fn begin_move(&mut self, id: WorkItemId, target: Stage, reply: Reply<MoveOutcome>) {
        let Some(scope) = self.store.scope().cloned() else {
            let _ = reply.send(Err(BoardError::NoActiveScope));
            return;
        };
        let pending = match self.mutations.begin(&mut self.store, &id, target) {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                let _ = reply.send(Ok(MoveOutcome::Unchanged));
                return;
            }
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };
        self.publish();

        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = transport.move_remote(&scope, &pending.id, pending.target).await;
            let _ = completions.send(Completion::MoveSettled { epoch, pending, result, reply });
        });
    }

    // ── History ──────────────────────────────────────────────────────────

    fn compare_revision(&self, section: SpecSection, revision_id: String, reply: Reply<RevisionDiff>) {
        let Some(scope) = self.store.scope().cloned() else {
            let _ = reply.send(Err(BoardError::NoActiveScope));
            return;
        };
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = match transport.fetch_section_history(&scope, section).await {
                Ok(history) => compare_with_previous(&history, &revision_id)
                    .ok_or(BoardError::RevisionNotFound(revision_id)),
                Err(e) => Err(BoardError::HistoryFailed(e)),
            };
            let _ = reply.send(result);
        });
    }

    fn publish(&mut self) {
        self.published = self.published.wrapping_add(1);
        self.snapshots.send_replace(BoardSnapshot {
            store: self.store.clone(),
            connection: self.subscriber.state(),
            warning: self.subscriber.warning().map(str::to_owned),
            refresh_error: self.refresh_error.clone(),
            version: self.published,
        });
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Spawn a board actor on the current tokio runtime.
///
/// The actor starts with no active scope and runs until every
/// [`BoardHandle`] is dropped, closing its live feed on the way out.
pub fn spawn_board(transport: Arc<dyn BoardTransport>, config: SyncConfig) -> BoardHandle {
    let (tx, commands) = mpsc::unbounded_channel();
    let (completions_tx, completions) = mpsc::unbounded_channel();
    let (feed_tx, feed) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots) = watch::channel(BoardSnapshot::default());

    let actor = BoardActor {
        transport,
        store: EntityStore::new(),
        mutations: MutationExecutor::new(),
        subscriber: EventSubscriber::new(config.disconnect_notice.clone(), feed_tx),
        coalescer: RefreshCoalescer::new(config.quiet_window()),
        epoch: 0,
        refresh_error: None,
        published: 0,
        completions: completions_tx,
        snapshots: snapshots_tx,
    };
    tokio::spawn(actor.run(commands, completions, feed));
    BoardHandle { tx, snapshots }
}
