//! Live feed lifecycle and event dispatch.
//!
//! [`EventSubscriber`] owns at most one live feed, bound to the active scope.
//! The feed stream is drained by a forwarder task that tags every signal with
//! the epoch it was opened under and posts it to the board actor, which hands
//! it back to [`EventSubscriber::on_signal`].
//!
//! ```text
//!            open_for          Opened            Error(..)
//!   Closed ───────────► Connecting ───────► Open ─────────► Retrying
//!     ▲                                      ▲                 │
//!     │ close (from any state)               └──── Opened ─────┘
//! ```
//!
//! The transport reconnects by itself; the subscriber only tracks state and
//! the connectivity warning.

use futures::StreamExt;
use lattice_types::{LiveEvent, ProjectScope};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::coalescer::RefreshCoalescer;
use crate::projector::{Projection, project};
use crate::store::EntityStore;
use crate::transport::{BoardTransport, FeedSignal};

/// Connection state of the live feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    #[default]
    Closed,
    Connecting,
    Open,
    Retrying,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Closed => "closed",
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Open => "open",
            SubscriptionState::Retrying => "retrying",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feed signal tagged with the epoch of the feed that produced it.
#[derive(Clone, Debug)]
pub struct FeedEnvelope {
    pub epoch: u64,
    pub signal: FeedSignal,
}

/// What [`EventSubscriber::on_signal`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Dropped: superseded feed, malformed payload or other scope.
    Ignored,
    /// Connection state or warning changed.
    StateChanged,
    /// Event accepted and a refresh scheduled.
    Applied(Projection),
}

impl Dispatch {
    /// Whether observers should see a new snapshot.
    pub fn is_visible(&self) -> bool {
        match self {
            Dispatch::Ignored => false,
            Dispatch::StateChanged => true,
            Dispatch::Applied(projection) => projection.changed_store(),
        }
    }
}

/// The open feed. Dropping it stops the forwarder, which drops the stream.
struct ActiveFeed {
    scope: ProjectScope,
    epoch: u64,
    forwarder: JoinHandle<()>,
}

impl Drop for ActiveFeed {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

pub struct EventSubscriber {
    state: SubscriptionState,
    active: Option<ActiveFeed>,
    warning: Option<String>,
    disconnect_notice: String,
    envelopes: mpsc::UnboundedSender<FeedEnvelope>,
}

impl EventSubscriber {
    pub fn new(disconnect_notice: String, envelopes: mpsc::UnboundedSender<FeedEnvelope>) -> Self {
        Self {
            state: SubscriptionState::Closed,
            active: None,
            warning: None,
            disconnect_notice,
            envelopes,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Connectivity warning to surface, if any.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn scope(&self) -> Option<&ProjectScope> {
        self.active.as_ref().map(|feed| &feed.scope)
    }

    /// Open a feed for `scope`, closing any existing one first.
    ///
    /// Must run inside a tokio runtime; the forwarder is a spawned task.
    pub fn open_for(&mut self, transport: &dyn BoardTransport, scope: ProjectScope, epoch: u64) {
        self.close();

        let mut feed = transport.open_live_feed(&scope);
        let envelopes = self.envelopes.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(signal) = feed.next().await {
                if envelopes.send(FeedEnvelope { epoch, signal }).is_err() {
                    break;
                }
            }
            trace!(epoch, "live feed ended");
        });

        info!(%scope, epoch, "opening live feed");
        self.active = Some(ActiveFeed { scope, epoch, forwarder });
        self.state = SubscriptionState::Connecting;
    }

    /// Tear down the feed unconditionally.
    pub fn close(&mut self) {
        if let Some(feed) = self.active.take() {
            debug!(scope = %feed.scope, epoch = feed.epoch, "closing live feed");
        }
        self.state = SubscriptionState::Closed;
        self.warning = None;
    }

    /// Handle one signal from a forwarder.
    pub fn on_signal(
        &mut self,
        envelope: FeedEnvelope,
        store: &mut EntityStore,
        coalescer: &mut RefreshCoalescer,
    ) -> Dispatch {
        let Some(active) = self.active.as_ref().filter(|feed| feed.epoch == envelope.epoch) else {
            trace!(epoch = envelope.epoch, "signal from superseded feed");
            return Dispatch::Ignored;
        };

        match envelope.signal {
            FeedSignal::Opened => {
                debug!(scope = %active.scope, "live feed open");
                self.state = SubscriptionState::Open;
                self.warning = None;
                Dispatch::StateChanged
            }
            FeedSignal::Error(message) => {
                warn!(scope = %active.scope, %message, "live feed error, transport retrying");
                self.state = SubscriptionState::Retrying;
                self.warning = Some(self.disconnect_notice.clone());
                Dispatch::StateChanged
            }
            FeedSignal::Message { event, data } => {
                let Some(live) = LiveEvent::decode(Some(&event), &data) else {
                    debug!(%event, "dropping malformed live event");
                    return Dispatch::Ignored;
                };
                if live.scope != active.scope {
                    trace!(event_scope = %live.scope, scope = %active.scope, "dropping event for another scope");
                    return Dispatch::Ignored;
                }

                let projection = project(store, &live);
                coalescer.schedule();
                trace!(action = %live.action, id = ?live.id, "live event accepted");
                Dispatch::Applied(projection)
            }
        }
    }
}
