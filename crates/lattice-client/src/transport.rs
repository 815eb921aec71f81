//! The seam to the server.
//!
//! Request construction, auth headers and error-body parsing live behind
//! [`BoardTransport`]. The sync core only sees typed results and a stream of
//! [`FeedSignal`]s per live feed. Dropping the stream closes the feed.

use async_trait::async_trait;
use futures::stream::BoxStream;
use lattice_types::{ProjectScope, SpecRevision, SpecSection, Stage, SubjectCount, WorkItem, WorkItemId};

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Lifecycle and message callbacks of one live feed, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedSignal {
    /// The transport (re)established the feed.
    Opened,
    /// The transport lost the feed and is retrying underneath.
    Error(String),
    /// A named server-pushed message.
    Message { event: String, data: String },
}

/// Live feed handle: a stream of signals until dropped.
pub type LiveFeed = BoxStream<'static, FeedSignal>;

#[async_trait]
pub trait BoardTransport: Send + Sync + 'static {
    /// Full list of work items for a project.
    async fn fetch_list(&self, scope: &ProjectScope) -> Result<Vec<WorkItem>, TransportError>;

    /// Open-question counts per work item.
    async fn fetch_open_question_counts(
        &self,
        scope: &ProjectScope,
    ) -> Result<Vec<SubjectCount>, TransportError>;

    /// Move a work item on the server. Returns the server's representation,
    /// including any recomputed sort position.
    async fn move_remote(
        &self,
        scope: &ProjectScope,
        id: &WorkItemId,
        target: Stage,
    ) -> Result<WorkItem, TransportError>;

    /// Revision history of one spec section, newest first.
    async fn fetch_section_history(
        &self,
        scope: &ProjectScope,
        section: SpecSection,
    ) -> Result<Vec<SpecRevision>, TransportError>;

    /// Open the live event feed for a project. The transport reconnects on its
    /// own and reports that through [`FeedSignal::Error`] / [`FeedSignal::Opened`].
    fn open_live_feed(&self, scope: &ProjectScope) -> LiveFeed;
}
