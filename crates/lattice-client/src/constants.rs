//! Client configuration constants.
//!
//! Centralizes defaults so [`SyncConfig`](crate::SyncConfig) and the tests
//! agree on them.

use std::time::Duration;

/// Quiet window between the first "something changed" signal of a burst and
/// the single full refresh it produces.
pub const REFRESH_QUIET_WINDOW: Duration = Duration::from_millis(250);

/// Notice surfaced while the live feed is down and the transport retries.
pub const DISCONNECT_NOTICE: &str = "Live updates disconnected, retrying...";
