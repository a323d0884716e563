//! The single source of truth for "previous state".
//!
//! [`SessionTracker`] holds the latest committed [`GameStateUpdate`], or
//! nothing. A commit is accepted only if it comes from the same server as
//! the previous one and its sequence is strictly greater. The tracker's lock
//! is independent of the ingest pipeline's, so readers of the latest state
//! only contend with the brief commit step.

use std::sync::{Arc, Mutex, PoisonError};

use gsi_types::GameState;
use tracing::{debug, warn};

use crate::context::{ServerId, SessionContext};

/// A committed snapshot together with the context it arrived with.
///
/// Shared read-only between the tracker and every listener.
#[derive(Debug, Clone)]
pub struct GameStateUpdate {
    /// The decoded snapshot.
    pub state: GameState,
    /// Bookkeeping for the update.
    pub context: SessionContext,
}

impl GameStateUpdate {
    /// Position of this update in its session.
    pub const fn sequence(&self) -> u64 {
        self.context.sequence()
    }
}

/// Why a commit was refused. The previously committed update is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The sequence did not advance past the committed one.
    #[error("out-of-order update: sequence {attempted} does not follow {committed}")]
    OutOfOrder {
        /// Sequence of the committed update.
        committed: u64,
        /// Sequence of the refused update.
        attempted: u64,
    },

    /// The update was produced by a different server than the session's.
    #[error("misconfigured session: expected server {expected}, got {found}")]
    MisconfiguredSession {
        /// Server that owns the session.
        expected: ServerId,
        /// Server that produced the refused update.
        found: ServerId,
    },
}

/// Holds the latest committed update and enforces sequencing.
#[derive(Debug, Default)]
pub struct SessionTracker {
    latest: Mutex<Option<Arc<GameStateUpdate>>>,
}

impl SessionTracker {
    /// An empty tracker; the next commit starts a session at sequence 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store `state` with its `context`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MisconfiguredSession`] if the context comes
    /// from another server, or [`SessionError::OutOfOrder`] if its sequence
    /// does not strictly exceed the committed one. An empty tracker only
    /// accepts sequence 1, so a candidate built before a [`reset`](Self::reset)
    /// cannot carry its old sequence into the new session.
    pub fn commit(
        &self,
        state: GameState,
        context: SessionContext,
    ) -> Result<Arc<GameStateUpdate>, SessionError> {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);

        if latest.is_none() && context.sequence() != 1 {
            return Err(SessionError::OutOfOrder {
                committed: 0,
                attempted: context.sequence(),
            });
        }

        if let Some(previous) = latest.as_ref() {
            let previous = &previous.context;
            if previous.server_id() != context.server_id() {
                return Err(SessionError::MisconfiguredSession {
                    expected: previous.server_id(),
                    found: context.server_id(),
                });
            }
            if context.sequence() <= previous.sequence() {
                return Err(SessionError::OutOfOrder {
                    committed: previous.sequence(),
                    attempted: context.sequence(),
                });
            }
            if previous.client() != context.client() {
                warn!(
                    sequence = context.sequence(),
                    previous_client = %previous.client(),
                    client = %context.client(),
                    "game client address changed mid-session"
                );
            }
        }

        debug!(
            sequence = context.sequence(),
            server = %context.server_id(),
            "committed game state"
        );
        let update = Arc::new(GameStateUpdate { state, context });
        *latest = Some(Arc::clone(&update));
        Ok(update)
    }

    /// The latest committed update.
    pub fn latest(&self) -> Option<Arc<GameStateUpdate>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Context of the latest committed update.
    pub fn latest_context(&self) -> Option<SessionContext> {
        self.latest().map(|update| update.context.clone())
    }

    /// Sequence the next commit must carry to extend the session.
    pub fn next_sequence(&self) -> u64 {
        self.latest()
            .map_or(1, |update| update.sequence().saturating_add(1))
    }

    /// Whether nothing has been committed since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Forget the committed update; sequencing restarts at 1.
    pub fn reset(&self) {
        let previous = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            debug!(last_sequence = previous.sequence(), "session reset");
        }
    }
}
