//! The state ingestion pipeline.
//!
//! One call to [`IngestPipeline::ingest`] runs these steps in order, each a
//! hard boundary:
//!
//! 1. parse the body as a JSON object,
//! 2. extract auth tokens (a malformed `auth` section degrades to none),
//! 3. build the candidate [`SessionContext`] from the committed one,
//! 4. run the [`FilterChain`],
//! 5. decode the typed [`GameState`],
//! 6. commit through the [`SessionTracker`],
//! 7. fan out to listeners.
//!
//! Steps 1-6 run under one async mutex per pipeline, so commits are strictly
//! serialized. A request arriving mid-pipeline waits for the lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gsi_types::{DecodeError, GameState};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GsiConfig;
use crate::context::{AuthTokens, RawUpdate, ServerId, SessionContext};
use crate::filter::{FilterChain, FilterRejection};
use crate::listener::{DeliveryMode, FanOutReport, ListenerRegistry};
use crate::session::{GameStateUpdate, SessionError, SessionTracker};

/// Why an update was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The body is not valid JSON.
    #[error("malformed body: {source}")]
    MalformedBody {
        /// The JSON syntax error.
        source: serde_json::Error,
    },

    /// The body is valid JSON but not an object.
    #[error("malformed body: top-level value is not a JSON object")]
    NotAnObject,

    /// A filter rejected the update.
    #[error(transparent)]
    Filtered(#[from] FilterRejection),

    /// The document could not be decoded into a game state.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The session tracker refused the commit.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IngestError {
    /// HTTP status reported to the game client.
    ///
    /// Only a filter rejection is a client-side refusal; every other
    /// failure to ingest is reported as 500.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Filtered(_) => 403,
            Self::MalformedBody { .. } | Self::NotAnObject | Self::Decode(_) | Self::Session(_) => {
                500
            }
        }
    }
}

/// Result of an accepted update.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The committed update.
    pub update: Arc<GameStateUpdate>,
    /// Fan-out result, when deliveries were awaited.
    pub fan_out: Option<FanOutReport>,
}

/// Monotonic ingest counters.
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    filtered: AtomicU64,
    decode_failed: AtomicU64,
    session_conflicts: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Updates committed.
    pub accepted: u64,
    /// Updates rejected for any reason.
    pub rejected: u64,
    /// Rejected for an unparseable or non-object body.
    pub malformed: u64,
    /// Rejected by a filter.
    pub filtered: u64,
    /// Rejected because decoding failed.
    pub decode_failed: u64,
    /// Rejected by the session tracker.
    pub session_conflicts: u64,
}

impl IngestStats {
    fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self, error: &IngestError) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        let kind = match error {
            IngestError::MalformedBody { .. } | IngestError::NotAnObject => &self.malformed,
            IngestError::Filtered(_) => &self.filtered,
            IngestError::Decode(_) => &self.decode_failed,
            IngestError::Session(_) => &self.session_conflicts,
        };
        kind.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            session_conflicts: self.session_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrates parse, filter, decode, commit and fan-out.
#[derive(Debug)]
pub struct IngestPipeline {
    server_id: ServerId,
    commit_lock: Mutex<()>,
    tracker: Arc<SessionTracker>,
    filters: FilterChain,
    listeners: Arc<ListenerRegistry>,
    delivery: DeliveryMode,
    stats: IngestStats,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(FilterChain::new(), Arc::new(ListenerRegistry::default()))
    }
}

impl IngestPipeline {
    /// A pipeline with its own tracker that awaits listener completion.
    pub fn new(filters: FilterChain, listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            server_id: ServerId::new(),
            commit_lock: Mutex::new(()),
            tracker: Arc::new(SessionTracker::new()),
            filters,
            listeners,
            delivery: DeliveryMode::Await,
            stats: IngestStats::default(),
        }
    }

    /// A pipeline configured from `config`, with a fresh listener registry.
    pub fn from_config(config: &GsiConfig) -> Self {
        let listeners = Arc::new(ListenerRegistry::new(config.listeners.slow_listener_warn()));
        Self::new(FilterChain::from_config(&config.filters), listeners).with_delivery(
            DeliveryMode::from_await_completion(config.listeners.await_completion),
        )
    }

    /// Use `tracker` instead of a private one.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<SessionTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set the fan-out mode.
    #[must_use]
    pub const fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// Identity stamped on every context this pipeline builds.
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// The session tracker.
    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    /// The listener registry.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// The filter chain.
    pub const fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// The fan-out mode.
    pub const fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    /// Ingest counters.
    pub const fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Run one update through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the [`IngestError`] of the first step that failed. Listener
    /// failures never produce an error.
    pub async fn ingest(&self, raw: RawUpdate) -> Result<IngestOutcome, IngestError> {
        let committed = {
            let _serialized = self.commit_lock.lock().await;
            self.commit(raw)
        };
        let update = match committed {
            Ok(update) => update,
            Err(error) => {
                self.stats.record_rejected(&error);
                return Err(error);
            }
        };
        self.stats.record_accepted();

        let fan_out = if self.listeners.is_empty() {
            None
        } else {
            self.listeners.fan_out(Arc::clone(&update), self.delivery).await
        };
        Ok(IngestOutcome { update, fan_out })
    }

    /// Steps 1-6. Called with the commit lock held.
    fn commit(&self, raw: RawUpdate) -> Result<Arc<GameStateUpdate>, IngestError> {
        let document: Value = serde_json::from_slice(&raw.body).map_err(|source| {
            debug!(client = %raw.client, error = %source, "malformed update body");
            IngestError::MalformedBody { source }
        })?;
        if !document.is_object() {
            debug!(client = %raw.client, "update body is not a JSON object");
            return Err(IngestError::NotAnObject);
        }

        let auth = AuthTokens::from_document(&document).unwrap_or_else(|e| {
            warn!(client = %raw.client, error = %e, "ignoring malformed auth section");
            AuthTokens::empty()
        });

        let previous = self.tracker.latest();
        let context = SessionContext::candidate(
            self.server_id,
            previous.as_ref().map(|update| &update.context),
            raw,
            document,
            auth,
        );

        self.filters.check(&context)?;

        let state = GameState::from_document(context.document()).inspect_err(|e| {
            warn!(
                sequence = context.sequence(),
                client = %context.client(),
                error = %e,
                "failed to decode game state"
            );
        })?;

        let sequence = context.sequence();
        let heartbeat = context.is_heartbeat();
        let update = self
            .tracker
            .commit(state, context)
            .inspect_err(|e| warn!(sequence, error = %e, "commit refused"))?;
        info!(sequence, heartbeat, "game state accepted");
        Ok(update)
    }
}
