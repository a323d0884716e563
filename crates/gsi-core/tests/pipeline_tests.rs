//! Integration tests for the ingest pipeline as a whole.
//!
//! These drive [`IngestPipeline`] with raw bodies, the way the HTTP layer
//! does, and observe the results through the tracker, the stats and
//! registered listeners.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gsi_core::{
    FilterChain, GameStateUpdate, IngestError, IngestPipeline, ListenerRegistry, RawUpdate,
    RequireAuthToken, SessionContext, SessionError, SessionTracker, StateFilter, StateListener,
};
use gsi_types::MapPhase;
use serde_json::{Value, json};

fn raw(body: &Value) -> RawUpdate {
    let client: SocketAddr = "127.0.0.1:53000".parse().unwrap();
    RawUpdate::new(body.to_string().into_bytes(), "/", client)
}

/// Records the map phase of every update it sees.
#[derive(Default)]
struct PhaseRecorder {
    phases: Mutex<Vec<String>>,
}

impl StateListener for PhaseRecorder {
    fn name(&self) -> &str {
        "phase-recorder"
    }

    fn on_update(&self, update: &GameStateUpdate) -> anyhow::Result<()> {
        let phase = update
            .state
            .map
            .as_ref()
            .and_then(|map| map.phase.as_ref())
            .map(|phase| phase.raw().to_owned())
            .unwrap_or_default();
        self.phases.lock().unwrap().push(phase);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn three_listeners_one_failing() {
    let pipeline = IngestPipeline::default();
    let calls = Arc::new(AtomicUsize::new(0));
    for name in ["first", "second"] {
        let calls = Arc::clone(&calls);
        pipeline.listeners().register_fn(name, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    pipeline
        .listeners()
        .register_fn("failing", |_| Err(anyhow::anyhow!("listener refused update")));

    let outcome = pipeline
        .ingest(raw(&json!({ "map": { "name": "de_dust2" } })))
        .await
        .unwrap();
    let report = outcome.fan_out.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.stats().snapshot().accepted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_phase_is_accepted_and_delivered_raw() {
    let pipeline = IngestPipeline::default();
    let recorder = Arc::new(PhaseRecorder::default());
    pipeline.listeners().register_arc(Arc::clone(&recorder) as Arc<dyn StateListener>);

    pipeline
        .ingest(raw(&json!({ "map": { "name": "de_dust2", "phase": "live", "round": 3 } })))
        .await
        .unwrap();
    let outcome = pipeline
        .ingest(raw(&json!({ "map": { "name": "de_dust2", "phase": "de_dust3_beta", "round": 4 } })))
        .await
        .unwrap();

    let phase = outcome.update.state.map.as_ref().unwrap().phase.clone().unwrap();
    assert_eq!(phase.matched(), None);
    assert_eq!(phase.raw(), "de_dust3_beta");
    assert_eq!(
        *recorder.phases.lock().unwrap(),
        vec![String::from("live"), String::from("de_dust3_beta")]
    );

    let latest = pipeline.tracker().latest().unwrap();
    assert_eq!(latest.sequence(), 2);
    assert!(!latest
        .state
        .map
        .as_ref()
        .unwrap()
        .phase
        .as_ref()
        .unwrap()
        .is(MapPhase::Live));
}

#[tokio::test]
async fn missing_token_is_forbidden_and_session_unchanged() {
    let filters = FilterChain::new().with(RequireAuthToken::new("password", "letmein"));
    let pipeline = IngestPipeline::new(filters, Arc::new(ListenerRegistry::default()));

    let err = pipeline
        .ingest(raw(&json!({ "map": { "name": "de_dust2" } })))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert_eq!(pipeline.stats().snapshot().rejected, 1);
    assert!(pipeline.tracker().is_empty());

    let accepted = pipeline
        .ingest(raw(&json!({ "auth": { "password": "letmein" }, "map": {} })))
        .await
        .unwrap();
    assert_eq!(accepted.update.sequence(), 1);
}

#[tokio::test]
async fn reset_restarts_sequence_at_one() {
    let pipeline = IngestPipeline::default();
    for _ in 0..3 {
        pipeline.ingest(raw(&json!({}))).await.unwrap();
    }
    assert_eq!(pipeline.tracker().next_sequence(), 4);
    pipeline.tracker().reset();
    let outcome = pipeline.ingest(raw(&json!({}))).await.unwrap();
    assert_eq!(outcome.update.sequence(), 1);
    assert!(outcome.update.context.is_first());
}

/// Resets the session while the update is between context build and commit.
struct ResetsSession {
    tracker: Arc<SessionTracker>,
}

impl StateFilter for ResetsSession {
    fn permits(&self, _context: &SessionContext) -> bool {
        self.tracker.reset();
        true
    }

    fn describe(&self) -> String {
        String::from("resets session")
    }
}

#[tokio::test]
async fn reset_mid_ingest_never_commits_a_stale_sequence() {
    let tracker = Arc::new(SessionTracker::new());
    let warmup = IngestPipeline::default().with_tracker(Arc::clone(&tracker));
    for _ in 0..3 {
        warmup.ingest(raw(&json!({}))).await.unwrap();
    }
    let server = warmup.server_id();
    assert_eq!(tracker.next_sequence(), 4);

    let filters = FilterChain::new().with(ResetsSession {
        tracker: Arc::clone(&tracker),
    });
    let racing = IngestPipeline::new(filters, Arc::new(ListenerRegistry::default()))
        .with_tracker(Arc::clone(&tracker));
    let err = racing.ingest(raw(&json!({}))).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Session(SessionError::OutOfOrder {
            committed: 0,
            attempted: 4
        })
    ));
    assert!(tracker.is_empty());
    assert_eq!(racing.stats().snapshot().session_conflicts, 1);

    let outcome = warmup.ingest(raw(&json!({}))).await.unwrap();
    assert_eq!(outcome.update.sequence(), 1);
    assert_eq!(outcome.update.context.server_id(), server);
}

#[tokio::test]
async fn heartbeats_are_flagged() {
    let pipeline = IngestPipeline::default();
    let first = pipeline.ingest(raw(&json!({ "map": {} }))).await.unwrap();
    assert!(!first.update.context.is_heartbeat());
    let quiet = pipeline.ingest(raw(&json!({ "map": {} }))).await.unwrap();
    assert!(quiet.update.context.is_heartbeat());
    let delta = pipeline
        .ingest(raw(&json!({ "map": {}, "added": { "player": true } })))
        .await
        .unwrap();
    assert!(!delta.update.context.is_heartbeat());
}
