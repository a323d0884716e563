//! Concurrent delivery of committed updates to subscribers.
//!
//! Every registered [`StateListener`] receives each committed update on its
//! own task from the runtime's blocking pool. A delivery that returns an
//! error or panics is logged with the listener's name and counted as
//! failed; it never reaches the pipeline or sibling deliveries.
//!
//! Each fan-out works from a snapshot of the registrations taken when it
//! starts, so listeners can be added or removed while a fan-out is in
//! flight. A listener added mid-fan-out may miss that update.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::session::GameStateUpdate;

/// Default slow-delivery warning threshold.
pub const DEFAULT_SLOW_LISTENER_WARN: Duration = Duration::from_millis(500);

/// A subscriber to committed game state updates.
///
/// Implementations run on a blocking thread and may take their time, but
/// when the pipeline awaits completion a stalled listener stalls ingestion.
pub trait StateListener: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one committed update.
    fn on_update(&self, update: &GameStateUpdate) -> anyhow::Result<()>;
}

/// A named closure registered as a listener.
pub struct FnListener<F> {
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&GameStateUpdate) -> anyhow::Result<()> + Send + Sync + 'static,
{
    /// Wrap `handler` under `name`.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> StateListener for FnListener<F>
where
    F: Fn(&GameStateUpdate) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_update(&self, update: &GameStateUpdate) -> anyhow::Result<()> {
        (self.handler)(update)
    }
}

/// Handle returned by registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Whether the caller waits for deliveries to finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Wait for every delivery before returning.
    #[default]
    Await,
    /// Return immediately; deliveries finish in the background.
    Detached,
}

impl DeliveryMode {
    /// `Await` when `await_completion` is set, else `Detached`.
    pub const fn from_await_completion(await_completion: bool) -> Self {
        if await_completion {
            Self::Await
        } else {
            Self::Detached
        }
    }
}

/// Outcome of an awaited fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Deliveries that returned `Ok`.
    pub delivered: usize,
    /// Deliveries that returned an error or panicked.
    pub failed: usize,
    /// Wall time from dispatch until the last delivery finished.
    pub elapsed: Duration,
}

type Registration = (ListenerId, Arc<dyn StateListener>);

/// The set of registered listeners.
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    slow_threshold: Duration,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_LISTENER_WARN)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.names())
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    /// An empty registry that warns about deliveries slower than
    /// `slow_threshold`.
    pub const fn new(slow_threshold: Duration) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            slow_threshold,
        }
    }

    /// Register a listener.
    pub fn register(&self, listener: impl StateListener) -> ListenerId {
        self.register_arc(Arc::new(listener))
    }

    /// Register a shared listener.
    pub fn register_arc(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(listener = listener.name(), %id, "listener registered");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&GameStateUpdate) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(FnListener::new(name, handler))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the registered listeners, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.name().to_owned())
            .collect()
    }

    fn snapshot(&self) -> Vec<Registration> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver `update` to every registered listener.
    ///
    /// With [`DeliveryMode::Await`] this returns once every delivery has
    /// finished, with a report. With [`DeliveryMode::Detached`] it returns
    /// `None` immediately. Must be called within a Tokio runtime.
    pub async fn fan_out(
        &self,
        update: Arc<GameStateUpdate>,
        mode: DeliveryMode,
    ) -> Option<FanOutReport> {
        let listeners = self.snapshot();
        let sequence = update.sequence();
        let started = Instant::now();
        let mut deliveries = JoinSet::new();
        for (id, listener) in listeners {
            let update = Arc::clone(&update);
            let slow_threshold = self.slow_threshold;
            deliveries.spawn_blocking(move || deliver(id, listener.as_ref(), &update, slow_threshold));
        }

        match mode {
            DeliveryMode::Await => {
                Some(collect(deliveries, sequence, started, self.slow_threshold).await)
            }
            DeliveryMode::Detached => {
                let slow_threshold = self.slow_threshold;
                tokio::spawn(collect(deliveries, sequence, started, slow_threshold));
                None
            }
        }
    }
}

/// Run one delivery, isolating errors and panics.
fn deliver(
    id: ListenerId,
    listener: &dyn StateListener,
    update: &GameStateUpdate,
    slow_threshold: Duration,
) -> bool {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_update(update)));
    let elapsed = started.elapsed();
    if elapsed > slow_threshold {
        warn!(
            listener = listener.name(),
            %id,
            sequence = update.sequence(),
            elapsed_ms = elapsed.as_millis(),
            "slow listener delivery"
        );
    }
    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(
                listener = listener.name(),
                %id,
                sequence = update.sequence(),
                error = %e,
                "listener failed"
            );
            false
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("non-string panic payload"));
            warn!(
                listener = listener.name(),
                %id,
                sequence = update.sequence(),
                panic = %message,
                "listener panicked"
            );
            false
        }
    }
}

async fn collect(
    mut deliveries: JoinSet<bool>,
    sequence: u64,
    started: Instant,
    slow_threshold: Duration,
) -> FanOutReport {
    let mut report = FanOutReport::default();
    while let Some(joined) = deliveries.join_next().await {
        match joined {
            Ok(true) => report.delivered = report.delivered.saturating_add(1),
            Ok(false) => report.failed = report.failed.saturating_add(1),
            Err(e) => {
                warn!(sequence, error = %e, "listener task did not complete");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }
    report.elapsed = started.elapsed();
    if report.elapsed > slow_threshold {
        warn!(
            sequence,
            elapsed_ms = report.elapsed.as_millis(),
            delivered = report.delivered,
            failed = report.failed,
            "slow fan-out"
        );
    } else {
        debug!(
            sequence,
            elapsed_ms = report.elapsed.as_millis(),
            delivered = report.delivered,
            failed = report.failed,
            "fan-out complete"
        );
    }
    report
}
