//! Session tracking, acceptance filters, listener fan-out and the ingest
//! pipeline for GSI telemetry.
//!
//! # Modules
//!
//! - [`context`] -- [`SessionContext`], [`AuthTokens`] and [`RawUpdate`]
//! - [`filter`] -- [`StateFilter`] predicates and the [`FilterChain`]
//! - [`session`] -- [`SessionTracker`], the single source of the previous state
//! - [`listener`] -- [`StateListener`] and concurrent fan-out
//! - [`pipeline`] -- [`IngestPipeline`], parse through fan-out
//! - [`config`] -- [`GsiConfig`] loaded from file and environment

pub mod config;
pub mod context;
pub mod filter;
pub mod listener;
pub mod pipeline;
pub mod session;

pub use config::{ConfigError, GsiConfig, LogFormat};
pub use context::{AuthTokens, AuthTokensError, RawUpdate, ServerId, SessionContext};
pub use filter::{
    AddressAllowList, FilterChain, FilterRejection, LoopbackOnly, PathEquals, RequireAuthToken,
    StateFilter,
};
pub use listener::{
    DeliveryMode, FanOutReport, FnListener, ListenerId, ListenerRegistry, StateListener,
};
pub use pipeline::{IngestError, IngestOutcome, IngestPipeline, IngestStats, IngestStatsSnapshot};
pub use session::{GameStateUpdate, SessionError, SessionTracker};
