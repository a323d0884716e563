//! Minimal single-purpose HTTP listener for GSI updates.
//!
//! The game client POSTs one JSON document per connection. [`GsiServer`]
//! accepts connections on a bounded pool of worker tasks, [`http`] reads
//! exactly one request, and [`Router`] hands JSON bodies to the
//! [`IngestPipeline`](gsi_core::IngestPipeline) and serves a diagnostic page
//! on `GET`.
//!
//! # Modules
//!
//! - [`server`] -- [`GsiServer`] start/stop lifecycle and the accept loop
//! - [`router`] -- Method/content-type dispatch
//! - [`http`] -- Request reader and response writer
//! - [`diagnostics`] -- HTML status page
//! - [`error`] -- [`ServerError`] and [`RequestError`]

pub mod diagnostics;
pub mod error;
pub mod http;
pub mod router;
pub mod server;

pub use error::{RequestError, ServerError};
pub use http::{HttpRequest, HttpResponse};
pub use router::Router;
pub use server::GsiServer;
