//! Stateless request dispatch.
//!
//! | Method | Condition | Result |
//! |--------|-----------|--------|
//! | `POST` | `application/json`, non-empty body | ingest; 200 / 403 / 500 |
//! | `GET`  | diagnostics enabled | diagnostic HTML page |
//! | any    | otherwise | 404 |

use std::net::SocketAddr;
use std::sync::Arc;

use gsi_core::{IngestPipeline, RawUpdate};
use tracing::debug;

use crate::diagnostics;
use crate::http::{HttpRequest, HttpResponse};

/// Routes parsed requests to the pipeline or the diagnostic page.
#[derive(Debug, Clone)]
pub struct Router {
    pipeline: Arc<IngestPipeline>,
    diagnostics: bool,
}

impl Router {
    /// Route into `pipeline`; serve the diagnostic page when `diagnostics`.
    pub const fn new(pipeline: Arc<IngestPipeline>, diagnostics: bool) -> Self {
        Self {
            pipeline,
            diagnostics,
        }
    }

    /// The pipeline behind this router.
    pub const fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    /// Produce the response for one request.
    pub async fn handle(&self, request: HttpRequest, client: SocketAddr) -> HttpResponse {
        match request.method.as_str() {
            "POST" if request.is_json() && !request.body.is_empty() => {
                self.ingest(request, client).await
            }
            "GET" if self.diagnostics => HttpResponse::html(diagnostics::render(&self.pipeline)),
            _ => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    client = %client,
                    "unrouted request"
                );
                HttpResponse::not_found()
            }
        }
    }

    async fn ingest(&self, request: HttpRequest, client: SocketAddr) -> HttpResponse {
        let update = RawUpdate::new(request.body, request.path, client);
        match self.pipeline.ingest(update).await {
            Ok(_) => HttpResponse::accepted(),
            Err(e) => HttpResponse::error(e.status_code(), &e.to_string()),
        }
    }
}
