//! HTTP request pipeline in front of an OLAP aggregation engine.
//!
//! Requests are routed, turned into a [`context::RequestContext`],
//! authorized, forwarded to the engine's [`workspace::Browser`] and the
//! result is streamed back as JSON or CSV.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod cut;
pub mod errors;
pub mod metrics_defs;
pub mod params;
pub mod query;
pub mod render;
pub mod routes;
pub mod service;
pub mod workspace;

#[cfg(test)]
mod testutils;

use config::{Listener, ServerOptions};
use service::{Slicer, SlicerService};
use shared::http::run_http_service;
use std::sync::Arc;
use workspace::Workspace;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves the slicer API on `listener` until accepting connections fails.
pub async fn run(
    listener: &Listener,
    options: ServerOptions,
    workspace: Arc<dyn Workspace>,
) -> Result<(), ServerError> {
    let app = Arc::new(Slicer::new(workspace, options));
    let service = SlicerService::new(app);
    run_http_service(&listener.host, listener.port, service).await
}
