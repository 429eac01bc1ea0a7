use std::sync::Arc;

use crate::config::Config;
use crate::documents::FsDocumentStore;
use crate::job_store::JobStore;
use crate::queue::JobTransport;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub uploads: Arc<FsDocumentStore>,
    pub transport: Arc<dyn JobTransport>,
    pub config: Config,
}
