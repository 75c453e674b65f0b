//! Application state for the API server

use crate::{Config, ManuscriptExporter};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone); gives handlers access to the
/// exporter and the configuration.
#[derive(Clone)]
pub struct AppState {
    /// The export coordinator
    pub exporter: Arc<ManuscriptExporter>,

    /// Configuration (read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(exporter: Arc<ManuscriptExporter>, config: Arc<Config>) -> Self {
        Self { exporter, config }
    }
}
