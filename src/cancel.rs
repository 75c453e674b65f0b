//! Per-job cancellation tracking
//!
//! The coordinator holds one [`CancellationToken`] per manuscript with an
//! export in flight. The orchestrator checks the token between files, and
//! the upstream client composes it with its per-request timeouts so either
//! signal can abort an in-flight fetch (cancellation wins if both fire).

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::types::ManuscriptId;

/// Registry of cancellation signals for in-flight export jobs
#[derive(Clone, Default)]
pub struct CancellationCoordinator {
    jobs: Arc<tokio::sync::Mutex<HashMap<String, CancellationToken>>>,
}

impl CancellationCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cancellation token for a manuscript's export, creating one
    /// if no job is registered yet
    pub async fn token(&self, manuscript_id: &ManuscriptId) -> CancellationToken {
        let mut jobs = self.jobs.lock().await;
        jobs.entry(manuscript_id.to_string())
            .or_default()
            .clone()
    }

    /// Trip the cancellation signal for a manuscript's export.
    ///
    /// Returns true if a job was registered (whether or not it had already
    /// been cancelled).
    pub async fn cancel(&self, manuscript_id: &ManuscriptId) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.get(manuscript_id.as_str()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether the manuscript's export has been cancelled
    pub async fn is_cancelled(&self, manuscript_id: &ManuscriptId) -> bool {
        let jobs = self.jobs.lock().await;
        jobs.get(manuscript_id.as_str())
            .is_some_and(|token| token.is_cancelled())
    }

    /// Drop the manuscript's token once its job has finished
    pub async fn remove(&self, manuscript_id: &ManuscriptId) {
        let mut jobs = self.jobs.lock().await;
        jobs.remove(manuscript_id.as_str());
    }
}
