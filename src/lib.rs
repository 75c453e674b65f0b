//! # manuscript-export
//!
//! Backend library for bulk manuscript file export: retrieves a
//! manuscript's files from an upstream content service, categorizes them,
//! streams live progress to any number of observers, packages the results
//! into a single downloadable archive with a manifest, and supports
//! mid-flight cancellation.
//!
//! ## Design Philosophy
//!
//! manuscript-export is designed to be:
//! - **Partial-failure tolerant** - One bad file never sinks an export;
//!   failures become manifest entries
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - Embeddable Rust crate; the REST surface in
//!   [`api`] is optional
//! - **Event-driven** - Observers register with the progress hub, no
//!   polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use manuscript_export::{Config, ExportRequest, ManuscriptExporter, ManuscriptId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exporter = ManuscriptExporter::new(Config::default())?;
//!
//!     let request = ExportRequest::new(ManuscriptId::new("MS-2024-001"));
//!     let output = exporter.export(request).await?;
//!     std::fs::write(&output.filename, &output.archive)?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Archive packaging
pub mod archive;
/// Per-manuscript cancellation signals
pub mod cancel;
/// File categorization and scope resolution
pub mod categorize;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export orchestration (decomposed into focused submodules)
pub mod exporter;
/// Progress hub and push channels
pub mod progress;
/// Core types and events
pub mod types;
/// Upstream content service client
pub mod upstream;

use std::sync::Arc;

// Re-export commonly used types
pub use cancel::CancellationCoordinator;
pub use config::{Config, UpstreamConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use exporter::{ExportOutput, ExportRequest, ManuscriptExporter};
pub use progress::{ProgressHub, RegistrationGuard};
pub use types::{
    Category, DataSource, DownloadedFile, FileListing, FileRef, JobId, Manifest, ManuscriptId,
    ProgressEvent, Scope,
};

/// Serve the REST API with graceful signal handling.
///
/// Runs the API server until it stops on its own or a termination signal
/// arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use manuscript_export::{Config, ManuscriptExporter, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let exporter = ManuscriptExporter::new(config.clone())?;
///
///     run_with_shutdown(exporter, config).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(exporter: ManuscriptExporter, config: Config) -> Result<()> {
    let exporter = Arc::new(exporter);
    let config = Arc::new(config);

    tokio::select! {
        result = api::start_api_server(exporter, config) => result,
        _ = wait_for_signal() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
