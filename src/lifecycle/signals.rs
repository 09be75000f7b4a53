//! OS signal handling.
//!
//! SIGINT and SIGTERM both stop the gateway immediately; in-flight requests
//! are not drained.

use crate::lifecycle::shutdown::Shutdown;

/// Resolves on the first termination signal and returns its name.
pub async fn wait_for_termination() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Trigger `shutdown` when the process is asked to terminate.
pub fn spawn_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        let signal = wait_for_termination().await;
        tracing::info!(signal, "Shutdown signal received");
        shutdown.trigger();
    });
}
