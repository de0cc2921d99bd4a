//! Interrupt handling for interactive tools
//!
//! A long-running operator command must stop applying backend responses once
//! the operator walks away. [`wait_for_shutdown`] resolves on Ctrl+C (and
//! SIGTERM on Unix); [`on_shutdown`] runs a callback when that happens.

use tracing::{info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}. Only Ctrl+C will work", e);
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => { sig.recv().await; },
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Spawn a task that invokes `callback` once a shutdown signal arrives
///
/// Returns the task handle so callers can abort it when they finish first.
pub fn on_shutdown<F>(callback: F) -> tokio::task::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Interrupt received, closing session");
        callback();
    })
}
