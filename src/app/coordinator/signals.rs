//! Signal handling for graceful cancellation
//!
//! Ctrl-C and SIGTERM are turned into a cancellation request on the run's
//! [`TransferRegistry`]. Cancellation is cooperative: in-flight transfers are
//! aborted, nothing new starts and the session still joins every task.

use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::session::TransferRegistry;

/// Cancels a run when the process is asked to stop
pub struct SignalHandler {
    registry: Arc<TransferRegistry>,
}

impl SignalHandler {
    pub fn new(registry: Arc<TransferRegistry>) -> Self {
        Self { registry }
    }

    /// Spawns the task watching for Ctrl-C and SIGTERM
    ///
    /// The task ends after the first signal; abort it once the run is over.
    pub fn setup(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                match signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C signal received"),
                    Err(e) => {
                        warn!("Failed to install Ctrl+C handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("SIGTERM signal received");
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }

            if registry.cancel() {
                info!("Cancelling downloads");
            }
        })
    }
}
