use super::{MicelogOrchestrator, ShutdownReason, ShutdownReport};
use crate::error::{MicelogError, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

/// Cloneable handle that asks a running orchestrator to shut down
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: SharedSender,
}

impl ShutdownHandle {
    /// Request shutdown. Returns false if shutdown was already requested.
    pub async fn request(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

impl MicelogOrchestrator {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: Arc::clone(&self.shutdown_sender),
        }
    }

    /// Wait for a termination request (signal or handle), then shut down
    pub async fn run(&mut self) -> Result<ShutdownReport> {
        info!("micelog is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| MicelogError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        let signal_tasks = self.setup_signal_handlers();

        let shutdown_reason = shutdown_receiver.await.map_err(|_| MicelogError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        for task in signal_tasks {
            task.abort();
        }

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let report = self.shutdown().await?;

        info!("micelog shutdown complete");
        Ok(report)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let handle = self.shutdown_handle();
            tasks.push(tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    handle
                        .request(ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            }));
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let handle = self.shutdown_handle();
        tasks.push(tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle
                    .request(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        }));

        tasks
    }
}
