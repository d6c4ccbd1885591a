//! Start/stop lifecycle shared by the long-running services
//!
//! A service moves `Stopped -> Starting -> Running -> Stopping -> Stopped`.
//! Its background loop is a tokio task that exits when the oneshot it was
//! handed fires; `stop` sends on that channel and joins the task, the same
//! shape as a `run_with_shutdown(Some(rx))` engine.

use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::error::Result;

/// Observable lifecycle state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

struct Worker {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// State machine plus the handle of the running loop
pub(crate) struct ServiceLifecycle {
    name: &'static str,
    state: Mutex<ServiceState>,
    /// Async lock so concurrent start/stop calls serialize
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl ServiceLifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(ServiceState::Stopped),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.lock() = state;
    }

    /// Run `launch` and keep the task it spawns
    ///
    /// Returns `Ok(false)` without calling `launch` when already running.
    /// If `launch` fails the service returns to `Stopped`.
    pub(crate) async fn start<F, Fut>(&self, launch: F) -> Result<bool>
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = Result<JoinHandle<()>>>,
    {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!(service = self.name, "Service is already running");
            return Ok(false);
        }

        self.set_state(ServiceState::Starting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        match launch(shutdown_rx).await {
            Ok(task) => {
                *worker = Some(Worker { shutdown_tx, task });
                self.set_state(ServiceState::Running);
                Ok(true)
            }
            Err(e) => {
                self.set_state(ServiceState::Stopped);
                Err(e)
            }
        }
    }

    /// Signal the loop and wait for it to exit; a no-op when stopped
    ///
    /// Returns whether a running loop was stopped.
    pub(crate) async fn stop(&self) -> bool {
        let mut worker = self.worker.lock().await;
        let Some(Worker { shutdown_tx, task }) = worker.take() else {
            return false;
        };

        self.set_state(ServiceState::Stopping);
        // The loop may already have exited on its own
        let _ = shutdown_tx.send(());
        if let Err(e) = task.await {
            error!(service = self.name, error = %e, "Service task did not exit cleanly");
        }
        self.set_state(ServiceState::Stopped);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let lifecycle = ServiceLifecycle::new("test");
        assert_eq!(lifecycle.state(), ServiceState::Stopped);

        let started = lifecycle
            .start(|rx| async move {
                Ok(tokio::spawn(async move {
                    let _ = rx.await;
                }))
            })
            .await
            .unwrap();
        assert!(started);
        assert_eq!(lifecycle.state(), ServiceState::Running);

        let again = lifecycle
            .start(|_rx| async { Err(Error::invalid_input("launched twice")) })
            .await
            .unwrap();
        assert!(!again);

        assert!(lifecycle.stop().await);
        assert!(!lifecycle.stop().await);
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_failed_launch_returns_to_stopped() {
        let lifecycle = ServiceLifecycle::new("test");
        let result = lifecycle
            .start(|_rx| async { Err(Error::invalid_input("nope")) })
            .await;

        assert!(result.is_err());
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
        assert!(!lifecycle.stop().await);
    }
}
