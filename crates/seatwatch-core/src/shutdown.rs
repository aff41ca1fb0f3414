//! Graceful shutdown coordination
//!
//! One root [`CancellationToken`] fans out to the ticker, tracker, delivery
//! consumer and bot. Long-lived tasks hold a [`TaskGuard`]; `shutdown()`
//! cancels the root token and then waits (bounded) until every guard is
//! dropped.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//!
//! let guard = shutdown.register_task("tracker");
//! let token = shutdown.token();
//! tokio::spawn(async move {
//!     tracker.run(ticks, token).await;
//!     drop(guard);
//! });
//!
//! wait_for_shutdown_signal().await;
//! shutdown.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default shutdown timeout in seconds
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Cancellation sent, waiting for tasks to finish their current work
    Draining,
    /// Timeout exceeded with tasks still registered
    TimedOut,
    /// All tasks finished
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown controller shared by every background task
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase_tx: watch::Sender<ShutdownPhase>,
    shutdown_initiated: AtomicBool,
    active_tasks: AtomicU32,
    timeout: Duration,
}

impl ShutdownController {
    /// Create a controller with the default timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
    }

    /// Create a controller with a custom timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(ShutdownPhase::Running);
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase_tx,
            shutdown_initiated: AtomicBool::new(false),
            active_tasks: AtomicU32::new(0),
            timeout,
        })
    }

    /// Child token for one component
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase_tx.borrow()
    }

    /// Register a long-lived task; the guard must live as long as the task
    pub fn register_task(self: &Arc<Self>, name: &'static str) -> TaskGuard {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        debug!(task = name, "Task registered");
        TaskGuard {
            controller: Arc::clone(self),
            name,
        }
    }

    /// Number of registered tasks still running
    #[must_use]
    pub fn active_task_count(&self) -> u32 {
        self.active_tasks.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase_tx.send_replace(phase);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Cancel everything and wait for registered tasks, at most the timeout
    ///
    /// Returns `true` if every task finished in time. Calling it again
    /// after the first call is a no-op returning `false`.
    pub async fn shutdown(&self) -> bool {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return false;
        }

        info!("Initiating graceful shutdown...");
        self.set_phase(ShutdownPhase::Draining);
        self.cancel_token.cancel();

        let deadline = tokio::time::Instant::now() + self.timeout;
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_task_count();
            if active == 0 {
                self.set_phase(ShutdownPhase::Terminated);
                info!("All tasks completed gracefully");
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    active_tasks = active,
                    timeout_secs = self.timeout.as_secs(),
                    "Shutdown timeout exceeded, abandoning remaining tasks"
                );
                self.set_phase(ShutdownPhase::TimedOut);
                return false;
            }

            debug!(active_tasks = active, "Waiting for tasks to complete...");
            tokio::time::sleep(check_interval).await;
        }
    }
}

/// Keeps a task counted as active until dropped
pub struct TaskGuard {
    controller: Arc<ShutdownController>,
    name: &'static str,
}

impl TaskGuard {
    /// Child token of the controller
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.controller.token()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.controller.active_tasks.fetch_sub(1, Ordering::SeqCst);
        debug!(task = self.name, "Task finished");
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
