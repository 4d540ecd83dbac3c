//! Graceful shutdown coordination
//!
//! Stopping a run happens in two phases. `Graceful` tells every virtual
//! user to begin no new iteration while letting an in-flight request finish;
//! if users are still busy when the graceful timeout elapses, `Forced` tells
//! them to abandon whatever they are waiting on.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

/// Shutdown signal types with escalating urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownSignal {
    /// Start no new work, let in-flight work complete
    Graceful,
    /// Abandon in-flight work immediately
    Forced,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Forced => write!(f, "forced"),
        }
    }
}

/// Graceful shutdown coordinator
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
    state: Arc<RwLock<Option<ShutdownSignal>>>,
    active_tasks: Arc<AtomicU32>,
    graceful_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with the default graceful timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    /// Create a new shutdown coordinator with a custom graceful timeout
    pub fn with_timeout(graceful_timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(16);

        Self {
            sender,
            state: Arc::new(RwLock::new(None)),
            active_tasks: Arc::new(AtomicU32::new(0)),
            graceful_timeout,
        }
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> ShutdownListener {
        // Subscribe before any state read so a signal is either seen in the
        // shared state or delivered through the channel.
        let receiver = self.sender.subscribe();
        ShutdownListener {
            receiver,
            state: Arc::clone(&self.state),
            latest: None,
        }
    }

    /// Check if shutdown is in progress
    pub async fn is_shutting_down(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Increment active task counter
    pub fn task_started(&self) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement active task counter
    pub fn task_completed(&self) {
        let _ = self
            .active_tasks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
    }

    /// Register a task and decrement the counter when the guard drops
    pub fn track(&self) -> ActiveTaskGuard {
        self.task_started();
        ActiveTaskGuard {
            active_tasks: Arc::clone(&self.active_tasks),
        }
    }

    /// Get current active task count
    pub fn active_task_count(&self) -> u32 {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Initiate shutdown with escalating urgency
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        // Prevent multiple simultaneous shutdowns
        {
            let mut state = self.state.write().await;
            if state.is_some() {
                return Err(ShutdownError::AlreadyShuttingDown);
            }
            *state = Some(ShutdownSignal::Graceful);
        }

        info!("Starting graceful shutdown");
        self.broadcast(ShutdownSignal::Graceful);

        if self.wait_for_tasks(self.graceful_timeout).await {
            info!("Graceful shutdown completed successfully");
            return Ok(());
        }

        warn!(
            "Graceful shutdown timeout with {} tasks active, forcing shutdown",
            self.active_task_count()
        );
        *self.state.write().await = Some(ShutdownSignal::Forced);
        self.broadcast(ShutdownSignal::Forced);

        // Give a brief moment for forced shutdown to take effect
        if self.wait_for_tasks(Duration::from_millis(500)).await {
            info!("Forced shutdown completed successfully");
            return Ok(());
        }

        let remaining_tasks = self.active_task_count();
        error!(
            "Forced shutdown completed with {} tasks still active",
            remaining_tasks
        );
        Err(ShutdownError::TasksRemaining(remaining_tasks))
    }

    fn broadcast(&self, signal: ShutdownSignal) {
        // No receivers simply means nobody is running
        if self.sender.send(signal).is_err() {
            info!("No active listeners for {} shutdown signal", signal);
        }
    }

    /// Wait for all tasks to complete within the given timeout
    async fn wait_for_tasks(&self, timeout_duration: Duration) -> bool {
        let start = tokio::time::Instant::now();

        loop {
            let active = self.active_task_count();
            if active == 0 {
                return true;
            }
            if start.elapsed() >= timeout_duration {
                return false;
            }

            // Adaptive sleep based on task count
            let sleep_duration = if active > 10 {
                Duration::from_millis(100)
            } else {
                Duration::from_millis(20)
            };

            tokio::time::sleep(sleep_duration).await;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active task counter on drop
pub struct ActiveTaskGuard {
    active_tasks: Arc<AtomicU32>,
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        let _ = self
            .active_tasks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
    }
}

/// Per-task view of the shutdown signals
///
/// All waits are cancel-safe and may be used as `tokio::select!` branches.
pub struct ShutdownListener {
    receiver: broadcast::Receiver<ShutdownSignal>,
    state: Arc<RwLock<Option<ShutdownSignal>>>,
    latest: Option<ShutdownSignal>,
}

impl ShutdownListener {
    /// Strongest signal observed so far, without waiting
    pub async fn current(&mut self) -> Option<ShutdownSignal> {
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => self.observe(signal),
                Err(broadcast::error::TryRecvError::Lagged(_))
                | Err(broadcast::error::TryRecvError::Closed) => {
                    self.observe(ShutdownSignal::Forced)
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
            }
        }
        let shared = *self.state.read().await;
        if let Some(shared) = shared {
            self.observe(shared);
        }
        self.latest
    }

    /// Whether any stop signal has been issued
    pub async fn stop_requested(&mut self) -> bool {
        self.current().await.is_some()
    }

    /// Resolve once any stop signal has been issued
    pub async fn wait_for_stop(&mut self) -> ShutdownSignal {
        self.wait_for(ShutdownSignal::Graceful).await
    }

    /// Resolve once the forced stop signal has been issued
    pub async fn wait_for_forced(&mut self) {
        self.wait_for(ShutdownSignal::Forced).await;
    }

    async fn wait_for(&mut self, at_least: ShutdownSignal) -> ShutdownSignal {
        if let Some(signal) = self.current().await {
            if signal >= at_least {
                return signal;
            }
        }

        loop {
            match self.receiver.recv().await {
                Ok(signal) => self.observe(signal),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    warn!("Shutdown signal lagged, assuming forced shutdown");
                    self.observe(ShutdownSignal::Forced);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.observe(ShutdownSignal::Forced);
                }
            }

            if let Some(signal) = self.latest {
                if signal >= at_least {
                    return signal;
                }
            }
        }
    }

    fn observe(&mut self, signal: ShutdownSignal) {
        self.latest = Some(self.latest.map_or(signal, |seen| seen.max(signal)));
    }
}

/// Shutdown error types
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// Shutdown already in progress
    #[error("Shutdown already in progress")]
    AlreadyShuttingDown,

    /// Tasks remaining after forced shutdown
    #[error("Forced shutdown completed with {0} tasks still active")]
    TasksRemaining(u32),
}
