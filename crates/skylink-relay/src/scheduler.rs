//! Task scheduler with cooperative shutdown
//!
//! Every long-running loop gets a [`StopSignal`] and checks it each
//! iteration. [`TaskScheduler::shutdown`] raises the signal and waits a
//! bounded time for the tasks to finish. Tasks still running after the
//! grace period are logged, not aborted.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Shared stop flag observed by every task
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the stop flag is raised
    pub async fn stopped(&mut self) {
        // an error means the scheduler is gone, which also means stop
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Outcome of a shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub finished: Vec<String>,
    /// Tasks that did not stop within the grace period
    pub stragglers: Vec<String>,
    /// Tasks that panicked
    pub failed: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty() && self.failed.is_empty()
    }
}

/// Spawns named tasks and stops them together
pub struct TaskScheduler {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            tasks: Vec::new(),
        }
    }

    /// A new handle on the stop flag
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.stop_tx.subscribe(),
        }
    }

    /// Spawn a task built from a fresh stop signal
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!("Starting task {}", name);
        let handle = tokio::spawn(task(self.stop_signal()));
        self.tasks.push((name, handle));
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Raise the stop flag without waiting
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop every task and wait up to `grace` for them to finish
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        info!("Stopping {} tasks", self.tasks.len());
        self.request_stop();

        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();
        for (name, mut handle) in self.tasks.drain(..) {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished.push(name),
                Ok(Err(e)) => {
                    warn!("Task {} failed: {}", name, e);
                    report.failed.push(name);
                }
                Err(_) => {
                    warn!("Task {} did not stop within {:?}", name, grace);
                    report.stragglers.push(name);
                }
            }
        }
        report
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}
