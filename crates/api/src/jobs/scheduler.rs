//! Interval scheduler for background jobs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A periodic background task.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Time between runs. The first run happens one interval after start.
    fn interval(&self) -> Duration;

    async fn execute(&self) -> Result<(), String>;
}

/// Runs registered jobs on their intervals until shut down.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Spawns one task per registered job.
    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting job scheduler");

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let mut interval = tokio::time::interval(job.interval());
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                // Skip the immediate first tick
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let start = std::time::Instant::now();
                            match job.execute().await {
                                Ok(()) => tracing::debug!(
                                    job = name,
                                    elapsed_ms = start.elapsed().as_millis() as u64,
                                    "Job completed"
                                ),
                                Err(e) => error!(
                                    job = name,
                                    elapsed_ms = start.elapsed().as_millis() as u64,
                                    error = %e,
                                    "Job failed"
                                ),
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signals every job to stop. Returns immediately.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for job tasks to finish, up to `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let handles = self.handles;
        let joined = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, joined).await {
            Ok(()) => info!("All jobs stopped"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
