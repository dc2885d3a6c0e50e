use crate::core::{StoreError, StoreResult};
use crate::storage::EventArchiver;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Schedule of the archival worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivalConfig {
    /// Time between the starts of two consecutive runs.
    pub period: Duration,
    /// Ceiling on a single run; a slower run is abandoned.
    pub run_timeout: Duration,
}

impl ArchivalConfig {
    pub fn new(period: Duration, run_timeout: Duration) -> Self {
        Self {
            period,
            run_timeout,
        }
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.period.is_zero() {
            return Err("archive period must be > 0".to_string());
        }

        if self.run_timeout.is_zero() {
            return Err("archive run timeout must be > 0".to_string());
        }

        if self.run_timeout >= self.period {
            return Err("archive run timeout must be shorter than the period".to_string());
        }

        Ok(())
    }
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60), Duration::from_secs(30))
    }
}

/// Observable lifecycle of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Terminal: the shutdown signal was observed.
    Stopped,
}

/// How a single archival run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    TimedOut,
}

/// Periodically moves past events into the archived state.
///
/// The worker holds nothing but the archiver it was given, so it can run
/// against any store while request handlers use the same store concurrently.
/// One run happens as soon as the worker starts and another at every period
/// boundary after that. A failed or timed-out run is logged and the worker
/// simply waits for the next tick.
pub struct ArchivalWorker<A: ?Sized> {
    archiver: Arc<A>,
    config: ArchivalConfig,
    state: watch::Sender<WorkerState>,
}

impl<A> ArchivalWorker<A>
where
    A: EventArchiver + ?Sized + 'static,
{
    pub fn new(archiver: Arc<A>, config: ArchivalConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::InvalidInput)?;
        let (state, _) = watch::channel(WorkerState::Idle);
        Ok(Self {
            archiver,
            config,
            state,
        })
    }

    /// Receiver that follows every state transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Execute one archival run bounded by the configured timeout.
    pub async fn run_once(&self) -> RunOutcome {
        let started = Instant::now();
        let run = self.archiver.archive_old_events();

        match tokio::time::timeout(self.config.run_timeout, run).await {
            Ok(Ok(())) => {
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "archived old events"
                );
                RunOutcome::Completed
            }
            Ok(Err(err)) => {
                warn!(error = %err, "error archiving old events");
                RunOutcome::Failed
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.run_timeout.as_millis() as u64,
                    "archival run timed out"
                );
                RunOutcome::TimedOut
            }
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// Shutdown is observed both between ticks and while a run is in flight;
    /// an in-flight run is dropped rather than awaited.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_secs = self.config.period.as_secs(),
            run_timeout_secs = self.config.run_timeout.as_secs(),
            "archival worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            self.state.send_replace(WorkerState::Running);
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("archival run abandoned at shutdown");
                    break;
                }
                outcome = self.run_once() => outcome,
            };
            self.state.send_replace(WorkerState::Idle);
            debug!(?outcome, "archival run finished");
        }

        self.state.send_replace(WorkerState::Stopped);
        info!("archival worker stopped");
    }

    /// Spawn the worker on the tokio runtime.
    pub fn spawn(self) -> ArchivalWorkerHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let state = self.subscribe();

        let join_handle = tokio::spawn(self.run(async move {
            // A dropped sender stops the worker as well.
            let _ = stop_rx.await;
        }));

        ArchivalWorkerHandle {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
            state,
        }
    }
}

/// Handle to a spawned [`ArchivalWorker`].
pub struct ArchivalWorkerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
    state: watch::Receiver<WorkerState>,
}

impl ArchivalWorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Signals the worker to stop and waits for it to finish.
    pub async fn stop(mut self) -> StoreResult<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| StoreError::internal(format!("archival worker join: {}", err)))?;
        }

        Ok(())
    }
}

impl Drop for ArchivalWorkerHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}
