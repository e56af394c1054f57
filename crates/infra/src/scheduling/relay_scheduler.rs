//! Cron-driven relay runs.
//!
//! Triggers a [`RelayJob`] on a cron schedule. Each run is bounded by the job
//! timeout, and a tick that fires while the previous run is still going is
//! skipped. Start and stop are wrapped in timeouts and the monitor task is
//! cancelled explicitly.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bdaybot_core::RelayService;
//! use bdaybot_domain::ScheduleConfig;
//! use bdaybot_infra::scheduling::{RelayScheduler, RelaySchedulerConfig, SchedulerResult};
//!
//! # async fn example(service: Arc<RelayService>) -> SchedulerResult<()> {
//! let config = RelaySchedulerConfig::from(&ScheduleConfig::default());
//! let mut scheduler = RelayScheduler::with_config(config, service).await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bdaybot_core::RelayService;
use bdaybot_domain::{RelaySummary, Result, ScheduleConfig};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Work executed on every tick.
#[async_trait]
pub trait RelayJob: Send + Sync {
    async fn run(&self) -> Result<RelaySummary>;
}

#[async_trait]
impl RelayJob for RelayService {
    async fn run(&self) -> Result<RelaySummary> {
        RelayService::run(self).await
    }
}

/// Configuration for the relay scheduler.
#[derive(Debug, Clone)]
pub struct RelaySchedulerConfig {
    /// Cron expression with a leading seconds field.
    pub cron_expression: String,
    /// Timeout applied to a single relay run.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for RelaySchedulerConfig {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for RelaySchedulerConfig {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            cron_expression: schedule.cron_expression.clone(),
            job_timeout: Duration::from_secs(schedule.job_timeout_secs),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Relay scheduler with explicit lifecycle management.
pub struct RelayScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: RelaySchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    job: Arc<dyn RelayJob>,
    busy: Arc<AtomicBool>,
}

impl RelayScheduler {
    /// Create a scheduler for `cron_expression` with default timeouts.
    pub async fn new(cron_expression: String, job: Arc<dyn RelayJob>) -> SchedulerResult<Self> {
        let config = RelaySchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, job).await
    }

    /// Create a scheduler with a custom configuration.
    ///
    /// # Errors
    /// Returns `SchedulerError::InvalidSchedule` if the cron expression does
    /// not parse.
    pub async fn with_config(
        config: RelaySchedulerConfig,
        job: Arc<dyn RelayJob>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler =
            JobScheduler::new().await.map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        let scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            job,
            busy: Arc::new(AtomicBool::new(false)),
        };

        scheduler.register_relay_job().await?;
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout {
            operation: "start",
            seconds: start_timeout.as_secs(),
        })?;

        start_result.map_err(|e| SchedulerError::StartFailed(e.to_string()))?;

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(Self::monitor_task(cancel));

        self.monitor_handle = Some(handle);
        info!(cron = %self.config.cron_expression, "scheduler.relay.started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    ///
    /// A relay run already in progress keeps going until its own timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout {
            operation: "stop",
            seconds: stop_timeout.as_secs(),
        })?;

        stop_result.map_err(|e| SchedulerError::StopFailed(e.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout {
                    operation: "join",
                    seconds: join_timeout.as_secs(),
                })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("scheduler.relay.stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Returns true while a relay run is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    async fn register_relay_job(&self) -> SchedulerResult<()> {
        let cron_expr = self.config.cron_expression.clone();
        let job = self.job.clone();
        let busy = self.busy.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let job = job.clone();
            let busy = busy.clone();

            Box::pin(async move {
                execute_run(job.as_ref(), &busy, job_timeout).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule {
            expression: cron_expr.clone(),
            reason: e.to_string(),
        })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job_definition)
            .await
            .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        debug!(cron = %cron_expr, job_id = %job_id, "scheduler.relay.registered");
        Ok(())
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("scheduler.relay.monitor_cancelled");
    }
}

/// One tick: skip when busy, otherwise run under the job timeout.
async fn execute_run(job: &dyn RelayJob, busy: &AtomicBool, job_timeout: Duration) {
    if busy.swap(true, Ordering::SeqCst) {
        warn!("scheduler.relay.skipped: previous run still in progress");
        return;
    }

    let started = Instant::now();
    match tokio::time::timeout(job_timeout, job.run()).await {
        Ok(Ok(summary)) => info!(
            attempted = summary.attempted,
            delivered = summary.delivered.len(),
            failed = summary.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scheduler.relay.run_finished"
        ),
        Ok(Err(err)) => error!(
            error = %err,
            kind = err.kind(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scheduler.relay.run_failed"
        ),
        Err(_) => warn!(timeout_secs = job_timeout.as_secs(), "scheduler.relay.run_timed_out"),
    }

    busy.store(false, Ordering::SeqCst);
}

impl Drop for RelayScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RelayScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use bdaybot_domain::{AuthStatus, RelayError};

    use super::*;

    struct CountingJob {
        runs: AtomicUsize,
        delay: Duration,
    }

    impl CountingJob {
        fn new() -> Self {
            Self::slow(Duration::ZERO)
        }

        fn slow(delay: Duration) -> Self {
            Self { runs: AtomicUsize::new(0), delay }
        }

        fn run_count(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RelayJob for CountingJob {
        async fn run(&self) -> Result<RelaySummary> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(RelaySummary {
                attempted: 0,
                delivered: Vec::new(),
                failures: Vec::new(),
                auth_status: AuthStatus::unknown(),
            })
        }
    }

    struct FailingJob;

    #[async_trait]
    impl RelayJob for FailingJob {
        async fn run(&self) -> Result<RelaySummary> {
            Err(RelayError::TransientConnection("bridge exited".into()))
        }
    }

    fn fast_config() -> RelaySchedulerConfig {
        RelaySchedulerConfig {
            cron_expression: "*/1 * * * * *".into(), // every second
            job_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn config_follows_schedule_settings() {
        let config = RelaySchedulerConfig::from(&ScheduleConfig {
            cron_expression: "0 30 7 * * *".into(),
            job_timeout_secs: 120,
        });
        assert_eq!(config.cron_expression, "0 30 7 * * *");
        assert_eq!(config.job_timeout, Duration::from_secs(120));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_successfully() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            RelayScheduler::with_config(fast_config(), job.clone()).await.expect("scheduler created");

        scheduler.start().await.expect("start succeeds");
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.stop().await.expect("stop succeeds");

        assert!(job.run_count() >= 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler =
            RelayScheduler::with_config(fast_config(), job).await.expect("scheduler created");

        scheduler.start().await.expect("first start");
        let err = scheduler.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        scheduler.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_without_start_is_rejected() {
        let mut scheduler = RelayScheduler::with_config(fast_config(), Arc::new(FailingJob))
            .await
            .expect("scheduler created");

        let err = scheduler.stop().await.expect_err("not running");
        assert!(matches!(err, SchedulerError::NotRunning));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_expression_is_rejected() {
        let config =
            RelaySchedulerConfig { cron_expression: "every morning".into(), ..fast_config() };

        let result = RelayScheduler::with_config(config, Arc::new(CountingJob::new())).await;

        assert!(matches!(result, Err(SchedulerError::InvalidSchedule { .. })));
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let job = Arc::new(CountingJob::slow(Duration::from_millis(200)));
        let busy = AtomicBool::new(false);

        tokio::join!(
            execute_run(job.as_ref(), &busy, Duration::from_secs(1)),
            execute_run(job.as_ref(), &busy, Duration::from_secs(1)),
        );

        assert_eq!(job.run_count(), 1);
        assert!(!busy.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn run_past_timeout_releases_the_busy_flag() {
        let job = CountingJob::slow(Duration::from_secs(60));
        let busy = AtomicBool::new(false);

        execute_run(&job, &busy, Duration::from_secs(5)).await;

        assert_eq!(job.run_count(), 1);
        assert!(!busy.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_run_releases_the_busy_flag() {
        let busy = AtomicBool::new(false);

        execute_run(&FailingJob, &busy, Duration::from_secs(1)).await;

        assert!(!busy.load(Ordering::SeqCst));
    }
}
