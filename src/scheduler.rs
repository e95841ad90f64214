use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prefs::{PreferenceStore, PrefsError};
use crate::settings::SchedulerSettings;
use crate::worker::{CheckOutcome, QuakeWorker};

/// Gate run before every check: no connectivity, no run.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Treats the network as up when a TCP connection to `host:port` opens in time.
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self::new(
            settings.probe_host.clone(),
            settings.probe_port,
            Duration::from_secs(settings.probe_timeout_secs),
        )
    }
}

#[async_trait]
impl NetworkProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        let addr = format!("{}:{}", self.host, self.port);
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }
}

pub struct AlwaysOnline;

#[async_trait]
impl NetworkProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Shortest cadence accepted from configuration.
pub const MIN_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Timing of one periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConfig {
    pub interval: Duration,
    pub flex: Duration,
    pub initial_delay: Duration,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl JobConfig {
    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        let mut interval = Duration::from_secs(settings.interval_secs);
        if interval < MIN_INTERVAL {
            warn!(
                "scheduler.interval_secs = {} is below the {}s minimum, using the minimum",
                settings.interval_secs,
                MIN_INTERVAL.as_secs()
            );
            interval = MIN_INTERVAL;
        }

        Self {
            interval,
            flex: Duration::from_secs(settings.flex_secs),
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            retry_base: Duration::from_secs(settings.retry_base_secs.max(1)),
            retry_max: Duration::from_secs(settings.retry_max_secs),
        }
    }

    /// Interval plus a random share of the flex window.
    pub fn next_delay(&self) -> Duration {
        if self.flex.is_zero() {
            return self.interval;
        }
        let jitter_ms = rand::rng().random_range(0..=self.flex.as_millis() as u64);
        self.interval + Duration::from_millis(jitter_ms)
    }

    /// Exponential backoff for the n-th consecutive retry (1-based), capped at `retry_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.retry_base.saturating_mul(1u32 << shift);
        delay.min(self.retry_max)
    }
}

struct JobHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs named periodic jobs. Enqueueing under an existing name replaces that job.
#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobHandle>> {
        // A panicking job never holds this lock, so the map is still consistent.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enqueue_unique_periodic(
        &self,
        name: &str,
        config: JobConfig,
        probe: Arc<dyn NetworkProbe>,
        worker: QuakeWorker,
        outcomes: Option<mpsc::Sender<CheckOutcome>>,
    ) {
        let cancel = CancellationToken::new();
        let job_name = name.to_string();
        let job_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_job(job_name, config, probe, worker, outcomes, job_cancel).await;
        });

        let mut jobs = self.jobs();
        if let Some(previous) = jobs.insert(name.to_string(), JobHandle { cancel, task }) {
            info!("Replacing periodic job '{}'", name);
            previous.cancel.cancel();
            previous.task.abort();
        } else {
            info!(
                "Scheduled periodic job '{}' every {:?} (+{:?} flex)",
                name, config.interval, config.flex
            );
        }
    }

    /// Stop a job. Returns `false` if nothing was scheduled under `name`.
    pub fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs();
        match jobs.remove(name) {
            Some(job) => {
                info!("Cancelled periodic job '{}'", name);
                job.cancel.cancel();
                job.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.jobs()
            .get(name)
            .map_or(false, |j| !j.task.is_finished())
    }

    pub fn shutdown(&self) {
        let mut jobs = self.jobs();
        for (name, job) in jobs.drain() {
            debug!("Stopping job '{}'", name);
            job.cancel.cancel();
            job.task.abort();
        }
    }
}

async fn run_job(
    name: String,
    config: JobConfig,
    probe: Arc<dyn NetworkProbe>,
    mut worker: QuakeWorker,
    outcomes: Option<mpsc::Sender<CheckOutcome>>,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = tokio::time::sleep(config.initial_delay) => {}
        _ = cancel.cancelled() => return,
    }

    let mut attempt: u32 = 0;
    loop {
        let delay = if !probe.is_online().await {
            debug!("Job '{}': network unavailable, skipping run", name);
            config.next_delay()
        } else {
            let outcome = tokio::select! {
                outcome = worker.run_check() => outcome,
                _ = cancel.cancelled() => return,
            };

            let delay = if outcome.is_retry() {
                attempt += 1;
                let backoff = config.backoff(attempt);
                warn!("Job '{}': run failed, retry #{} in {:?}", name, attempt, backoff);
                backoff
            } else {
                attempt = 0;
                config.next_delay()
            };

            if let Some(tx) = &outcomes {
                if tx.try_send(outcome).is_err() {
                    debug!("Job '{}': outcome listener lagging, dropped report", name);
                }
            }
            delay
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

/// Builds a fresh worker every time monitoring (re)starts.
pub type WorkerFactory = Arc<dyn Fn() -> QuakeWorker + Send + Sync>;

/// Ties the notifications switch to the periodic job: enabling schedules it,
/// disabling cancels it.
pub struct MonitoringControl {
    scheduler: Arc<Scheduler>,
    prefs: Arc<dyn PreferenceStore>,
    factory: WorkerFactory,
    probe: Arc<dyn NetworkProbe>,
    config: JobConfig,
    job_name: String,
    outcomes: Option<mpsc::Sender<CheckOutcome>>,
}

impl MonitoringControl {
    pub fn new(
        scheduler: Arc<Scheduler>,
        prefs: Arc<dyn PreferenceStore>,
        factory: WorkerFactory,
        probe: Arc<dyn NetworkProbe>,
        settings: &SchedulerSettings,
    ) -> Self {
        Self {
            scheduler,
            prefs,
            factory,
            probe,
            config: JobConfig::from_settings(settings),
            job_name: settings.name.clone(),
            outcomes: None,
        }
    }

    pub fn with_job_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_outcomes(mut self, tx: mpsc::Sender<CheckOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn start(&self) {
        self.scheduler.enqueue_unique_periodic(
            &self.job_name,
            self.config,
            self.probe.clone(),
            (self.factory)(),
            self.outcomes.clone(),
        );
    }

    pub fn stop(&self) {
        self.scheduler.cancel(&self.job_name);
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_scheduled(&self.job_name)
    }

    pub fn notifications_enabled(&self) -> Result<bool, PrefsError> {
        self.prefs.notifications_enabled()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), PrefsError> {
        self.prefs.set_notifications_enabled(enabled)?;
        if enabled {
            self.start();
        } else {
            self.stop();
        }
        Ok(())
    }

    /// Start monitoring if the stored switch is on.
    pub fn resume(&self) -> Result<bool, PrefsError> {
        let enabled = self.prefs.notifications_enabled()?;
        if enabled {
            self.start();
        }
        Ok(enabled)
    }

    /// Bring the job in line with the stored switch, which another process may
    /// have changed. Returns whether monitoring is now running.
    pub fn reconcile(&self) -> Result<bool, PrefsError> {
        let enabled = self.prefs.notifications_enabled()?;
        let running = self.is_running();
        if enabled && !running {
            info!("Notifications switched on, starting '{}'", self.job_name);
            self.start();
        } else if !enabled && running {
            info!("Notifications switched off, stopping '{}'", self.job_name);
            self.stop();
        }
        Ok(enabled)
    }

    /// Reconcile every `period` until `cancel` fires.
    pub fn spawn_watch(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.reconcile() {
                            warn!("Could not read notification preference: {}", e);
                        }
                    }
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }
}
