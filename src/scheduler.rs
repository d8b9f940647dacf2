//! Periodic pricing jobs.
//!
//! Each [`ScheduledJob`] runs on its own timer for the lifetime of the
//! [`SchedulerHandle`], with no ordering between jobs. The first run of a
//! job happens one interval after [`Scheduler::start`].
//!
//! With the default [`OverlapPolicy::Allow`] every tick spawns the action
//! whether or not its previous run has finished. [`OverlapPolicy::Skip`]
//! drops ticks that arrive while the previous run is still going.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, future::BoxFuture};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info};

pub const CALCULATE_AND_EMIT_PRICES_INTERVAL: Duration = Duration::from_millis(900_000);
pub const CLEANUP_OLD_KEY_PRICES_INTERVAL: Duration = Duration::from_millis(1_800_000);
pub const CHECK_KEY_PRICE_STABILITY_INTERVAL: Duration = Duration::from_millis(1_800_000);
pub const UPDATE_MOVING_AVERAGES_INTERVAL: Duration = Duration::from_millis(900_000);

pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Downstream jobs working on listing storage.
///
/// Failures are the job's own concern; the scheduler only starts them.
pub trait PricingJobs: Send + Sync + 'static {
    fn calculate_and_emit_prices(&self) -> impl Future<Output = ()> + Send;

    fn cleanup_old_key_prices(&self) -> impl Future<Output = ()> + Send;

    fn check_key_price_stability(&self) -> impl Future<Output = ()> + Send;

    fn update_moving_averages(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Clone, derive_more::Debug)]
pub struct ScheduledJob {
    name: String,
    interval: Duration,
    #[debug(skip)]
    action: JobAction,
}

impl ScheduledJob {
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            interval,
            action: Arc::new(move || action().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Whether a tick may start a run while the previous one is in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    #[default]
    Allow,
    Skip,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    overlap: OverlapPolicy,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four pricing jobs at their fixed intervals.
    pub fn standard<J: PricingJobs>(jobs: Arc<J>) -> Self {
        macro_rules! job {
            ($name:ident, $interval:expr) => {{
                let jobs = jobs.clone();
                ScheduledJob::new(stringify!($name), $interval, move || {
                    let jobs = jobs.clone();
                    async move { jobs.$name().await }
                })
            }};
        }

        Self::new()
            .register(job!(calculate_and_emit_prices, CALCULATE_AND_EMIT_PRICES_INTERVAL))
            .register(job!(cleanup_old_key_prices, CLEANUP_OLD_KEY_PRICES_INTERVAL))
            .register(job!(check_key_price_stability, CHECK_KEY_PRICE_STABILITY_INTERVAL))
            .register(job!(update_moving_averages, UPDATE_MOVING_AVERAGES_INTERVAL))
    }

    pub fn with_overlap_policy(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn register(mut self, job: ScheduledJob) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Starts one timer per job.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let overlap = self.overlap;
        let started_at = Instant::now();
        let timers = self
            .jobs
            .into_iter()
            .map(|job| {
                info!(job = %job.name, interval = ?job.interval, "Scheduling job");
                tokio::spawn(run_job(job, started_at, overlap))
            })
            .collect();
        SchedulerHandle { timers }
    }
}

/// Timers of a started [`Scheduler`].
///
/// Dropping the handle leaves the timers running.
#[derive(Debug)]
pub struct SchedulerHandle {
    timers: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops all timers. Runs already in progress are not interrupted.
    pub fn abort(&self) {
        for timer in &self.timers {
            timer.abort();
        }
    }
}

async fn run_job(job: ScheduledJob, started_at: Instant, overlap: OverlapPolicy) {
    let running = Arc::new(AtomicBool::new(false));
    let mut ticks = interval_at(started_at + job.interval, job.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        match overlap {
            OverlapPolicy::Allow => {
                tokio::spawn((job.action)());
            }
            OverlapPolicy::Skip => {
                if running.swap(true, Ordering::AcqRel) {
                    debug!(job = %job.name, "Previous run still in progress, skipping");
                    continue;
                }
                let guard = RunningGuard(running.clone());
                let run = (job.action)();
                tokio::spawn(async move {
                    let _guard = guard;
                    run.await;
                });
            }
        }
    }
}

/// Clears the running flag when the run completes or is cancelled.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
