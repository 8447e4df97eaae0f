//! Fixed-interval scheduler: run once at startup, then poll for the
//! recurring task until shutdown.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

pub const HOURLY: Duration = Duration::from_secs(60 * 60);
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Work executed on every scheduled run.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// The recurring task: how often it runs and when it is next due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringTask {
    interval: Duration,
    next_run: Instant,
    last_run: Option<Instant>,
}

impl RecurringTask {
    /// First run is due one `interval` after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, next_run: now + interval, last_run: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_run(&self) -> Instant {
        self.next_run
    }

    pub fn last_run(&self) -> Option<Instant> {
        self.last_run
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_run
    }

    /// Record the startup run without moving the hourly schedule.
    pub fn mark_startup_run(&mut self, finished: Instant) {
        self.last_run = Some(finished);
    }

    /// Record a finished run; the next one is `interval` after `finished`.
    pub fn mark_run(&mut self, finished: Instant) {
        self.last_run = Some(finished);
        self.next_run = finished + self.interval;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    poll: Duration,
    task: Option<RecurringTask>,
    state: SchedulerState,
    runs: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(HOURLY, POLL_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(interval: Duration, poll: Duration) -> Self {
        Self { interval, poll, task: None, state: SchedulerState::Idle, runs: 0 }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn task(&self) -> Option<&RecurringTask> {
        self.task.as_ref()
    }

    /// Number of runs executed, successful or not.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Run `job` now and then on every due poll until `shutdown` resolves.
    ///
    /// Shutdown is only observed between runs; a run in progress always
    /// finishes first.
    pub async fn run<J, S>(&mut self, job: &J, shutdown: S)
    where
        J: Job + ?Sized,
        S: Future<Output = ()>,
    {
        let mut task = RecurringTask::new(self.interval, Instant::now());

        self.run_job(job).await;
        task.mark_startup_run(Instant::now());
        self.task = Some(task);
        self.state = SchedulerState::Running;
        log::info!(
            "Scheduler running (every {:?}, polling every {:?})",
            task.interval(),
            self.poll
        );

        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; consume it so polling starts one period out.
        ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    if task.is_due(Instant::now()) {
                        self.run_job(job).await;
                        task.mark_run(Instant::now());
                        self.task = Some(task);
                        log::debug!("Next run in {:?}", task.interval());
                    }
                }
            }
        }

        self.state = SchedulerState::Stopped;
    }

    async fn run_job<J: Job + ?Sized>(&mut self, job: &J) {
        self.runs += 1;
        if let Err(e) = job.run().await {
            log::error!("Weather data collection failed: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct CountingJob {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sink unreachable");
            }
            Ok(())
        }
    }

    #[test]
    fn recurring_task_due_after_interval() {
        let start = Instant::now();
        let mut task = RecurringTask::new(HOURLY, start);

        assert!(!task.is_due(start));
        assert!(!task.is_due(start + Duration::from_secs(3599)));
        assert!(task.is_due(start + HOURLY));
        assert_eq!(task.last_run(), None);

        let finished = start + HOURLY + Duration::from_secs(5);
        task.mark_run(finished);
        assert_eq!(task.last_run(), Some(finished));
        assert_eq!(task.next_run(), finished + HOURLY);
        assert!(!task.is_due(start + HOURLY + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_startup_then_hourly() {
        let job = CountingJob::default();
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // 3h30m: startup run plus hourly runs at 1h, 2h and 3h.
        scheduler
            .run(&job, tokio::time::sleep(Duration::from_secs(3 * 3600 + 1800)))
            .await;

        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
        assert_eq!(scheduler.runs(), 4);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(scheduler.task().and_then(|t| t.last_run()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_shutdown_still_runs_startup_cycle() {
        let job = CountingJob::default();
        let mut scheduler = Scheduler::default();
        let start = Instant::now();

        scheduler.run(&job, std::future::ready(())).await;

        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        let task = scheduler.task().expect("task is set once running");
        assert_eq!(task.last_run(), Some(start));
        assert_eq!(task.next_run(), start + HOURLY);
        assert_eq!(task.interval(), HOURLY);
    }

    #[test]
    fn startup_run_does_not_shift_the_hourly_slot() {
        let start = Instant::now();
        let mut task = RecurringTask::new(HOURLY, start);

        task.mark_startup_run(start + Duration::from_secs(20));
        assert_eq!(task.last_run(), Some(start + Duration::from_secs(20)));
        assert_eq!(task.next_run(), start + HOURLY);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_runs_do_not_stop_the_schedule() {
        let job = CountingJob { fail: true, ..CountingJob::default() };
        let mut scheduler = Scheduler::default();

        scheduler
            .run(&job, tokio::time::sleep(Duration::from_secs(2 * 3600 + 1800)))
            .await;

        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_runs_between_hours() {
        let job = CountingJob::default();
        let mut scheduler = Scheduler::default();

        scheduler.run(&job, tokio::time::sleep(Duration::from_secs(59 * 60))).await;

        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
    }
}
