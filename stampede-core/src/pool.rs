use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt as _;
use stampede_metrics::TagSet;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::builtin::{HTTP_REQS, IterationMetrics};
use crate::config::{DEFAULT_DRAIN_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::error::Result;
use crate::progress::{ProgressFn, ProgressUpdate};
use crate::schedule::RampingSchedule;
use crate::vu::{RunContext, Scenario, VuContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub poll_interval: Duration,
    pub drain_timeout: Duration,
    pub think_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            think_time: Duration::ZERO,
        }
    }
}

/// Asks one worker to stop after its current iteration.
#[derive(Debug, Default)]
pub struct RetireSignal {
    retired: AtomicBool,
    notify: Notify,
}

impl RetireSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            // Registered before the flag check so a concurrent `retire` is not missed.
            let notified = self.notify.notified();
            if self.is_retired() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Default)]
pub struct PoolStats {
    total_iterations: AtomicU64,
    failed_iterations: AtomicU64,
    live: AtomicU64,
    max_observed: AtomicU64,
}

impl PoolStats {
    pub fn total_iterations(&self) -> u64 {
        self.total_iterations.load(Ordering::Relaxed)
    }

    pub fn failed_iterations(&self) -> u64 {
        self.failed_iterations.load(Ordering::Relaxed)
    }

    pub fn live(&self) -> u64 {
        self.live.load(Ordering::Relaxed)
    }

    pub fn max_observed_vus(&self) -> u64 {
        self.max_observed.load(Ordering::Relaxed)
    }

    fn record_iteration(&self, ok: bool) {
        self.total_iterations.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_iterations.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn enter(self: &Arc<Self>, exited: Arc<AtomicBool>) -> LiveGuard {
        let now_live = self.live.fetch_add(1, Ordering::Relaxed).saturating_add(1);

        // CAS loop to keep the max without races.
        let mut cur = self.max_observed.load(Ordering::Relaxed);
        while now_live > cur {
            match self.max_observed.compare_exchange_weak(
                cur,
                now_live,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }

        LiveGuard {
            stats: self.clone(),
            exited,
        }
    }
}

/// Held by a worker task for its whole life. Dropping it (normal exit, panic
/// or abort) lowers the live count and flags the slot as gone.
struct LiveGuard {
    stats: Arc<PoolStats>,
    exited: Arc<AtomicBool>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.stats.live.fetch_sub(1, Ordering::Relaxed);
        self.exited.store(true, Ordering::Release);
    }
}

/// A worker the controller still counts towards the population.
struct Slot {
    vu_id: u64,
    retire: Arc<RetireSignal>,
    exited: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    /// Completed iterations, failed ones included.
    pub total_iterations: u64,
    pub failed_iterations: u64,
    pub max_observed_vus: u64,
    /// Workers still busy when the drain timeout expired.
    pub aborted_vus: u64,
    /// Schedule time plus drain.
    pub elapsed: Duration,
}

/// Keeps the number of live workers in line with a [`RampingSchedule`].
pub struct VuPool<S: Scenario> {
    schedule: RampingSchedule,
    config: PoolConfig,
    run: Arc<RunContext>,
    scenario: Arc<S>,
    stats: Arc<PoolStats>,
}

impl<S: Scenario> VuPool<S> {
    pub fn new(
        schedule: RampingSchedule,
        config: PoolConfig,
        run: Arc<RunContext>,
        scenario: Arc<S>,
    ) -> Self {
        Self {
            schedule,
            config,
            run,
            scenario,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.stats.clone()
    }

    /// Drives the population until the schedule ends, then drains.
    pub async fn run(self, progress: Option<ProgressFn>) -> Result<PoolReport> {
        let requests = self.run.registry.counter(HTTP_REQS, &TagSet::empty())?;
        let total = self.schedule.total_duration();

        let started = Instant::now();

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut workers: JoinSet<()> = JoinSet::new();
        let mut slots: Vec<Slot> = Vec::new();
        let mut next_vu_id: u64 = 1;
        let mut tick_id: u64 = 0;

        tracing::info!(
            stages = self.schedule.stages().len(),
            total = ?total,
            "vu pool started"
        );

        loop {
            // Stage ends are sampled exactly, not rounded to the poll quantum.
            let boundary = self.schedule.next_boundary(started.elapsed()).unwrap_or(total);
            let sample = tokio::select! {
                biased;
                () = tokio::time::sleep_until(started + boundary) => boundary,
                _ = interval.tick() => started.elapsed(),
            };

            reap(&mut workers);
            let before = slots.len();
            slots.retain(|s| !s.exited.load(Ordering::Acquire));
            if slots.len() < before {
                tracing::warn!(
                    lost = before - slots.len(),
                    "workers exited unexpectedly; replacing them"
                );
            }

            let point = self.schedule.poll(sample);
            if point.finished {
                // The last stage's target still holds at the deadline.
                let last = self.schedule.target_at(total);
                self.resize(&mut workers, &mut slots, &mut next_vu_id, last, total)?;
                break;
            }

            let desired = point.target;
            self.resize(&mut workers, &mut slots, &mut next_vu_id, desired, sample)?;

            if let Some(progress) = &progress {
                tick_id = tick_id.saturating_add(1);
                (progress)(ProgressUpdate {
                    tick: tick_id,
                    elapsed: sample,
                    total_duration: total,
                    stage: self.schedule.stage_snapshot_at(sample),
                    target: desired,
                    live_vus: self.stats.live(),
                    iterations_total: self.stats.total_iterations(),
                    requests_total: requests.value(),
                });
            }
        }

        for slot in slots.drain(..) {
            slot.retire.retire();
        }
        tracing::info!(in_flight = workers.len(), "deadline reached; draining");

        let aborted_vus =
            match tokio::time::timeout(self.config.drain_timeout, join_all(&mut workers)).await {
                Ok(()) => 0,
                Err(_) => {
                    let survivors = workers.len() as u64;
                    tracing::warn!(
                        survivors,
                        drain_timeout = ?self.config.drain_timeout,
                        "drain timeout expired; aborting in-flight iterations"
                    );
                    workers.abort_all();
                    while workers.join_next().await.is_some() {}
                    survivors
                }
            };

        let report = PoolReport {
            total_iterations: self.stats.total_iterations(),
            failed_iterations: self.stats.failed_iterations(),
            max_observed_vus: self.stats.max_observed_vus(),
            aborted_vus,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            iterations = report.total_iterations,
            max_vus = report.max_observed_vus,
            "vu pool finished"
        );
        Ok(report)
    }

    /// Spawns or retires (newest first) until `desired` workers are counted.
    fn resize(
        &self,
        workers: &mut JoinSet<()>,
        slots: &mut Vec<Slot>,
        next_vu_id: &mut u64,
        desired: u64,
        elapsed: Duration,
    ) -> Result<()> {
        let live = slots.len() as u64;
        if desired > live {
            for _ in live..desired {
                let slot = self.spawn_worker(workers, *next_vu_id)?;
                *next_vu_id = next_vu_id.saturating_add(1);
                slots.push(slot);
            }
        } else if desired < live {
            for _ in desired..live {
                if let Some(slot) = slots.pop() {
                    tracing::trace!(vu = slot.vu_id, "retiring worker");
                    slot.retire.retire();
                }
            }
        }
        if desired != live {
            tracing::info!(
                elapsed = ?elapsed,
                from = live,
                to = desired,
                "vu population changed"
            );
        }
        Ok(())
    }

    fn spawn_worker(&self, workers: &mut JoinSet<()>, vu_id: u64) -> Result<Slot> {
        let ctx = VuContext::new(vu_id, self.run.clone())?;
        let iteration_metrics = IterationMetrics::resolve(&self.run.registry)?;
        let retire = Arc::new(RetireSignal::new());
        let exited = Arc::new(AtomicBool::new(false));
        let guard = self.stats.enter(exited.clone());

        let worker = Worker {
            scenario: self.scenario.clone(),
            ctx,
            retire: retire.clone(),
            stats: self.stats.clone(),
            iteration_metrics,
            think_time: self.config.think_time,
        };
        workers.spawn(async move {
            let _guard = guard;
            worker.run().await;
        });

        Ok(Slot {
            vu_id,
            retire,
            exited,
        })
    }
}

struct Worker<S> {
    scenario: Arc<S>,
    ctx: VuContext,
    retire: Arc<RetireSignal>,
    stats: Arc<PoolStats>,
    iteration_metrics: IterationMetrics,
    think_time: Duration,
}

impl<S: Scenario> Worker<S> {
    async fn run(mut self) {
        while !self.retire.is_retired() {
            self.ctx.begin_iteration();
            let started = Instant::now();
            let outcome = AssertUnwindSafe(self.scenario.iteration(&mut self.ctx))
                .catch_unwind()
                .await;
            self.iteration_metrics.record(started.elapsed());

            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    // Counted as failed; the controller replaces this worker.
                    self.stats.record_iteration(false);
                    tracing::warn!(
                        vu = self.ctx.vu_id(),
                        iteration = self.ctx.iteration(),
                        panic = panic_message(payload.as_ref()),
                        "iteration panicked"
                    );
                    break;
                }
            };
            self.stats.record_iteration(result.is_ok());

            if let Err(err) = result {
                tracing::debug!(
                    vu = self.ctx.vu_id(),
                    iteration = self.ctx.iteration(),
                    error = %err,
                    "iteration failed"
                );
            }

            if self.think_time.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                () = tokio::time::sleep(self.think_time) => {}
                () = self.retire.wait() => break,
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn log_join(res: std::result::Result<(), JoinError>) {
    if let Err(err) = res
        && err.is_panic()
    {
        tracing::warn!(error = %err, "worker panicked");
    }
}

fn reap(workers: &mut JoinSet<()>) {
    while let Some(res) = workers.try_join_next() {
        log_join(res);
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(res) = workers.join_next().await {
        log_join(res);
    }
}
