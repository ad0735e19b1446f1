//! Job status polling
//!
//! Cancellable interval-based re-fetch of a server-owned resource until
//! it reaches a terminal state. Scheduling is a fixed wall-clock
//! interval: the fetch is awaited inside the tick loop, so at most one
//! request is in flight per subject and a slow fetch delays the next
//! tick rather than stacking requests.

use crate::api::ImportApi;
use crate::error::Result;
use crate::models::{BackgroundJobExecution, ImportJob};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Handle to a running poll task
///
/// Stopping (or dropping) the handle cancels the outstanding timer and
/// discards any in-flight response instead of applying it.
pub struct PollHandle {
    task: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl PollHandle {
    /// Cancel the poll
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether the poll task is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a poll task: fetch once immediately, then on each interval
/// tick, publishing every successful fetch to the returned channel.
///
/// The task exits the moment a fetched value satisfies `is_terminal`.
/// A failed fetch is logged and swallowed; polling continues on the
/// next tick (a transient error is indistinguishable from "not ready").
pub fn spawn_poller<T, F, Fut, P>(
    interval: Duration,
    fetch: F,
    is_terminal: P,
) -> (PollHandle, watch::Receiver<Option<T>>)
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send,
    P: Fn(&T) -> bool + Send + 'static,
{
    let (tx, rx) = watch::channel(None);
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately
            ticker.tick().await;

            match fetch().await {
                Ok(value) => {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let terminal = is_terminal(&value);
                    if tx.send(Some(value)).is_err() {
                        // All subscribers gone
                        return;
                    }
                    if terminal {
                        debug!("Poll subject reached terminal state, stopping");
                        return;
                    }
                }
                Err(e) => {
                    warn!("Poll fetch failed, retrying on next tick: {}", e);
                }
            }
        }
    });

    (PollHandle { task, stopped }, rx)
}

/// A polled job snapshot together with its pipeline execution detail
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job: ImportJob,
    /// Present once the job carries a non-null execution reference and
    /// the dependent fetch has succeeded
    pub execution: Option<BackgroundJobExecution>,
}

struct ActivePoll<T> {
    handle: PollHandle,
    receiver: watch::Receiver<Option<T>>,
}

/// Per-job poll registry with idempotent start
///
/// At most one active poll per job: watching a job that already has a
/// live poller returns the existing subscription instead of starting a
/// second timer.
pub struct JobWatcher {
    api: Arc<dyn ImportApi>,
    interval: Duration,
    jobs: DashMap<i64, ActivePoll<JobSnapshot>>,
    executions: DashMap<i64, ActivePoll<BackgroundJobExecution>>,
}

impl JobWatcher {
    pub fn new(api: Arc<dyn ImportApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            jobs: DashMap::new(),
            executions: DashMap::new(),
        }
    }

    /// Poll an import job until it reaches COMPLETED or FAILED.
    ///
    /// Whenever a polled job carries a job-execution reference, the
    /// step-level detail is fetched alongside and published with the
    /// snapshot; a failure of that dependent fetch degrades to a
    /// snapshot without detail rather than aborting the poll.
    pub fn watch_job(&self, job_id: i64) -> watch::Receiver<Option<JobSnapshot>> {
        if let Some(existing) = self.jobs.get(&job_id) {
            if existing.handle.is_active() {
                return existing.receiver.clone();
            }
        }

        let api = self.api.clone();
        let execution_seen = Arc::new(AtomicBool::new(false));
        let fetch = move || {
            let api = api.clone();
            let execution_seen = execution_seen.clone();
            async move {
                let job = api.get_job(job_id).await?;
                let execution = match job.job_execution_id {
                    Some(execution_id) => {
                        if !execution_seen.swap(true, Ordering::SeqCst) {
                            debug!("Job {} now linked to execution {}", job_id, execution_id);
                        }
                        match api.get_execution(execution_id).await {
                            Ok(execution) => Some(execution),
                            Err(e) => {
                                warn!("Failed to fetch execution {}: {}", execution_id, e);
                                None
                            }
                        }
                    }
                    None => None,
                };
                Ok(JobSnapshot { job, execution })
            }
        };

        let (handle, receiver) = spawn_poller(self.interval, fetch, |snapshot: &JobSnapshot| {
            snapshot.job.status.is_terminal()
        });

        self.jobs.insert(
            job_id,
            ActivePoll {
                handle,
                receiver: receiver.clone(),
            },
        );
        receiver
    }

    /// Poll a background execution directly until terminal (the admin
    /// monitor variant).
    pub fn watch_execution(
        &self,
        execution_id: i64,
    ) -> watch::Receiver<Option<BackgroundJobExecution>> {
        if let Some(existing) = self.executions.get(&execution_id) {
            if existing.handle.is_active() {
                return existing.receiver.clone();
            }
        }

        let api = self.api.clone();
        let fetch = move || {
            let api = api.clone();
            async move { api.get_execution(execution_id).await }
        };

        let (handle, receiver) = spawn_poller(
            self.interval,
            fetch,
            |execution: &BackgroundJobExecution| execution.status.is_terminal(),
        );

        self.executions.insert(
            execution_id,
            ActivePoll {
                handle,
                receiver: receiver.clone(),
            },
        );
        receiver
    }

    /// Whether a live poll exists for the job
    pub fn is_watching(&self, job_id: i64) -> bool {
        self.jobs
            .get(&job_id)
            .map(|p| p.handle.is_active())
            .unwrap_or(false)
    }

    /// Stop the poll for one job (navigation away from its view)
    pub fn stop_job(&self, job_id: i64) {
        if let Some((_, poll)) = self.jobs.remove(&job_id) {
            poll.handle.stop();
        }
    }

    /// Stop every active poll
    pub fn stop_all(&self) {
        for entry in self.jobs.iter() {
            entry.value().handle.stop();
        }
        self.jobs.clear();
        for entry in self.executions.iter() {
            entry.value().handle.stop();
        }
        self.executions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::ImportJobStatus;
    use crate::test_support::FakeApi;
    use std::sync::atomic::AtomicU32;

    fn counting_fetch(counter: Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<Result<u32>> {
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(n))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_each_tick() {
        let counter = Arc::new(AtomicU32::new(0));
        let (_handle, _rx) = spawn_poller(
            Duration::from_secs(5),
            counting_fetch(counter.clone()),
            |_| false,
        );

        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_value_stops_the_timer() {
        let counter = Arc::new(AtomicU32::new(0));
        let (handle, rx) = spawn_poller(
            Duration::from_secs(5),
            counting_fetch(counter.clone()),
            |n| *n >= 2,
        );

        // Let the poller run well past several would-be ticks
        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!handle.is_active());
        assert_eq!(*rx.borrow(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let counter = Arc::new(AtomicU32::new(0));
        let (handle, _rx) = spawn_poller(
            Duration::from_secs(5),
            counting_fetch(counter.clone()),
            |_| false,
        );

        tokio::task::yield_now().await;
        handle.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_fetch_failure_is_swallowed() {
        let counter = Arc::new(AtomicU32::new(0));
        let fetch_counter = counter.clone();
        let (_handle, rx) = spawn_poller(
            Duration::from_secs(5),
            move || {
                let n = fetch_counter.fetch_add(1, Ordering::SeqCst) + 1;
                std::future::ready(if n == 1 {
                    Err(AppError::Internal("flaky".to_string()))
                } else {
                    Ok(n)
                })
            },
            |n| *n >= 2,
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        // First fetch failed and was retried; second succeeded and was terminal
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(*rx.borrow(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_job_start_is_idempotent() {
        let api = Arc::new(FakeApi::new());
        api.script_job_statuses(42, vec![ImportJobStatus::Committing; 100]);

        let watcher = JobWatcher::new(api.clone(), Duration::from_secs(5));
        let _rx1 = watcher.watch_job(42);
        let _rx2 = watcher.watch_job(42);
        assert!(watcher.is_watching(42));

        // Two intervals: a single poller fetches at most 3 times
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(api.job_fetches() <= 3, "duplicate poller started");
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_job_receives_no_further_polls() {
        let api = Arc::new(FakeApi::new());
        api.script_job_statuses(
            42,
            vec![ImportJobStatus::Committing, ImportJobStatus::Completed],
        );

        let watcher = JobWatcher::new(api.clone(), Duration::from_secs(5));
        let rx = watcher.watch_job(42);

        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        assert_eq!(api.job_fetches(), 2);
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.job.status, ImportJobStatus::Completed);
        assert!(!watcher.is_watching(42));
    }

    #[tokio::test(start_paused = true)]
    async fn execution_detail_is_fetched_once_reference_appears() {
        let api = Arc::new(FakeApi::new());
        api.script_job_statuses(
            42,
            vec![ImportJobStatus::Committing, ImportJobStatus::Completed],
        );
        api.link_execution(42, 9, 2);

        let watcher = JobWatcher::new(api.clone(), Duration::from_secs(5));
        let rx = watcher.watch_job(42);

        tokio::time::sleep(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        let snapshot = rx.borrow().clone().unwrap();
        assert!(snapshot.execution.is_some());
        assert_eq!(snapshot.execution.unwrap().id, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_execution_polls_until_terminal() {
        let api = Arc::new(FakeApi::new());
        api.script_execution(9, 3);

        let watcher = JobWatcher::new(api.clone(), Duration::from_secs(5));
        let rx = watcher.watch_execution(9);

        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        let execution = rx.borrow().clone().unwrap();
        assert!(execution.status.is_terminal());
        assert_eq!(api.execution_fetches(), 3);
    }
}
