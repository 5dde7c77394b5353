//! Fixed-delay poll scheduling.
//!
//! One cancellable timer task per agent task id. The scheduler owns the
//! timer registry exclusively; starting a timer always cancels the prior
//! registration for that id, so no two timers can ever poll the same task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;

/// What the poll callback decided about the timer's future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The task is still pollable; keep the steady interval running.
    Continue,
    /// Terminal status, failure, or an unresolvable task: stop the timer.
    Stop,
}

struct Registration {
    cancel: CancellationToken,
    generation: u64,
}

/// Schedules status polls with a fixed initial delay and a fixed
/// steady-state interval. No backoff: a poll that fails ends the timer,
/// and only an explicit restart brings it back.
pub struct PollScheduler {
    config: PollConfig,
    registrations: Arc<RwLock<HashMap<String, Registration>>>,
    generations: AtomicU64,
}

impl PollScheduler {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            registrations: Arc::new(RwLock::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Starts (or restarts) polling for a task id.
    ///
    /// Any existing timer for the id is cancelled first; exactly one timer
    /// exists per id at any time. After the initial delay one poll runs;
    /// while it returns [`PollOutcome::Continue`] the steady interval
    /// keeps polling, and the first [`PollOutcome::Stop`] ends the timer.
    pub async fn start<F, Fut>(&self, task_id: &str, poll: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PollOutcome> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        {
            let mut registrations = self.registrations.write().await;
            let registration = Registration {
                cancel: token.clone(),
                generation,
            };
            if let Some(previous) = registrations.insert(task_id.to_string(), registration) {
                tracing::debug!(target: "agent_poll", task_id, "replacing existing poll timer");
                previous.cancel.cancel();
            }
        }

        let registrations = Arc::clone(&self.registrations);
        let initial_delay = self.config.initial_delay();
        let interval = self.config.interval();
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            let id = task_id.clone();
            let run = async move {
                tokio::time::sleep(initial_delay).await;
                if poll(id.clone()).await == PollOutcome::Stop {
                    return;
                }
                let start = tokio::time::Instant::now() + interval;
                let mut ticker = tokio::time::interval_at(start, interval);
                loop {
                    ticker.tick().await;
                    if poll(id.clone()).await == PollOutcome::Stop {
                        return;
                    }
                }
            };

            tokio::select! {
                _ = token.cancelled() => {}
                _ = run => {}
            }

            // Only clean up our own registration; a restart may already
            // have replaced it with a newer generation.
            let mut registrations = registrations.write().await;
            if registrations
                .get(&task_id)
                .is_some_and(|r| r.generation == generation)
            {
                registrations.remove(&task_id);
            }
        });
    }

    /// Stops polling for a task id. Idempotent: stopping an id with no
    /// active timer is a no-op.
    pub async fn stop(&self, task_id: &str) {
        let mut registrations = self.registrations.write().await;
        if let Some(registration) = registrations.remove(task_id) {
            registration.cancel.cancel();
            tracing::debug!(target: "agent_poll", task_id, "poll timer stopped");
        }
    }

    /// True while a timer is registered for the id.
    pub async fn is_active(&self, task_id: &str) -> bool {
        let registrations = self.registrations.read().await;
        registrations.contains_key(task_id)
    }
}
