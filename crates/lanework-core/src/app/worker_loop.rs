//! WorkerPool - per-lane execution loop.
//!
//! # Flow per delivery
//! 1. `Broker::dequeue(lane)` (waits; cancel-safe)
//! 2. reconcile `dispatched(attempt)`
//! 3. run the handler
//! 4. success: reconcile `completed`, then `ack`
//! 5. failure: ask the `Decider`; `reschedule` on retry, or reconcile
//!    `failed` and `nack` once exhausted
//!
//! A panicking handler is an ordinary failed attempt.
//!
//! Concurrency within a lane is bounded by a semaphore. Shutdown stops new
//! dequeues; jobs already running are awaited, never cancelled.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::reconciler::StatusReconciler;
use crate::domain::{Decider, Decision, ExecutionError, LifecycleEvent, Priority};
use crate::ports::{Broker, Delivery};
use crate::runtime::Runtime;

/// Everything a worker needs to carry one delivery to its outcome.
pub struct WorkerContext {
    pub broker: Arc<dyn Broker>,
    pub runtime: Arc<Runtime>,
    pub decider: Arc<dyn Decider>,
    pub reconciler: Arc<StatusReconciler>,
}

impl WorkerContext {
    /// Drive one delivery to success, retry or terminal failure.
    pub async fn process(&self, delivery: Delivery) {
        let id = delivery.id();
        let attempt = delivery.attempt;

        info!(job_id = %id, job_type = delivery.job_type(), attempt, "Starting job");
        self.reconciler
            .apply(id, &LifecycleEvent::Dispatched { attempt })
            .await;

        let outcome = AssertUnwindSafe(self.runtime.execute(&delivery))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_failure(panic.as_ref())));

        match outcome {
            Ok(result) => {
                self.reconciler
                    .apply(id, &LifecycleEvent::Completed { attempt, result })
                    .await;
                if let Err(err) = self.broker.ack(id).await {
                    warn!(job_id = %id, error = %err, "ack failed");
                }
                info!(job_id = %id, attempt, "job completed");
            }
            Err(failure) => match self.decider.decide(&delivery, &failure) {
                Decision::Retry { delay } => {
                    warn!(
                        job_id = %id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "attempt failed, retry scheduled"
                    );
                    if let Err(err) = self.broker.reschedule(id, delay).await {
                        warn!(job_id = %id, error = %err, "reschedule failed");
                    }
                }
                Decision::Exhausted { error } => {
                    error!(
                        job_id = %id,
                        attempt,
                        kind = ?failure.kind(),
                        error = %error,
                        "job failed"
                    );
                    self.reconciler
                        .apply(
                            id,
                            &LifecycleEvent::Failed {
                                attempt,
                                error: error.clone(),
                            },
                        )
                        .await;
                    if let Err(err) = self.broker.nack(id, error).await {
                        warn!(job_id = %id, error = %err, "nack failed");
                    }
                }
            },
        }
    }
}

fn panic_failure(panic: &(dyn Any + Send)) -> ExecutionError {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("no message");
    ExecutionError::transient(format!("handler panicked: {detail}"))
}

/// Worker pool handle for one lane.
/// - `request_shutdown()` stops new dequeues
/// - `shutdown_and_join()` also waits for running jobs to resolve
pub struct WorkerPool {
    lane: Priority,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerPool {
    /// Spawn the dispatch loop for `lane` with at most `concurrency` jobs running.
    pub fn spawn(lane: Priority, concurrency: usize, ctx: Arc<WorkerContext>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(
            dispatch_loop(lane, concurrency.max(1), ctx, shutdown_rx)
                .instrument(info_span!("worker_pool", %lane)),
        );
        Self {
            lane,
            shutdown_tx,
            join,
        }
    }

    pub fn lane(&self) -> Priority {
        self.lane
    }

    pub fn request_shutdown(&self) {
        // receiver may already be gone if the loop exited on broker close
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            error!(lane = %self.lane, error = %err, "worker pool task panicked");
        }
    }
}

async fn dispatch_loop(
    lane: Priority,
    concurrency: usize,
    ctx: Arc<WorkerContext>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut running = JoinSet::new();
    debug!(concurrency, "worker pool started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        while let Some(done) = running.try_join_next() {
            log_join(done);
        }

        let permit = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // dequeue only resolves with a dispatched job, so losing the race to
        // shutdown leaves nothing in flight
        let delivery = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            delivery = ctx.broker.dequeue(lane) => delivery,
        };

        let Some(delivery) = delivery else {
            debug!("broker closed");
            break;
        };

        let span = info_span!(
            "job",
            job_id = %delivery.id(),
            job_type = %delivery.job_type(),
            attempt = delivery.attempt,
        );
        let ctx = Arc::clone(&ctx);
        running.spawn(
            async move {
                let _permit = permit;
                ctx.process(delivery).await;
            }
            .instrument(span),
        );
    }

    while let Some(done) = running.join_next().await {
        log_join(done);
    }
    debug!("worker pool stopped");
}

fn log_join(done: Result<(), tokio::task::JoinError>) {
    if let Err(err) = done {
        error!(error = %err, "job task panicked");
    }
}
