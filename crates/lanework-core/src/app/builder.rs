//! AppBuilder - wiring and startup validation.
//!
//! Lifecycle: `AppBuilder::build()` → [`App`] → `start()` → [`RunningApp`] →
//! `shutdown()`. Collaborators are injected here and nowhere else; nothing in
//! the engine reaches for process-wide state.
//!
//! # 起動フロー
//! 1. `build()` で登録済みハンドラと期待するジョブ種別を照合する
//! 2. `start()` はストア上の未完了ジョブ（`pending` / `processing`）を
//!    ブローカーへ積み直す。ブローカーが既に保持している id は重複として無視される
//! 3. レーンごとに `WorkerPool` を起動する
//!
//! `processing` のまま残ったジョブは、記録された試行番号のまま再実行される。
//! 試行回数の上限は `max_attempts` を超えない。

use std::sync::Arc;

use tracing::{debug, info};

use super::reconciler::{StatusReconciler, StoreWritePolicy};
use super::submit::JobService;
use super::worker_loop::{WorkerContext, WorkerPool};
use crate::domain::{DEFAULT_MAX_ATTEMPTS, Decider, DefaultDecider, Priority};
use crate::error::LaneworkError;
use crate::impls::InMemoryJobStore;
use crate::ports::{
    Broker, Clock, EnqueueOutcome, IdGenerator, JobDescriptor, JobStore, SystemClock,
    UlidGenerator,
};
use crate::queue::{InMemoryBroker, RetryPolicy};
use crate::runtime::Runtime;
use crate::typed::{DynHandler, Handler, HandlerRegistry, RegistryError, TypedJob};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing job types: {0:?}. These types were expected but no handler is registered.")]
    MissingJobTypes(Vec<String>),

    #[error("concurrency for lane '{0}' must be at least 1")]
    InvalidConcurrency(Priority),

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,
}

/// # Example
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<CsvExport, _>(CsvExportHandler::new("output"))?
///     .expect_types(&["CSV_EXPORT"])
///     .store(Arc::new(store))
///     .build()?;
/// let running = app.start().await?;
/// ```
pub struct AppBuilder {
    registry: HandlerRegistry,
    expected_types: Option<Vec<String>>,
    store: Option<Arc<dyn JobStore>>,
    broker: Option<Arc<dyn Broker>>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    decider: Option<Arc<dyn Decider>>,
    high_concurrency: usize,
    default_concurrency: usize,
    max_attempts: u32,
    retry_policy: RetryPolicy,
    write_policy: StoreWritePolicy,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            expected_types: None,
            store: None,
            broker: None,
            clock: Arc::new(SystemClock),
            ids: None,
            decider: None,
            high_concurrency: 1,
            default_concurrency: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_policy: RetryPolicy::default(),
            write_policy: StoreWritePolicy::default(),
        }
    }

    pub fn register<T: TypedJob, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn register_dyn(mut self, handler: Arc<dyn DynHandler>) -> Result<Self, RegistryError> {
        self.registry.register_dyn(handler)?;
        Ok(self)
    }

    /// Job types that must have a handler; checked by `build()`.
    pub fn expect_types(mut self, job_types: &[&str]) -> Self {
        self.expected_types = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Defaults to [`InMemoryJobStore`].
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`InMemoryBroker`].
    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replaces the [`DefaultDecider`] built from the retry policy.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn concurrency(mut self, lane: Priority, jobs: usize) -> Self {
        match lane {
            Priority::High => self.high_concurrency = jobs,
            Priority::Default => self.default_concurrency = jobs,
        }
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn write_policy(mut self, policy: StoreWritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_types {
            let registered = self.registry.registered_types();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobTypes(missing));
            }
        }
        for (lane, jobs) in [
            (Priority::High, self.high_concurrency),
            (Priority::Default, self.default_concurrency),
        ] {
            if jobs == 0 {
                return Err(BuildError::InvalidConcurrency(lane));
            }
        }
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts);
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let broker = self
            .broker
            .unwrap_or_else(|| Arc::new(InMemoryBroker::new()));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.retry_policy.clone())));

        let reconciler = StatusReconciler::new(store.clone(), self.clock.clone(), self.write_policy);
        let worker = Arc::new(WorkerContext {
            broker: broker.clone(),
            runtime: Arc::new(Runtime::new(Arc::new(self.registry))),
            decider,
            reconciler: Arc::new(reconciler),
        });
        let service = JobService::new(store.clone(), broker.clone(), ids, self.clock, self.max_attempts);

        Ok(App {
            store,
            broker,
            worker,
            service,
            high_concurrency: self.high_concurrency,
            default_concurrency: self.default_concurrency,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wired engine, not yet processing.
pub struct App {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn Broker>,
    worker: Arc<WorkerContext>,
    service: JobService,
    high_concurrency: usize,
    default_concurrency: usize,
}

impl App {
    pub fn service(&self) -> JobService {
        self.service.clone()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        self.worker.runtime.registry()
    }

    /// Put every unfinished job from the store back on its lane, then spawn
    /// one worker pool per lane.
    ///
    /// Jobs the broker already holds are left alone.
    pub async fn start(self) -> Result<RunningApp, LaneworkError> {
        self.requeue_unfinished().await?;

        let pools = vec![
            WorkerPool::spawn(Priority::High, self.high_concurrency, self.worker.clone()),
            WorkerPool::spawn(Priority::Default, self.default_concurrency, self.worker.clone()),
        ];
        info!(
            high_concurrency = self.high_concurrency,
            default_concurrency = self.default_concurrency,
            job_types = ?self.registry().registered_types(),
            "workers started"
        );
        Ok(RunningApp {
            store: self.store,
            broker: self.broker,
            service: self.service,
            pools,
        })
    }

    async fn requeue_unfinished(&self) -> Result<usize, LaneworkError> {
        let open = self.store.list_open().await?;
        let mut requeued = 0;
        for record in &open {
            let descriptor = JobDescriptor::from(record);
            debug!(
                job_id = %record.id,
                status = %record.status,
                next_attempt = descriptor.attempts_made + 1,
                "requeueing unfinished job"
            );
            if self.broker.enqueue(descriptor).await? == EnqueueOutcome::Accepted {
                requeued += 1;
            }
        }
        if requeued > 0 {
            info!(requeued, "unfinished jobs requeued");
        }
        Ok(requeued)
    }
}

pub struct RunningApp {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn Broker>,
    service: JobService,
    pools: Vec<WorkerPool>,
}

impl RunningApp {
    pub fn service(&self) -> JobService {
        self.service.clone()
    }

    /// Stop dequeuing, let running jobs resolve, then close the broker and
    /// finally the store.
    pub async fn shutdown(self) {
        for pool in &self.pools {
            pool.request_shutdown();
        }
        for pool in self.pools {
            pool.shutdown_and_join().await;
        }
        self.broker.close().await;
        self.store.close().await;
        info!("shutdown complete");
    }
}
