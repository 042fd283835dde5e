use std::sync::Arc;

use crate::domain::ExecutionError;
use crate::ports::Delivery;
use crate::typed::{HandlerRegistry, JobContext};

/// Runtime executes a [`Delivery`] by dispatching to the registered handler.
pub struct Runtime {
    registry: Arc<HandlerRegistry>,
}

impl Runtime {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one attempt. An unregistered type is a permanent failure.
    pub async fn execute(&self, delivery: &Delivery) -> Result<serde_json::Value, ExecutionError> {
        let handler = self
            .registry
            .get(delivery.job_type())
            .ok_or_else(|| ExecutionError::unknown_job_type(delivery.job_type()))?;

        let ctx = JobContext {
            job_id: delivery.id(),
            attempt: delivery.attempt,
        };
        handler
            .handle_dyn(delivery.descriptor.payload.clone(), &ctx)
            .await
    }
}
