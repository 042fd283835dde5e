//! HandlerRegistry - job type tag to handler.
//!
//! Built once during startup, then shared read-only by every worker.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::job::TypedJob;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for job type '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: TypedJob, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(Arc::new(TypedHandler::<T, H>::new(handler)))
    }

    /// Register an untyped handler under its own `job_type()`.
    pub fn register_dyn(&mut self, handler: Arc<dyn DynHandler>) -> Result<(), RegistryError> {
        let job_type = handler.job_type().to_string();
        if self.handlers.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.handlers.insert(job_type, handler);
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Registered type tags, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::testing::{Echo, EchoHandler, Flaky, FlakyHandler};

    #[test]
    fn register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Echo, _>(EchoHandler).unwrap();

        let handler = registry.get(Echo::TYPE).unwrap();
        assert_eq!(handler.job_type(), Echo::TYPE);
        assert!(registry.get("DOES_NOT_EXIST").is_none());
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Echo, _>(EchoHandler).unwrap();
        let result = registry.register::<Echo, _>(EchoHandler);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t == "ECHO"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registered_types_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Flaky, _>(FlakyHandler::new(0)).unwrap();
        registry.register::<Echo, _>(EchoHandler).unwrap();
        assert_eq!(registry.registered_types(), vec!["ECHO".to_string(), "FLAKY".to_string()]);
    }
}
