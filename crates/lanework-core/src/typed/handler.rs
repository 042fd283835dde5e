//! Handler traits.
//!
//! - `Handler<T>`: typed surface, one implementation per job type
//! - `DynHandler`: object-safe form stored in the registry
//! - `TypedHandler<T, H>`: adapter from the first to the second
//!
//! # 使用例
//! ```ignore
//! #[async_trait]
//! impl Handler<CsvExport> for CsvExportHandler {
//!     async fn handle(&self, job: CsvExport, ctx: &JobContext)
//!         -> Result<CsvExportResult, ExecutionError> { ... }
//! }
//! registry.register::<CsvExport, _>(CsvExportHandler::new("output"))?;
//! ```
//!
//! # エラー分類
//! - ペイロードのデコード失敗は `Transient`（通常のリトライ対象）
//! - 結果のシリアライズ失敗は `Permanent`
//! - ハンドラ内の panic はワーカー側で捕捉され、`Transient` として扱われる

use std::marker::PhantomData;

use async_trait::async_trait;

use super::job::TypedJob;
use crate::domain::{ExecutionError, JobId};

/// Per-attempt context handed to a handler next to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: JobId,
    /// 1-indexed attempt number.
    pub attempt: u32,
}

/// Runs one job type.
///
/// Handlers may be invoked more than once for the same job (at-least-once
/// delivery); making the side effect idempotent is up to the handler.
#[async_trait]
pub trait Handler<T: TypedJob>: Send + Sync {
    async fn handle(&self, job: T, ctx: &JobContext) -> Result<T::Output, ExecutionError>;
}

/// Object-safe handler working on raw JSON payloads.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        payload: serde_json::Value,
        ctx: &JobContext,
    ) -> Result<serde_json::Value, ExecutionError>;

    fn job_type(&self) -> &str;
}

pub struct TypedHandler<T: TypedJob, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TypedJob, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TypedJob, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        payload: serde_json::Value,
        ctx: &JobContext,
    ) -> Result<serde_json::Value, ExecutionError> {
        let job: T = serde_json::from_value(payload)?;
        let output = self.handler.handle(job, ctx).await?;
        serde_json::to_value(output)
            .map_err(|e| ExecutionError::permanent(format!("unserializable result: {e}")))
    }

    fn job_type(&self) -> &str {
        T::TYPE
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Echo, EchoHandler};
    use super::*;
    use crate::domain::ErrorKind;
    use serde_json::json;
    use ulid::Ulid;

    fn ctx() -> JobContext {
        JobContext {
            job_id: JobId::from_ulid(Ulid::new()),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_payload_and_encodes_output() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let out = handler.handle_dyn(json!({"value": 42}), &ctx()).await.unwrap();
        assert_eq!(out, json!({"echo": 42}));
        assert_eq!(handler.job_type(), "ECHO");
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_transient_failure() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let err = handler.handle_dyn(json!({"wrong": 1}), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.message().starts_with("invalid payload"));
    }
}
