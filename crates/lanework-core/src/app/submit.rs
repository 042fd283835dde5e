//! JobService - producer side: create, enqueue and look up jobs.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::{JobId, JobRecord, JobView, NewJob, Priority};
use crate::error::LaneworkError;
use crate::observability::LaneCounts;
use crate::ports::{Broker, Clock, EnqueueOutcome, IdGenerator, JobDescriptor, JobStore};

/// Submission as it arrives from a producer, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitRequest {
    #[serde(rename = "type", default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn Broker>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        broker: Arc<dyn Broker>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            broker,
            ids,
            clock,
            max_attempts,
        }
    }

    /// Validate a raw request and submit it.
    ///
    /// `type` must be a non-empty string and `payload` present and non-null.
    /// An absent priority means `default`; an unknown one is rejected.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, LaneworkError> {
        let job_type = request
            .job_type
            .filter(|t| !t.trim().is_empty());
        let payload = request.payload.filter(|p| !p.is_null());
        let (Some(job_type), Some(payload)) = (job_type, payload) else {
            return Err(LaneworkError::Validation(
                "Type and payload are required".to_string(),
            ));
        };

        let priority = match request.priority.as_deref() {
            None => Priority::Default,
            Some(raw) => raw
                .parse::<Priority>()
                .map_err(|e| LaneworkError::Validation(e.to_string()))?,
        };

        let job = NewJob::new(job_type, payload)
            .with_priority(priority)
            .with_max_attempts(self.max_attempts);
        self.enqueue(job).await
    }

    /// Create the `pending` record, then hand the job to its lane.
    pub async fn enqueue(&self, job: NewJob) -> Result<JobId, LaneworkError> {
        if job.max_attempts == 0 {
            return Err(LaneworkError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let id = self.ids.generate_job_id();
        let record = JobRecord::new(id, job, self.clock.now());
        self.store.insert(&record).await?;

        let outcome = self
            .broker
            .enqueue(JobDescriptor::from(&record))
            .await
            .inspect_err(|err| {
                warn!(job_id = %id, error = %err, "job stored but not queued; requeued on next start");
            })?;
        match outcome {
            EnqueueOutcome::Accepted => {
                info!(job_id = %id, job_type = %record.job_type, lane = %record.priority, "job submitted");
            }
            EnqueueOutcome::Duplicate => {
                debug!(job_id = %id, "job already outstanding");
            }
        }
        Ok(id)
    }

    /// Look up a job by its textual id. A malformed id is simply not found.
    pub async fn get(&self, raw_id: &str) -> Result<Option<JobView>, LaneworkError> {
        let Ok(id) = raw_id.parse::<JobId>() else {
            return Ok(None);
        };
        Ok(self.store.get(id).await?.map(|record| record.view()))
    }

    pub async fn counts(&self, lane: Priority) -> LaneCounts {
        self.broker.counts(lane).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::impls::InMemoryJobStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use crate::queue::InMemoryBroker;
    use rstest::rstest;
    use serde_json::json;

    fn service() -> (JobService, Arc<InMemoryBroker>, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let service = JobService::new(
            store.clone(),
            broker.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
            3,
        );
        (service, broker, store)
    }

    fn request(value: serde_json::Value) -> SubmitRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn submit_creates_pending_record_and_routes_to_lane() {
        let (service, broker, _) = service();

        let id = service
            .submit(request(json!({"type": "EMAIL_SEND", "priority": "high", "payload": {"to": "a@b.c"}})))
            .await
            .unwrap();

        let view = service.get(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert_eq!(view.priority, Priority::High);
        assert_eq!(view.attempts, 0);
        assert_eq!(broker.counts(Priority::High).await.queued, 1);
        assert_eq!(broker.counts(Priority::Default).await.queued, 0);
    }

    #[tokio::test]
    async fn absent_priority_means_default_lane() {
        let (service, broker, _) = service();
        service
            .submit(request(json!({"type": "CSV_EXPORT", "payload": {"data": []}})))
            .await
            .unwrap();
        assert_eq!(broker.counts(Priority::Default).await.queued, 1);
    }

    #[rstest]
    #[case::missing_type(json!({"payload": {}}))]
    #[case::empty_type(json!({"type": " ", "payload": {}}))]
    #[case::missing_payload(json!({"type": "CSV_EXPORT"}))]
    #[case::null_payload(json!({"type": "CSV_EXPORT", "payload": null}))]
    #[case::unknown_priority(json!({"type": "CSV_EXPORT", "priority": "urgent", "payload": {}}))]
    #[tokio::test]
    async fn invalid_submissions_are_rejected(#[case] body: serde_json::Value) {
        let (service, broker, store) = service();
        let err = service.submit(request(body)).await.unwrap_err();
        assert!(matches!(err, LaneworkError::Validation(_)));
        assert!(store.is_empty().await);
        assert_eq!(broker.counts(Priority::Default).await.queued, 0);
    }

    #[rstest]
    #[case::garbage("not-an-id")]
    #[case::empty("")]
    #[case::unknown("job-01ARZ3NDEKTSV4RRFFQ69G5FAV")]
    #[tokio::test]
    async fn lookup_of_unknown_or_malformed_id_is_none(#[case] raw: &str) {
        let (service, _, _) = service();
        assert!(service.get(raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_fails_submission_without_enqueue() {
        let (service, broker, store) = service();
        store.set_available(false);

        let err = service
            .submit(request(json!({"type": "CSV_EXPORT", "payload": {}})))
            .await
            .unwrap_err();
        assert!(matches!(err, LaneworkError::Store(_)));
        assert_eq!(broker.counts(Priority::Default).await.queued, 0);
    }
}
