//! Job lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Externally visible job status.
///
/// State transitions:
/// - Pending -> Processing (first dispatch)
/// - Processing -> Processing (dispatch of a retry; status stays visible as processing)
/// - Processing -> Completed | Failed
/// - Pending -> Completed | Failed (a dispatched write was lost; the terminal write catches up)
///
/// Completed and Failed are terminal: nothing leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the lattice.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, JobStatus::Pending) => false,
            (JobStatus::Pending | JobStatus::Processing, _) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(JobStatus::Pending, JobStatus::Processing, true)]
    #[case(JobStatus::Processing, JobStatus::Processing, true)]
    #[case(JobStatus::Processing, JobStatus::Completed, true)]
    #[case(JobStatus::Processing, JobStatus::Failed, true)]
    #[case(JobStatus::Pending, JobStatus::Failed, true)]
    #[case(JobStatus::Processing, JobStatus::Pending, false)]
    #[case(JobStatus::Completed, JobStatus::Processing, false)]
    #[case(JobStatus::Completed, JobStatus::Failed, false)]
    #[case(JobStatus::Failed, JobStatus::Completed, false)]
    #[case(JobStatus::Failed, JobStatus::Failed, false)]
    fn transitions_follow_the_lattice(
        #[case] from: JobStatus,
        #[case] to: JobStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_names_round_trip_through_text() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }
}
