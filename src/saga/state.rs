use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a saga instance stands. No instance at all means the saga is idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStatus {
    /// Start event seen, primary command issued.
    Pending,
    /// Success event seen.
    Completed,
    /// Failure event seen, compensating command issued.
    Compensating,
    /// Compensation confirmed.
    Compensated,
}

impl SagaStatus {
    pub fn can_advance_to(self, next: SagaStatus) -> bool {
        matches!(
            (self, next),
            (SagaStatus::Pending, SagaStatus::Completed)
                | (SagaStatus::Pending, SagaStatus::Compensating)
                | (SagaStatus::Compensating, SagaStatus::Compensated)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Compensated)
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            SagaStatus::Pending => "pending",
            SagaStatus::Completed => "completed",
            SagaStatus::Compensating => "compensating",
            SagaStatus::Compensated => "compensated",
        };
        f.write_str(status)
    }
}

/// One saga run, keyed by the business id that started it.
#[derive(Clone, Debug, PartialEq)]
pub struct SagaInstance<D> {
    pub correlation_id: Uuid,
    pub status: SagaStatus,
    pub data: D,
    /// Start order within the store.
    pub sequence: u64,
}
