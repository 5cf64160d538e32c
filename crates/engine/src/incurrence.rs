//! Outcomes of incurrence runs.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Result of one `incur` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incurrence {
    pub id: Uuid,
    /// Ledger rows materialized by this call.
    pub count: u64,
    /// Watermark after the call.
    pub last_charged: Option<DateTime<Utc>>,
    /// The per-call cap was hit and more occurrences are already due.
    pub more_remaining: bool,
}

/// One record that could not be incurred during a batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFailure {
    pub id: Uuid,
    pub reason: String,
    pub retryable: bool,
}

impl RecordFailure {
    pub(crate) fn new(id: Uuid, err: &EngineError) -> Self {
        Self {
            id,
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Aggregate of a batch run over every recurring transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Ledger rows materialized across all records.
    pub total: u64,
    pub succeeded: Vec<Incurrence>,
    pub failed: Vec<RecordFailure>,
    /// Records deleted between listing and incurring.
    pub skipped: Vec<Uuid>,
}

impl BatchReport {
    /// Records visited, successful or not.
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Records that still have due occurrences after this run.
    pub fn more_remaining(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.succeeded
            .iter()
            .filter(|i| i.more_remaining)
            .map(|i| i.id)
    }

    /// Total count, or [`EngineError::PartialFailure`] when any record failed.
    pub fn into_result(self) -> ResultEngine<u64> {
        if self.failed.is_empty() {
            Ok(self.total)
        } else {
            Err(EngineError::PartialFailure {
                total: self.total,
                failures: self.failed,
            })
        }
    }
}
