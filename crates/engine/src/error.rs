//! The module contains the errors the engine can throw.
//!
//! The errors split in two families:
//!
//! - non-retryable: [`InvalidRule`], [`InvalidName`] and [`NotFound`].
//!   Repeating the call cannot change the outcome.
//! - retryable: [`IncurrenceFailed`] and [`Timeout`]. The incurrence scope is
//!   atomic, so a retry never duplicates ledger rows.
//!
//! [`PartialFailure`] aggregates per-record failures of a batch run.
//!
//!  [`InvalidRule`]: EngineError::InvalidRule
//!  [`InvalidName`]: EngineError::InvalidName
//!  [`NotFound`]: EngineError::NotFound
//!  [`IncurrenceFailed`]: EngineError::IncurrenceFailed
//!  [`Timeout`]: EngineError::Timeout
//!  [`PartialFailure`]: EngineError::PartialFailure
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::RecordFailure;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Incurrence failed for {id}: {source}")]
    IncurrenceFailed {
        id: Uuid,
        #[source]
        source: DbErr,
    },
    #[error("Incurrence for {0} timed out")]
    Timeout(Uuid),
    #[error("{} recurring transaction(s) failed, {total} occurrence(s) incurred", failures.len())]
    PartialFailure {
        total: u64,
        failures: Vec<RecordFailure>,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Whether repeating the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IncurrenceFailed { .. } | Self::Timeout(_) | Self::Database(_) => true,
            Self::PartialFailure { failures, .. } => failures.iter().any(|f| f.retryable),
            Self::InvalidRule(_) | Self::InvalidName(_) | Self::NotFound(_) => false,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidRule(a), Self::InvalidRule(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (
                Self::IncurrenceFailed { id: a, source: sa },
                Self::IncurrenceFailed { id: b, source: sb },
            ) => a == b && sa.to_string() == sb.to_string(),
            (Self::Timeout(a), Self::Timeout(b)) => a == b,
            (
                Self::PartialFailure {
                    total: ta,
                    failures: fa,
                },
                Self::PartialFailure {
                    total: tb,
                    failures: fb,
                },
            ) => ta == tb && fa == fb,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
