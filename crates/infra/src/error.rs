//! Submission error model.

use thiserror::Error;

use stockledger_core::{DomainError, SubmissionKey};

use crate::store::StoreError;

/// Write step of a submission, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    /// Reads done before any write (account and item lookups).
    Preflight,
    StockUpdate,
    JournalEntry,
    JournalLines,
    TransactionRecords,
}

impl core::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SagaStep::Preflight => "preflight",
            SagaStep::StockUpdate => "stock update",
            SagaStep::JournalEntry => "journal entry",
            SagaStep::JournalLines => "journal lines",
            SagaStep::TransactionRecords => "transaction records",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i64,
        available: i64,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A step failed before anything was written.
    #[error("{step} failed: {source}")]
    Persistence {
        step: SagaStep,
        #[source]
        source: StoreError,
    },

    /// A step failed after earlier writes; those writes were rolled back.
    #[error("{step} failed after earlier writes, rolled back: {source}")]
    PartialCommit {
        step: SagaStep,
        #[source]
        source: StoreError,
    },

    /// Rollback itself failed; the store needs manual repair.
    #[error("ledger inconsistent after {failure}; compensation failures: {}", .compensation.join("; "))]
    Inconsistent {
        failure: String,
        compensation: Vec<String>,
    },

    #[error("submission {0} is already in progress")]
    DuplicateSubmission(SubmissionKey),
}

impl SubmissionError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmissionError::Validation(_) => "validation",
            SubmissionError::InsufficientStock { .. } => "insufficient_stock",
            SubmissionError::Configuration(_) => "configuration",
            SubmissionError::Persistence { .. } => "persistence",
            SubmissionError::PartialCommit { .. } => "partial_commit",
            SubmissionError::Inconsistent { .. } => "inconsistent",
            SubmissionError::DuplicateSubmission(_) => "duplicate_submission",
        }
    }

    pub fn persistence(step: SagaStep, source: StoreError) -> Self {
        SubmissionError::Persistence { step, source }
    }

    /// True if nothing this submission wrote remains in the store.
    pub fn is_clean(&self) -> bool {
        !matches!(self, SubmissionError::Inconsistent { .. })
    }
}

impl From<DomainError> for SubmissionError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => SubmissionError::Validation(msg),
            DomainError::InsufficientStock {
                item,
                requested,
                available,
            } => SubmissionError::InsufficientStock {
                item,
                requested,
                available,
            },
            DomainError::Configuration(msg) => SubmissionError::Configuration(msg),
            DomainError::InvariantViolation(msg) => {
                SubmissionError::Validation(format!("invariant violated: {msg}"))
            }
            DomainError::InvalidId(msg) => SubmissionError::Validation(format!("invalid id: {msg}")),
            DomainError::NotFound => SubmissionError::Validation("not found".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        let err: SubmissionError = DomainError::insufficient_stock("Widget", 8, 5).into();
        assert_eq!(err.kind(), "insufficient_stock");
        assert_eq!(
            err.to_string(),
            "insufficient stock for Widget: requested 8, available 5"
        );

        let err: SubmissionError = DomainError::configuration("no account mapped").into();
        assert_eq!(err.kind(), "configuration");

        let err: SubmissionError = DomainError::invariant("debits must equal credits").into();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn inconsistent_lists_every_compensation_failure() {
        let err = SubmissionError::Inconsistent {
            failure: "journal lines failed".to_string(),
            compensation: vec!["restore Widget".to_string(), "delete entry".to_string()],
        };
        assert!(err.to_string().ends_with("restore Widget; delete entry"));
        assert!(!err.is_clean());
    }
}
