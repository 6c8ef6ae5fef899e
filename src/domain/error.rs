//! Error taxonomy for the census workflow
//!
//! Computational code (census, summary, trend) never fails on missing data;
//! it returns degenerate results instead. Only the workflow produces the
//! state and concurrency family below.

use thiserror::Error;

use super::form::FormStatus;
use super::id::{FormId, FormKey, WardId};

/// Malformed, missing or negative input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be >= 0, got {value}")]
    NegativeValue { field: &'static str, value: i64 },

    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: u32,
    },

    #[error("No counter changes given")]
    NoChanges,

    #[error("{0} is required before the form can be finalized")]
    MissingField(&'static str),

    #[error("Unknown counter field: '{0}'")]
    UnknownField(String),

    #[error("{0} is derived from carry-over and movement and cannot be set directly")]
    DerivedField(&'static str),

    #[error("Rejection reason must not be empty")]
    EmptyReason,

    #[error("Rejection reason is {len} characters, limit is {max}")]
    ReasonTooLong { len: usize, max: usize },

    #[error("Unknown ward: {0}")]
    UnknownWard(WardId),

    #[error("Ward {0} is not active")]
    InactiveWard(WardId),

    #[error("No approved predecessor shift for {0}; an initial census is required")]
    MissingCarryOver(FormKey),

    #[error("Form {form} belongs to {actual}, expected {expected}")]
    KeyMismatch {
        form: FormId,
        expected: String,
        actual: FormKey,
    },

    #[error("Form {0} has an unresolved negative census warning")]
    OpenWarning(FormId),

    #[error("Invalid assignment '{0}': expected field=value")]
    InvalidAssignment(String),
}

/// Failure of a workflow operation
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid state transition for {form}: {from} -> {to}")]
    InvalidStateTransition {
        form: FormId,
        from: FormStatus,
        to: FormStatus,
    },

    #[error("Form {0} is already approved")]
    AlreadyApproved(FormId),

    #[error("Form {0} was modified concurrently; reload and retry")]
    ConcurrentModification(FormId),

    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("A {status} form already exists for {key}: {form}")]
    DuplicateForm {
        key: FormKey,
        form: FormId,
        status: FormStatus,
    },

    #[error("{actor} is not allowed to {action}")]
    Unauthorized { actor: String, action: &'static str },

    #[error("Storage unavailable: {0}")]
    Store(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl WorkflowError {
    /// Returns true if the operation may be retried unchanged
    ///
    /// Concurrent modification is not transient: the caller has to re-read
    /// the form before deciding again.
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowError::Store(_))
    }
}
