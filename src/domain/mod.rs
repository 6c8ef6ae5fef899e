//! Domain models for the ward census engine
//!
//! Contains the core business rules without any I/O concerns.

mod actor;
mod census;
mod error;
mod form;
mod history;
mod id;
mod summary;
pub mod trend;
mod ward;

pub use actor::{Actor, ActorRef, Role};
pub use census::{
    compute_census, qualifies_as_predecessor, resolve_carry_over, settle, CarryOver,
    CarryOverSource, CensusOutcome, Movement, NegativeCensusWarning,
};
pub use error::{ValidationError, WorkflowError};
pub use form::{ratio, CensusCounters, CounterField, FormStatus, ShiftForm};
pub use history::{validate_reason, ApprovalAction, ApprovalHistoryRecord, MAX_REASON_LEN};
pub use id::{parse_date, FormId, FormKey, IdError, Shift, WardId, DATE_FORMAT};
pub use summary::{AggregationIncomplete, DailySummary, ShiftSubtotal};
pub use trend::{classify_ratio, Severity, TrendReport, TrendSample};
pub use ward::{Ward, WardRegistry};
