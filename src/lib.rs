//! Ward census - shift census recording and approval for hospital wards
//!
//! Nurses record each ward's census, staffing and patient movement twice a
//! day (morning and night shifts). Forms are finalized, approved or rejected,
//! rolled up into daily summaries and analyzed for staffing trends.
//!
//! - [`domain`] holds the rules and calculations with no I/O
//! - [`engine`] runs the approval workflow over pluggable stores
//! - [`storage`] and [`cli`] are the file-backed command-line host

pub mod cli;
pub mod domain;
pub mod engine;
pub mod storage;

pub use domain::{
    Actor, DailySummary, FormId, FormKey, FormStatus, Role, Shift, ShiftForm, ValidationError,
    WardId, WorkflowError,
};
pub use engine::{DraftRequest, Workflow, WorkflowPolicy};
