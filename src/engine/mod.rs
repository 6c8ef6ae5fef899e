//! Approval workflow engine
//!
//! Orchestrates the domain rules over host-supplied storage, notification and
//! clock capabilities.

pub mod memory;
pub mod ports;
pub mod retry;
pub mod workflow;

pub use ports::{
    Clock, FormStore, Notification, NotificationKind, NotificationSink, StoreError, SummaryStore,
    SystemClock,
};
pub use retry::RetryPolicy;
pub use workflow::{DraftRequest, TrendSource, Workflow, WorkflowPolicy};
