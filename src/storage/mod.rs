//! # Storage Layer
//!
//! File-backed host for the census workflow, kept in git-friendly formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Shift forms | JSONL, one form per line | `.census/forms.jsonl` |
//! | Approval history | JSONL, append-only | `.census/history.jsonl` |
//! | Daily summaries | JSONL | `.census/summaries.jsonl` |
//! | Notifications | JSONL outbox, append-only | `.census/notifications.jsonl` |
//! | Config | TOML | `.census/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - Form and summary writes hold an exclusive `fs2` lock on a `.lock` file
//!   for the whole read-check-write, so revision checks cannot interleave
//! - A held lock is reported as a transient failure for the caller to retry
//! - Full rewrites are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for a census project
//! - [`FormFileStore`], [`SummaryFileStore`], [`Outbox`] - Port implementations
//! - [`Config`] - Project and global configuration

mod config;
mod jsonl;
mod project;

pub use config::{
    ApprovalConfig, Config, ConfigError, GlobalConfig, NotifyConfig, OutputFormat, ProjectConfig,
    RetryConfig,
};
pub use jsonl::{FormFileStore, JsonlFile, Outbox, SummaryFileStore};
pub use project::{FileWorkflow, Project, ProjectError};
