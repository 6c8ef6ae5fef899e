//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Ward | Reference data | `ward add`, `ward list`, `ward deactivate` |
//! | Form | Shift form lifecycle | `form new`, `form set`, `form finalize`, `form approve` |
//! | Report | Aggregates and analytics | `summary show`, `summary list`, `trends` |
//!
//! ## Identity
//!
//! Form commands act as `--actor`/`--role` (or `CENSUS_ACTOR`, `CENSUS_ROLE`),
//! falling back to the global config and then `$USER` as a recorder.
//!
//! ## Output Formats
//!
//! All commands support `--format`:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Logs go to stderr; set `CENSUS_LOG=debug` or pass `--verbose`.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod actor;
mod app;
mod form;
mod output;
mod report;
mod ward;

use anyhow::{bail, Result};
use chrono::{Duration, Local, NaiveDate};

use crate::domain::{parse_date, Actor, WardRegistry, WorkflowError};
use crate::engine::RetryPolicy;
use crate::storage::{FileWorkflow, Project};

pub use actor::ActorArgs;
pub use app::{run, Cli, Commands};
pub use form::parse_assignment;
pub use output::{Output, OutputFormat};

/// Default reporting window when only one end is given
const DEFAULT_RANGE_DAYS: i64 = 30;

/// An open project plus the identity acting on it
pub struct Session {
    project: Project,
    pub actor: Actor,
    retry: RetryPolicy,
}

impl Session {
    pub fn open(identity: &ActorArgs) -> Result<Self> {
        let project = Project::open_current()?;
        let actor = identity.resolve(&project.config().global);
        let retry = project.config().project.retry.policy();
        Ok(Self {
            project,
            actor,
            retry,
        })
    }

    pub fn workflow(&self) -> FileWorkflow {
        self.project.workflow()
    }

    pub fn wards(&self) -> WardRegistry {
        self.project.config().project.ward_registry()
    }

    /// Runs a workflow call, retrying transient storage failures
    pub fn retry<T>(&self, op: impl FnMut() -> Result<T, WorkflowError>) -> Result<T> {
        Ok(self.retry.run(op)?)
    }
}

/// Resolves an inclusive date range from optional `--from`/`--to`
pub fn date_range(from: Option<&str>, to: Option<&str>) -> Result<(NaiveDate, NaiveDate)> {
    let to = match to {
        Some(s) => parse_date(s)?,
        None => Local::now().date_naive(),
    };
    let from = match from {
        Some(s) => parse_date(s)?,
        None => to - Duration::days(DEFAULT_RANGE_DAYS),
    };
    if from > to {
        bail!("--from {} is after --to {}", from, to);
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_range() {
        let (from, to) = date_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(from, parse_date("2024-01-01").unwrap());
        assert_eq!(to, parse_date("2024-01-31").unwrap());
    }

    #[test]
    fn from_defaults_to_thirty_days_back() {
        let (from, to) = date_range(None, Some("2024-03-31")).unwrap();
        assert_eq!(to - from, Duration::days(30));
    }

    #[test]
    fn inverted_range_is_an_error() {
        assert!(date_range(Some("2024-02-01"), Some("2024-01-01")).is_err());
    }
}
