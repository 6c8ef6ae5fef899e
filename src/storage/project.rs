//! Project management
//!
//! Handles project initialization and wires the file stores into a workflow.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::info;

use super::jsonl::{FormFileStore, Outbox, SummaryFileStore};
use super::Config;
use crate::engine::{SystemClock, Workflow};

/// Workflow over the project's files
pub type FileWorkflow = Workflow<FormFileStore, SummaryFileStore, Outbox, SystemClock>;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a census project. Run 'census init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# Ward census configuration

# Wards that accept shift forms. Add more with 'census ward add'.
# [[wards]]
# id = "WARD6"
# name = "Medicine 6"
# active = true

[approval]
# Maximum rejection reason length, in characters
max_reason_len = 500

[notify]
# Notified of every approval decision, alongside the form's creator
recipients = []
# Notified when both shifts of a day are approved
approvers = []

[retry]
max_attempts = 3
initial_backoff_ms = 50
max_backoff_ms = 1000
"#;

const GITIGNORE: &str = r#"# Writer locks
*.lock

# Interrupted atomic writes
*.tmp
"#;

/// A census project rooted at a directory containing `.census/`
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".census").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// Existing files are left alone, so running it twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let census_dir = root.join(".census");

        fs::create_dir_all(&census_dir).with_context(|| {
            format!(
                "Failed to create .census directory: {}",
                census_dir.display()
            )
        })?;

        let config_path = census_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = census_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        info!(root = %root.display(), "project initialized");
        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .census directory path
    pub fn census_dir(&self) -> PathBuf {
        self.root.join(".census")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn form_store(&self) -> FormFileStore {
        FormFileStore::new(&self.census_dir())
    }

    pub fn summary_store(&self) -> SummaryFileStore {
        SummaryFileStore::new(&self.census_dir())
    }

    pub fn outbox(&self) -> Outbox {
        Outbox::new(&self.census_dir())
    }

    /// Builds a workflow from the project's stores and configuration
    pub fn workflow(&self) -> FileWorkflow {
        let project = &self.config.project;
        Workflow::new(
            self.form_store(),
            self.summary_store(),
            self.outbox(),
            SystemClock,
            project.ward_registry(),
        )
        .with_policy(project.workflow_policy())
    }
}
