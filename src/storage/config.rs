//! Configuration handling for the census CLI
//!
//! Configuration is stored in `.census/config.toml` (project) and the
//! platform config directory (global), e.g. `~/.config/census/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Role, Ward, WardRegistry, MAX_REASON_LEN};
use crate::engine::{RetryPolicy, WorkflowPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Approval rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Upper bound on rejection reason length, in characters
    pub max_reason_len: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_reason_len: MAX_REASON_LEN,
        }
    }
}

/// Who hears about approval decisions
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Always notified, in addition to the form's creator
    pub recipients: Vec<String>,

    /// Notified when a day's summary is complete
    pub approvers: Vec<String>,
}

/// Backoff for transient storage failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Ward reference data
    pub wards: Vec<Ward>,

    pub approval: ApprovalConfig,

    pub notify: NotifyConfig,

    pub retry: RetryConfig,
}

impl ProjectConfig {
    /// Checks settings that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.approval.max_reason_len == 0 {
            return Err(ConfigError::Invalid(
                "approval.max_reason_len must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (i, ward) in self.wards.iter().enumerate() {
            if self.wards[..i].iter().any(|w| w.id == ward.id) {
                return Err(ConfigError::Invalid(format!("duplicate ward '{}'", ward.id)));
            }
        }
        Ok(())
    }

    pub fn ward_registry(&self) -> WardRegistry {
        WardRegistry::new(self.wards.clone())
    }

    pub fn workflow_policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            max_reason_len: self.approval.max_reason_len,
            recipients: self.notify.recipients.clone(),
            approvers: self.notify.approvers.clone(),
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Identity used when no `--actor` flag or environment override is given
    pub actor_id: Option<String>,

    pub actor_name: Option<String>,

    pub role: Option<Role>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let (project, project_root) = Self::load_project()?;

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "ward-census", "census")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Finds and loads project configuration
    fn load_project() -> Result<(ProjectConfig, Option<PathBuf>)> {
        match Self::find_project_root() {
            Some(root) => {
                let config = Self::load_project_config(&root)?;
                Ok((config, Some(root)))
            }
            None => Ok((ProjectConfig::default(), None)),
        }
    }

    /// Loads and validates project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".census").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;
        config
            .validate()
            .with_context(|| format!("In {}", config_path.display()))?;
        Ok(config)
    }

    /// Finds the project root by looking for `.census/` from the current directory up
    pub fn find_project_root() -> Option<PathBuf> {
        Self::find_project_root_from(&std::env::current_dir().ok()?)
    }

    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(".census").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a census project. Run 'census init' first."))
    }

    /// Saves the project configuration
    pub fn save_project(&self) -> Result<()> {
        let root = self.require_project_root()?;
        let config_path = root.join(".census").join("config.toml");

        self.project
            .validate()
            .context("Refusing to save invalid project config")?;
        let content =
            toml::to_string_pretty(&self.project).context("Failed to serialize project config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write project config: {}", config_path.display()))
    }
}
