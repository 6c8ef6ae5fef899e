//! People acting on shift forms

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What an actor is allowed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Records and finalizes their own shift forms
    #[default]
    Recorder,
    /// Approves or rejects finalized forms
    Approver,
    /// Edit rights on any draft, plus approval
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Recorder => "recorder",
            Role::Approver => "approver",
            Role::Admin => "admin",
        }
    }

    pub fn can_edit_any(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Approver | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recorder" | "nurse" => Ok(Role::Recorder),
            "approver" => Ok(Role::Approver),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity recorded on forms and history entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub name: String,
}

/// An authenticated user performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn recorder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Recorder)
    }

    pub fn approver(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Approver)
    }

    pub fn to_ref(&self) -> ActorRef {
        ActorRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}
