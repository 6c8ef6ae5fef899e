//! Ward reference data
//!
//! Wards are owned by the host application; the engine only reads them to
//! validate ward IDs and to label output.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::id::WardId;

/// A hospital ward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: WardId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Ward {
    pub fn new(id: WardId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }
}

/// Read-only lookup over the host's wards
#[derive(Debug, Clone, Default)]
pub struct WardRegistry {
    wards: Vec<Ward>,
}

impl WardRegistry {
    pub fn new(wards: Vec<Ward>) -> Self {
        Self { wards }
    }

    pub fn get(&self, id: &WardId) -> Option<&Ward> {
        self.wards.iter().find(|w| &w.id == id)
    }

    /// Returns the ward if it exists and accepts new records
    pub fn require_active(&self, id: &WardId) -> Result<&Ward, ValidationError> {
        match self.get(id) {
            Some(ward) if ward.active => Ok(ward),
            Some(_) => Err(ValidationError::InactiveWard(id.clone())),
            None => Err(ValidationError::UnknownWard(id.clone())),
        }
    }

    /// Display label, falling back to the raw ID for unknown wards
    pub fn label(&self, id: &WardId) -> String {
        self.get(id)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ward> {
        self.wards.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }
}
