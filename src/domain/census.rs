//! Patient census calculation
//!
//! A shift's census is the carry-over from the preceding shift plus the
//! movement recorded during the shift:
//!
//! ```text
//! census = previous + new_admit + transfer_in + refer_in
//!                   - transfer_out - refer_out - discharge - dead
//! ```
//!
//! The raw result may be negative when the entered movement is inconsistent.
//! [`settle`] records a [`NegativeCensusWarning`] first and only then clamps.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::form::{FormStatus, ShiftForm};
use super::id::{FormId, FormKey, Shift};

/// Computes the raw census from carry-over and movement deltas
#[allow(clippy::too_many_arguments)]
pub fn compute_census(
    previous_census: u32,
    new_admit: u32,
    transfer_in: u32,
    refer_in: u32,
    transfer_out: u32,
    refer_out: u32,
    discharge: u32,
    dead: u32,
) -> i64 {
    let inflow = i64::from(new_admit) + i64::from(transfer_in) + i64::from(refer_in);
    let outflow = i64::from(transfer_out)
        + i64::from(refer_out)
        + i64::from(discharge)
        + i64::from(dead);
    i64::from(previous_census) + inflow - outflow
}

/// Patient movement recorded during one shift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub new_admit: u32,
    pub transfer_in: u32,
    pub refer_in: u32,
    pub transfer_out: u32,
    pub refer_out: u32,
    pub discharge: u32,
    pub dead: u32,
}

impl Movement {
    /// Applies this movement to a carry-over census
    pub fn apply(&self, previous_census: u32) -> i64 {
        compute_census(
            previous_census,
            self.new_admit,
            self.transfer_in,
            self.refer_in,
            self.transfer_out,
            self.refer_out,
            self.discharge,
            self.dead,
        )
    }
}

/// Raised when movement would take the census below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeCensusWarning {
    pub previous_census: u32,
    pub raw_census: i64,
}

/// Result of settling a shift's census
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CensusOutcome {
    /// Unclamped arithmetic result
    pub raw: i64,
    /// Census clamped to >= 0
    pub census: u32,
    pub warning: Option<NegativeCensusWarning>,
}

/// Computes the census, flagging and then clamping a negative result
pub fn settle(previous_census: u32, movement: &Movement) -> CensusOutcome {
    let raw = movement.apply(previous_census);
    let warning = (raw < 0).then_some(NegativeCensusWarning {
        previous_census,
        raw_census: raw,
    });
    let census = u32::try_from(raw.max(0)).unwrap_or(u32::MAX);

    CensusOutcome {
        raw,
        census,
        warning,
    }
}

/// Where a shift's starting census came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "form", rename_all = "snake_case")]
pub enum CarryOverSource {
    /// Prior day's approved night shift
    PriorNight(FormId),
    /// Same day's finalized or approved morning shift
    SameDayMorning(FormId),
    /// Initial census supplied by the recorder
    Initial,
}

/// The starting census for a shift and its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOver {
    pub previous_census: u32,
    pub source: CarryOverSource,
}

/// Returns true if `form` may supply the carry-over for a shift of kind `shift`
pub fn qualifies_as_predecessor(shift: Shift, form: &ShiftForm) -> bool {
    match shift {
        Shift::Morning => form.status == FormStatus::Approved,
        Shift::Night => matches!(form.status, FormStatus::Final | FormStatus::Approved),
    }
}

/// Resolves the carry-over census for `key`
///
/// `predecessor` is the live form for `key.predecessor()`, if any. When it
/// does not qualify, the recorder-supplied `initial_census` is used; without
/// one the form cannot be computed.
pub fn resolve_carry_over(
    key: &FormKey,
    predecessor: Option<&ShiftForm>,
    initial_census: Option<u32>,
) -> Result<CarryOver, ValidationError> {
    if let Some(prev) = predecessor.filter(|p| qualifies_as_predecessor(key.shift, p)) {
        let source = match key.shift {
            Shift::Morning => CarryOverSource::PriorNight(prev.id.clone()),
            Shift::Night => CarryOverSource::SameDayMorning(prev.id.clone()),
        };
        return Ok(CarryOver {
            previous_census: prev.patient_census,
            source,
        });
    }

    initial_census
        .map(|previous_census| CarryOver {
            previous_census,
            source: CarryOverSource::Initial,
        })
        .ok_or_else(|| ValidationError::MissingCarryOver(key.clone()))
}
