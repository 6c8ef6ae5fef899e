//! Shift form domain model
//!
//! One form records a ward's census, staffing and patient movement for a
//! single shift. Forms move through a closed set of states:
//!
//! ```text
//! DRAFT --finalize--> FINAL --approve--> APPROVED
//!                           \--reject---> REJECTED
//! ```
//!
//! APPROVED and REJECTED are terminal. A rejected form is never reopened;
//! the recorder starts a new draft for the same key which supersedes it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::actor::{Actor, ActorRef};
use super::census::{settle, CarryOver, CensusOutcome, Movement, NegativeCensusWarning};
use super::error::{ValidationError, WorkflowError};
use super::id::{FormId, FormKey, Shift, WardId};

/// Lifecycle status of a shift form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    #[default]
    Draft,
    Final,
    Approved,
    Rejected,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "DRAFT",
            FormStatus::Final => "FINAL",
            FormStatus::Approved => "APPROVED",
            FormStatus::Rejected => "REJECTED",
        }
    }

    /// The transition table. Anything not listed here is illegal.
    pub fn can_transition_to(self, to: FormStatus) -> bool {
        matches!(
            (self, to),
            (FormStatus::Draft, FormStatus::Final)
                | (FormStatus::Final, FormStatus::Approved)
                | (FormStatus::Final, FormStatus::Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FormStatus::Approved | FormStatus::Rejected)
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, FormStatus::Draft)
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric field on a shift form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    PatientCensus,
    NurseManager,
    Rn,
    Pn,
    Wc,
    NewAdmit,
    TransferIn,
    ReferIn,
    TransferOut,
    ReferOut,
    Discharge,
    Dead,
    Available,
    Unavailable,
    PlannedDischarge,
}

impl CounterField {
    pub const ALL: [CounterField; 15] = [
        CounterField::PatientCensus,
        CounterField::NurseManager,
        CounterField::Rn,
        CounterField::Pn,
        CounterField::Wc,
        CounterField::NewAdmit,
        CounterField::TransferIn,
        CounterField::ReferIn,
        CounterField::TransferOut,
        CounterField::ReferOut,
        CounterField::Discharge,
        CounterField::Dead,
        CounterField::Available,
        CounterField::Unavailable,
        CounterField::PlannedDischarge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CounterField::PatientCensus => "patient_census",
            CounterField::NurseManager => "nurse_manager",
            CounterField::Rn => "rn",
            CounterField::Pn => "pn",
            CounterField::Wc => "wc",
            CounterField::NewAdmit => "new_admit",
            CounterField::TransferIn => "transfer_in",
            CounterField::ReferIn => "refer_in",
            CounterField::TransferOut => "transfer_out",
            CounterField::ReferOut => "refer_out",
            CounterField::Discharge => "discharge",
            CounterField::Dead => "dead",
            CounterField::Available => "available",
            CounterField::Unavailable => "unavailable",
            CounterField::PlannedDischarge => "planned_discharge",
        }
    }

    /// Staffing and movement must be present before finalizing
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            CounterField::Available | CounterField::Unavailable | CounterField::PlannedDischarge
        )
    }

    /// Patient census is computed, never entered
    pub fn is_derived(&self) -> bool {
        matches!(self, CounterField::PatientCensus)
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CounterField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept camelCase and kebab-case too
        let normalized: String = s
            .trim()
            .chars()
            .flat_map(|c| {
                if c.is_ascii_uppercase() {
                    vec!['_', c.to_ascii_lowercase()]
                } else if c == '-' {
                    vec!['_']
                } else {
                    vec![c]
                }
            })
            .collect();

        CounterField::ALL
            .into_iter()
            .find(|f| f.name() == normalized)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Entered counters; `None` means explicitly absent, not zero
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusCounters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_manager: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_admit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_in: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer_in: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_out: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer_out: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_discharge: Option<u32>,
}

impl CensusCounters {
    fn slot(&mut self, field: CounterField) -> Option<&mut Option<u32>> {
        let slot = match field {
            CounterField::PatientCensus => return None,
            CounterField::NurseManager => &mut self.nurse_manager,
            CounterField::Rn => &mut self.rn,
            CounterField::Pn => &mut self.pn,
            CounterField::Wc => &mut self.wc,
            CounterField::NewAdmit => &mut self.new_admit,
            CounterField::TransferIn => &mut self.transfer_in,
            CounterField::ReferIn => &mut self.refer_in,
            CounterField::TransferOut => &mut self.transfer_out,
            CounterField::ReferOut => &mut self.refer_out,
            CounterField::Discharge => &mut self.discharge,
            CounterField::Dead => &mut self.dead,
            CounterField::Available => &mut self.available,
            CounterField::Unavailable => &mut self.unavailable,
            CounterField::PlannedDischarge => &mut self.planned_discharge,
        };
        Some(slot)
    }

    /// Gets an entered value (patient census is not an entered value)
    pub fn get(&self, field: CounterField) -> Option<u32> {
        match field {
            CounterField::PatientCensus => None,
            CounterField::NurseManager => self.nurse_manager,
            CounterField::Rn => self.rn,
            CounterField::Pn => self.pn,
            CounterField::Wc => self.wc,
            CounterField::NewAdmit => self.new_admit,
            CounterField::TransferIn => self.transfer_in,
            CounterField::ReferIn => self.refer_in,
            CounterField::TransferOut => self.transfer_out,
            CounterField::ReferOut => self.refer_out,
            CounterField::Discharge => self.discharge,
            CounterField::Dead => self.dead,
            CounterField::Available => self.available,
            CounterField::Unavailable => self.unavailable,
            CounterField::PlannedDischarge => self.planned_discharge,
        }
    }

    /// Sets a value after checking it is a non-negative entered field
    pub fn set(&mut self, field: CounterField, value: i64) -> Result<(), ValidationError> {
        if value < 0 {
            return Err(ValidationError::NegativeValue {
                field: field.name(),
                value,
            });
        }
        let value = u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
            field: field.name(),
            value,
            max: u32::MAX,
        })?;
        let slot = self
            .slot(field)
            .ok_or(ValidationError::DerivedField(field.name()))?;
        *slot = Some(value);
        Ok(())
    }

    /// Marks a field as absent again
    pub fn clear(&mut self, field: CounterField) {
        if let Some(slot) = self.slot(field) {
            *slot = None;
        }
    }

    /// Movement with absent fields contributing zero
    pub fn movement(&self) -> Movement {
        Movement {
            new_admit: self.new_admit.unwrap_or(0),
            transfer_in: self.transfer_in.unwrap_or(0),
            refer_in: self.refer_in.unwrap_or(0),
            transfer_out: self.transfer_out.unwrap_or(0),
            refer_out: self.refer_out.unwrap_or(0),
            discharge: self.discharge.unwrap_or(0),
            dead: self.dead.unwrap_or(0),
        }
    }

    /// Nursing staff on shift: manager, RN, PN and WC
    pub fn nurse_total(&self) -> u32 {
        [self.nurse_manager, self.rn, self.pn, self.wc]
            .iter()
            .map(|v| v.unwrap_or(0))
            .fold(0u32, u32::saturating_add)
    }

    /// Names of required fields that are still absent
    pub fn missing_required(&self) -> Vec<&'static str> {
        CounterField::ALL
            .iter()
            .filter(|f| f.is_required() && !f.is_derived() && self.get(**f).is_none())
            .map(|f| f.name())
            .collect()
    }
}

/// A shift census record for one (ward, date, shift)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftForm {
    pub id: FormId,
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub shift: Shift,

    pub status: FormStatus,

    /// Mirrors `status == DRAFT` for hosts that filter on it
    pub is_draft: bool,

    /// Census at shift end, clamped to >= 0
    pub patient_census: u32,

    /// Starting census and where it came from
    pub carry_over: CarryOver,

    /// Recorder-supplied starting census for a ward's first record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_census: Option<u32>,

    #[serde(default)]
    pub counters: CensusCounters,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub census_warning: Option<NegativeCensusWarning>,

    pub created_by: ActorRef,
    pub updated_by: ActorRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ActorRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<ActorRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// The rejected form this draft replaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<FormId>,

    /// Optimistic concurrency counter, bumped on every write
    #[serde(default)]
    pub revision: u64,
}

impl ShiftForm {
    /// Creates a new draft and computes its census
    pub fn new_draft(
        key: FormKey,
        recorder: &Actor,
        carry_over: CarryOver,
        initial_census: Option<u32>,
        counters: CensusCounters,
        now: DateTime<Utc>,
    ) -> Self {
        let mut form = Self {
            id: FormId::new(&key, now),
            ward_id: key.ward_id,
            date: key.date,
            shift: key.shift,
            status: FormStatus::Draft,
            is_draft: true,
            patient_census: 0,
            carry_over,
            initial_census,
            counters,
            census_warning: None,
            created_by: recorder.to_ref(),
            updated_by: recorder.to_ref(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            supersedes: None,
            revision: 0,
        };
        form.recompute(form.carry_over.clone());
        form
    }

    /// Marks this draft as replacing a rejected form for the same key
    pub fn supersede(&mut self, previous: FormId) {
        self.id = FormId::superseding(&self.key(), &previous, self.created_at);
        self.supersedes = Some(previous);
    }

    pub fn key(&self) -> FormKey {
        FormKey::new(self.ward_id.clone(), self.date, self.shift)
    }

    /// Recomputes the census from a (possibly refreshed) carry-over
    pub fn recompute(&mut self, carry_over: CarryOver) -> CensusOutcome {
        let outcome = settle(carry_over.previous_census, &self.counters.movement());
        self.carry_over = carry_over;
        self.patient_census = outcome.census;
        self.census_warning = outcome.warning;
        outcome
    }

    pub fn nurse_total(&self) -> u32 {
        self.counters.nurse_total()
    }

    /// Patients per nurse; None when no nursing staff were recorded
    pub fn nurse_ratio(&self) -> Option<f64> {
        ratio(self.patient_census, self.nurse_total())
    }

    fn is_creator(&self, actor: &Actor) -> bool {
        self.created_by.id == actor.id
    }

    fn touch(&mut self, actor: &Actor, now: DateTime<Utc>) {
        self.updated_by = actor.to_ref();
        self.updated_at = now;
    }

    fn check_transition(&self, to: FormStatus) -> Result<(), WorkflowError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidStateTransition {
                form: self.id.clone(),
                from: self.status,
                to,
            })
        }
    }

    fn require_editor(&self, actor: &Actor, action: &'static str) -> Result<(), WorkflowError> {
        if self.is_creator(actor) || actor.role.can_edit_any() {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                action,
            })
        }
    }

    fn require_approver(actor: &Actor, action: &'static str) -> Result<(), WorkflowError> {
        if actor.role.can_approve() {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                action,
            })
        }
    }

    /// Checks the form is a draft that `actor` may edit
    pub fn check_editable(&self, actor: &Actor) -> Result<(), WorkflowError> {
        if !self.status.is_editable() {
            return Err(WorkflowError::InvalidStateTransition {
                form: self.id.clone(),
                from: self.status,
                to: FormStatus::Draft,
            });
        }
        self.require_editor(actor, "edit this form")
    }

    /// Edits an entered counter; only drafts are editable
    pub fn set_counter(
        &mut self,
        field: CounterField,
        value: i64,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.check_editable(actor)?;
        self.counters.set(field, value)?;
        self.touch(actor, now);
        Ok(())
    }

    /// DRAFT -> FINAL: locks the counters
    pub fn finalize(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.check_transition(FormStatus::Final)?;
        self.require_editor(actor, "finalize this form")?;
        if let Some(field) = self.counters.missing_required().first() {
            return Err(ValidationError::MissingField(field).into());
        }

        self.status = FormStatus::Final;
        self.is_draft = false;
        self.finalized_at = Some(now);
        self.touch(actor, now);
        Ok(())
    }

    /// FINAL -> APPROVED
    pub fn approve(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.status == FormStatus::Approved {
            return Err(WorkflowError::AlreadyApproved(self.id.clone()));
        }
        Self::require_approver(actor, "approve forms")?;
        self.check_transition(FormStatus::Approved)?;
        if self.census_warning.is_some() {
            return Err(ValidationError::OpenWarning(self.id.clone()).into());
        }

        self.status = FormStatus::Approved;
        self.approved_at = Some(now);
        self.approved_by = Some(actor.to_ref());
        self.touch(actor, now);
        Ok(())
    }

    /// FINAL -> REJECTED; `reason` must already be trimmed and bounded
    pub fn reject(
        &mut self,
        actor: &Actor,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }
        Self::require_approver(actor, "reject forms")?;
        self.check_transition(FormStatus::Rejected)?;

        self.status = FormStatus::Rejected;
        self.finalized_at = None;
        self.rejected_at = Some(now);
        self.rejected_by = Some(actor.to_ref());
        self.rejection_reason = Some(reason);
        self.touch(actor, now);
        Ok(())
    }

    /// Checks the record-level invariants
    pub fn check_invariants(&self) -> Result<(), String> {
        let finalized = matches!(self.status, FormStatus::Final | FormStatus::Approved);
        if finalized != self.finalized_at.is_some() {
            return Err(format!(
                "finalized_at must be set iff status is FINAL or APPROVED (status {})",
                self.status
            ));
        }
        let rejected = self.status == FormStatus::Rejected;
        if rejected != self.rejection_reason.is_some() {
            return Err(format!(
                "rejection_reason must be set iff status is REJECTED (status {})",
                self.status
            ));
        }
        if self.is_draft != (self.status == FormStatus::Draft) {
            return Err("is_draft out of sync with status".to_string());
        }
        Ok(())
    }
}

/// Patients per nurse, undefined when there are no nurses
pub fn ratio(patients: u32, nurses: u32) -> Option<f64> {
    (nurses > 0).then(|| f64::from(patients) / f64::from(nurses))
}
