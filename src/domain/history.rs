//! Approval history
//!
//! One record per approve/reject decision. Records are append-only and never
//! edited once written.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::actor::{Actor, ActorRef};
use super::error::ValidationError;
use super::form::{FormStatus, ShiftForm};
use super::id::{FormId, Shift, WardId};

/// Default upper bound on rejection reason length, in characters
pub const MAX_REASON_LEN: usize = 500;

/// Decision recorded in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryRecord {
    pub form_id: FormId,
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub shift: Shift,
    pub action: ApprovalAction,
    pub actor_id: String,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalHistoryRecord {
    pub fn approved(form: &ShiftForm, actor: &Actor, timestamp: DateTime<Utc>) -> Self {
        Self::build(form, ApprovalAction::Approved, &actor.to_ref(), timestamp, None)
    }

    pub fn rejected(
        form: &ShiftForm,
        actor: &Actor,
        reason: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::build(
            form,
            ApprovalAction::Rejected,
            &actor.to_ref(),
            timestamp,
            Some(reason),
        )
    }

    /// Rebuilds the record of the decision stored on the form itself
    ///
    /// Returns None unless the form is APPROVED or REJECTED with its decision
    /// fields set.
    pub fn recorded_on(form: &ShiftForm) -> Option<Self> {
        match form.status {
            FormStatus::Approved => {
                let actor = form.approved_by.as_ref()?;
                let at = form.approved_at?;
                Some(Self::build(form, ApprovalAction::Approved, actor, at, None))
            }
            FormStatus::Rejected => {
                let actor = form.rejected_by.as_ref()?;
                let at = form.rejected_at?;
                let reason = form.rejection_reason.clone()?;
                Some(Self::build(form, ApprovalAction::Rejected, actor, at, Some(reason)))
            }
            _ => None,
        }
    }

    fn build(
        form: &ShiftForm,
        action: ApprovalAction,
        actor: &ActorRef,
        timestamp: DateTime<Utc>,
        reason: Option<String>,
    ) -> Self {
        Self {
            form_id: form.id.clone(),
            ward_id: form.ward_id.clone(),
            date: form.date,
            shift: form.shift,
            action,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            timestamp,
            reason,
        }
    }
}

/// Trims a rejection reason and checks it is 1..=max_len characters
pub fn validate_reason(reason: &str, max_len: usize) -> Result<String, ValidationError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::EmptyReason);
    }
    let len = reason.chars().count();
    if len > max_len {
        return Err(ValidationError::ReasonTooLong { len, max: max_len });
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_trimmed() {
        assert_eq!(validate_reason("  wrong RN count \n", 500).unwrap(), "wrong RN count");
    }

    #[test]
    fn blank_reason_is_rejected() {
        assert_eq!(validate_reason("", 500), Err(ValidationError::EmptyReason));
        assert_eq!(validate_reason("   ", 500), Err(ValidationError::EmptyReason));
    }

    #[test]
    fn reason_length_is_counted_in_characters() {
        let at_limit = "é".repeat(500);
        assert!(validate_reason(&at_limit, MAX_REASON_LEN).is_ok());

        let over = "x".repeat(501);
        assert_eq!(
            validate_reason(&over, MAX_REASON_LEN),
            Err(ValidationError::ReasonTooLong { len: 501, max: 500 })
        );
    }

    #[test]
    fn action_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ApprovalAction::Rejected).unwrap(),
            "\"REJECTED\""
        );
    }
}
