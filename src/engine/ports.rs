//! Capabilities the host supplies to the workflow
//!
//! The engine never talks to a database directly. Hosts implement these
//! traits over whatever storage and delivery they use; [`super::memory`] has
//! in-memory versions and the `storage` module has file-backed ones.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    ApprovalHistoryRecord, DailySummary, FormId, FormKey, ShiftForm, WardId, WorkflowError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored revision is not the one the writer read
    #[error("Revision conflict on {form}: expected {expected}, found {found}")]
    Conflict {
        form: FormId,
        expected: u64,
        found: u64,
    },

    /// Transient failure; the same call may succeed later
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { form, .. } => WorkflowError::ConcurrentModification(form),
            StoreError::Unavailable(msg) => WorkflowError::Store(msg),
            StoreError::Backend(e) => WorkflowError::Backend(format!("{:#}", e)),
        }
    }
}

/// Persistence for shift forms and their approval history
pub trait FormStore {
    /// Returns the live (non-superseded) form for a key
    fn get(&self, key: &FormKey) -> Result<Option<ShiftForm>, StoreError>;

    fn get_by_id(&self, id: &FormId) -> Result<Option<ShiftForm>, StoreError>;

    /// Writes a form whose `revision` has been bumped by exactly one
    ///
    /// New forms are written with revision 1 and must not exist yet. Any
    /// other mismatch is a [`StoreError::Conflict`].
    fn put(&self, form: &ShiftForm) -> Result<(), StoreError>;

    /// Lists live forms for a ward and date range (inclusive)
    fn list(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftForm>, StoreError>;

    fn append_history(&self, record: &ApprovalHistoryRecord) -> Result<(), StoreError>;

    fn history(&self, form: &FormId) -> Result<Vec<ApprovalHistoryRecord>, StoreError>;
}

/// Persistence for derived daily summaries
pub trait SummaryStore {
    fn put(&self, summary: &DailySummary) -> Result<(), StoreError>;

    fn get(&self, ward: &WardId, date: NaiveDate) -> Result<Option<DailySummary>, StoreError>;

    /// Summaries in an inclusive date range, ordered by date then ward
    fn range(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    FormApproved,
    FormRejected,
    /// Both shifts of a date are approved and the daily summary is final
    SummaryRequired,
}

/// Trigger payload handed to the host for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub form_id: FormId,
    pub recipient_ids: Vec<String>,
}

/// Fire-and-forget delivery; failures are the sink's to log
pub trait NotificationSink {
    fn emit(&self, notification: &Notification);
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Picks the live form for `key` out of every stored record
///
/// A form is live when no other form for the same key supersedes it. Ties
/// (which a correct writer never produces) go to the newest.
pub fn live_form<'a>(
    forms: impl IntoIterator<Item = &'a ShiftForm>,
    key: &FormKey,
) -> Option<&'a ShiftForm> {
    let candidates: Vec<&ShiftForm> = forms.into_iter().filter(|f| &f.key() == key).collect();
    candidates
        .iter()
        .copied()
        .filter(|f| {
            !candidates
                .iter()
                .any(|other| other.supersedes.as_ref() == Some(&f.id))
        })
        .max_by_key(|f| (f.created_at, f.revision))
}

/// Checks a write against what is currently stored
///
/// `stored` is the record with the incoming ID, `live` the live record for
/// its key. A brand-new record may only land on an empty key or on top of
/// the form it supersedes.
pub fn check_write(
    stored: Option<&ShiftForm>,
    live: Option<&ShiftForm>,
    incoming: &ShiftForm,
) -> Result<(), StoreError> {
    let found = stored.map(|f| f.revision).unwrap_or(0);
    let expected = incoming.revision.saturating_sub(1);
    if found != expected || incoming.revision == 0 {
        return Err(StoreError::Conflict {
            form: incoming.id.clone(),
            expected,
            found,
        });
    }

    if incoming.revision == 1 {
        if let Some(live) = live {
            if incoming.supersedes.as_ref() != Some(&live.id) {
                return Err(StoreError::Conflict {
                    form: incoming.id.clone(),
                    expected: 0,
                    found: live.revision,
                });
            }
        }
    }
    Ok(())
}

impl<T: FormStore + ?Sized> FormStore for &T {
    fn get(&self, key: &FormKey) -> Result<Option<ShiftForm>, StoreError> {
        (**self).get(key)
    }

    fn get_by_id(&self, id: &FormId) -> Result<Option<ShiftForm>, StoreError> {
        (**self).get_by_id(id)
    }

    fn put(&self, form: &ShiftForm) -> Result<(), StoreError> {
        (**self).put(form)
    }

    fn list(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftForm>, StoreError> {
        (**self).list(ward, from, to)
    }

    fn append_history(&self, record: &ApprovalHistoryRecord) -> Result<(), StoreError> {
        (**self).append_history(record)
    }

    fn history(&self, form: &FormId) -> Result<Vec<ApprovalHistoryRecord>, StoreError> {
        (**self).history(form)
    }
}

impl<T: SummaryStore + ?Sized> SummaryStore for &T {
    fn put(&self, summary: &DailySummary) -> Result<(), StoreError> {
        (**self).put(summary)
    }

    fn get(&self, ward: &WardId, date: NaiveDate) -> Result<Option<DailySummary>, StoreError> {
        (**self).get(ward, date)
    }

    fn range(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>, StoreError> {
        (**self).range(ward, from, to)
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for &T {
    fn emit(&self, notification: &Notification) {
        (**self).emit(notification)
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
