//! In-memory port implementations
//!
//! Used by tests and by hosts that keep their own persistence elsewhere.
//! Nothing here survives the process.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::ports::{
    check_write, live_form, Clock, FormStore, Notification, NotificationSink, StoreError,
    SummaryStore,
};
use crate::domain::{ApprovalHistoryRecord, DailySummary, FormId, FormKey, ShiftForm, WardId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn in_range(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    date >= from && date <= to
}

#[derive(Debug, Default)]
pub struct MemoryFormStore {
    forms: Mutex<Vec<ShiftForm>>,
    history: Mutex<Vec<ApprovalHistoryRecord>>,
    /// Number of upcoming calls that fail as unavailable
    outages: Mutex<u32>,
}

impl MemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `calls` store calls fail with [`StoreError::Unavailable`]
    pub fn fail_next(&self, calls: u32) {
        *lock(&self.outages) = calls;
    }

    /// Every stored record, superseded ones included
    pub fn all(&self) -> Vec<ShiftForm> {
        lock(&self.forms).clone()
    }

    /// Overwrites a record without revision checks, to simulate another writer
    pub fn force(&self, form: ShiftForm) {
        let mut forms = lock(&self.forms);
        forms.retain(|f| f.id != form.id);
        forms.push(form);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let mut outages = lock(&self.outages);
        if *outages > 0 {
            *outages -= 1;
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl FormStore for MemoryFormStore {
    fn get(&self, key: &FormKey) -> Result<Option<ShiftForm>, StoreError> {
        self.check_available()?;
        let forms = lock(&self.forms);
        Ok(live_form(forms.iter(), key).cloned())
    }

    fn get_by_id(&self, id: &FormId) -> Result<Option<ShiftForm>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.forms).iter().find(|f| &f.id == id).cloned())
    }

    fn put(&self, form: &ShiftForm) -> Result<(), StoreError> {
        self.check_available()?;
        let mut forms = lock(&self.forms);
        let stored = forms.iter().find(|f| f.id == form.id);
        let live = live_form(forms.iter(), &form.key());
        check_write(stored, live, form)?;

        match forms.iter_mut().find(|f| f.id == form.id) {
            Some(existing) => *existing = form.clone(),
            None => forms.push(form.clone()),
        }
        Ok(())
    }

    fn list(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftForm>, StoreError> {
        self.check_available()?;
        let forms = lock(&self.forms);
        let mut live: Vec<ShiftForm> = forms
            .iter()
            .filter(|f| in_range(f.date, from, to))
            .filter(|f| ward.map_or(true, |w| &f.ward_id == w))
            .filter(|f| live_form(forms.iter(), &f.key()).map(|l| &l.id) == Some(&f.id))
            .cloned()
            .collect();
        live.sort_by_key(|f| f.key());
        Ok(live)
    }

    fn append_history(&self, record: &ApprovalHistoryRecord) -> Result<(), StoreError> {
        self.check_available()?;
        lock(&self.history).push(record.clone());
        Ok(())
    }

    fn history(&self, form: &FormId) -> Result<Vec<ApprovalHistoryRecord>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.history)
            .iter()
            .filter(|r| &r.form_id == form)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    summaries: Mutex<Vec<DailySummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SummaryStore for MemorySummaryStore {
    fn put(&self, summary: &DailySummary) -> Result<(), StoreError> {
        let mut summaries = lock(&self.summaries);
        summaries.retain(|s| !(s.ward_id == summary.ward_id && s.date == summary.date));
        summaries.push(summary.clone());
        Ok(())
    }

    fn get(&self, ward: &WardId, date: NaiveDate) -> Result<Option<DailySummary>, StoreError> {
        Ok(lock(&self.summaries)
            .iter()
            .find(|s| &s.ward_id == ward && s.date == date)
            .cloned())
    }

    fn range(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>, StoreError> {
        let mut found: Vec<DailySummary> = lock(&self.summaries)
            .iter()
            .filter(|s| in_range(s.date, from, to))
            .filter(|s| ward.map_or(true, |w| &s.ward_id == w))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ward_id.cmp(&b.ward_id)));
        Ok(found)
    }
}

/// Collects emitted notifications for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, notification: &Notification) {
        lock(&self.sent).push(notification.clone());
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, CarryOver, CarryOverSource, CensusCounters, Shift};
    use chrono::TimeZone;

    fn form(shift: Shift) -> ShiftForm {
        let key = FormKey::new(
            "WARD6".parse().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            shift,
        );
        let mut form = ShiftForm::new_draft(
            key,
            &Actor::recorder("u-1", "Nurse Joy"),
            CarryOver {
                previous_census: 10,
                source: CarryOverSource::Initial,
            },
            Some(10),
            CensusCounters::default(),
            Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap(),
        );
        form.revision = 1;
        form
    }

    #[test]
    fn put_then_get_by_key() {
        let store = MemoryFormStore::new();
        let f = form(Shift::Morning);
        store.put(&f).unwrap();

        assert_eq!(store.get(&f.key()).unwrap(), Some(f.clone()));
        assert_eq!(store.get_by_id(&f.id).unwrap(), Some(f));
    }

    #[test]
    fn stale_revision_is_a_conflict() {
        let store = MemoryFormStore::new();
        let mut f = form(Shift::Morning);
        store.put(&f).unwrap();

        f.revision = 2;
        store.put(&f).unwrap();

        // A writer that read revision 1 tries to write revision 2 again
        let err = store.put(&f).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));
    }

    #[test]
    fn second_new_form_for_same_key_is_a_conflict() {
        let store = MemoryFormStore::new();
        store.put(&form(Shift::Morning)).unwrap();

        let mut other = form(Shift::Morning);
        other.id = "f-0000000".parse().unwrap();
        assert!(matches!(store.put(&other), Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn superseding_form_becomes_live() {
        let store = MemoryFormStore::new();
        let old = form(Shift::Morning);
        store.put(&old).unwrap();

        let mut new = form(Shift::Morning);
        new.supersede(old.id.clone());
        store.put(&new).unwrap();

        assert_eq!(store.get(&old.key()).unwrap().unwrap().id, new.id);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn outage_is_transient() {
        let store = MemoryFormStore::new();
        store.fail_next(1);
        assert!(matches!(
            store.get(&form(Shift::Night).key()),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.get(&form(Shift::Night).key()).unwrap().is_none());
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }
}
