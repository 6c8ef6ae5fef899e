//! JSONL storage for forms, history, summaries and notifications
//!
//! Each file in `.census/` holds one JSON object per line. Forms and
//! summaries are rewritten in full through a temp file and an atomic rename;
//! history and the notification outbox are append-only. Writers serialize on
//! `.census/write.lock` so a form's read-check-write is a single step.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::domain::{ApprovalHistoryRecord, DailySummary, FormId, FormKey, ShiftForm, WardId};
use crate::engine::ports::{
    check_write, live_form, FormStore, Notification, NotificationSink, StoreError, SummaryStore,
};

/// A JSONL file of `T` records
pub struct JsonlFile<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in file order
    pub fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.lock_shared()
            .with_context(|| format!("Failed to acquire read lock on {}", self.path.display()))?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse {} at line {}",
                    self.path.display(),
                    line_num + 1
                )
            })?;
            records.push(record);
        }

        Ok(records)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    /// Replaces the file contents (temp file + rename)
    pub fn write_all<'a>(&self, records: impl IntoIterator<Item = &'a T>) -> Result<()>
    where
        T: 'a,
    {
        self.ensure_parent()?;

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            let mut writer = BufWriter::new(&file);
            for record in records {
                let line = serde_json::to_string(record).context("Failed to serialize record")?;
                writeln!(writer, "{}", line).context("Failed to write record")?;
            }
            writer.flush().context("Failed to flush records")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Appends one record
    pub fn append(&self, record: &T) -> Result<()> {
        self.ensure_parent()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire write lock on {}", self.path.display()))?;

        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(writer, "{}", line).context("Failed to write record")?;
        writer.flush().context("Failed to flush record")?;

        Ok(())
    }
}

/// Exclusive writer lock for a project directory
///
/// Contention surfaces as [`StoreError::Unavailable`] so callers can back off
/// and retry.
struct WriteLock {
    _file: File,
}

impl WriteLock {
    fn acquire(path: &Path) -> std::result::Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { _file: file }),
            Err(e) if is_contended(&e) => Err(StoreError::Unavailable(format!(
                "{} is held by another writer",
                path.display()
            ))),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to lock {}", path.display()))
                .into()),
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

fn in_range(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    date >= from && date <= to
}

/// Form and approval history store under `.census/`
pub struct FormFileStore {
    forms: JsonlFile<ShiftForm>,
    history: JsonlFile<ApprovalHistoryRecord>,
    lock_path: PathBuf,
}

impl FormFileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            forms: JsonlFile::new(dir.join("forms.jsonl")),
            history: JsonlFile::new(dir.join("history.jsonl")),
            lock_path: dir.join("write.lock"),
        }
    }

    pub fn forms_path(&self) -> &Path {
        self.forms.path()
    }

    /// Every stored form, superseded ones included
    pub fn read_all(&self) -> Result<Vec<ShiftForm>> {
        self.forms.read_all()
    }
}

impl FormStore for FormFileStore {
    fn get(&self, key: &FormKey) -> std::result::Result<Option<ShiftForm>, StoreError> {
        let forms = self.forms.read_all()?;
        Ok(live_form(forms.iter(), key).cloned())
    }

    fn get_by_id(&self, id: &FormId) -> std::result::Result<Option<ShiftForm>, StoreError> {
        Ok(self.forms.read_all()?.into_iter().find(|f| &f.id == id))
    }

    fn put(&self, form: &ShiftForm) -> std::result::Result<(), StoreError> {
        let _lock = WriteLock::acquire(&self.lock_path)?;

        let mut forms = self.forms.read_all()?;
        let stored = forms.iter().find(|f| f.id == form.id);
        let live = live_form(forms.iter(), &form.key());
        check_write(stored, live, form)?;

        match forms.iter_mut().find(|f| f.id == form.id) {
            Some(existing) => *existing = form.clone(),
            None => forms.push(form.clone()),
        }
        forms.sort_by(|a, b| {
            a.key()
                .cmp(&b.key())
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        self.forms.write_all(&forms)?;

        debug!(form_id = %form.id, revision = form.revision, "form written");
        Ok(())
    }

    fn list(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> std::result::Result<Vec<ShiftForm>, StoreError> {
        let forms = self.forms.read_all()?;
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

    fn append_history(
        &self,
        record: &ApprovalHistoryRecord,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.history.append(record)?)
    }

    fn history(
        &self,
        form: &FormId,
    ) -> std::result::Result<Vec<ApprovalHistoryRecord>, StoreError> {
        Ok(self
            .history
            .read_all()?
            .into_iter()
            .filter(|r| &r.form_id == form)
            .collect())
    }
}

/// Daily summary store under `.census/summaries.jsonl`
pub struct SummaryFileStore {
    summaries: JsonlFile<DailySummary>,
    lock_path: PathBuf,
}

impl SummaryFileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            summaries: JsonlFile::new(dir.join("summaries.jsonl")),
            lock_path: dir.join("summaries.lock"),
        }
    }
}

impl SummaryStore for SummaryFileStore {
    fn put(&self, summary: &DailySummary) -> std::result::Result<(), StoreError> {
        let _lock = WriteLock::acquire(&self.lock_path)?;

        let mut summaries = self.summaries.read_all()?;
        summaries.retain(|s| !(s.ward_id == summary.ward_id && s.date == summary.date));
        summaries.push(summary.clone());
        summaries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ward_id.cmp(&b.ward_id)));
        Ok(self.summaries.write_all(&summaries)?)
    }

    fn get(
        &self,
        ward: &WardId,
        date: NaiveDate,
    ) -> std::result::Result<Option<DailySummary>, StoreError> {
        Ok(self
            .summaries
            .read_all()?
            .into_iter()
            .find(|s| &s.ward_id == ward && s.date == date))
    }

    fn range(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> std::result::Result<Vec<DailySummary>, StoreError> {
        Ok(self
            .summaries
            .read_all()?
            .into_iter()
            .filter(|s| in_range(s.date, from, to))
            .filter(|s| ward.map_or(true, |w| &s.ward_id == w))
            .collect())
    }
}

/// Notification outbox at `.census/notifications.jsonl`
///
/// Delivery is left to whatever tails the file. A failed append is logged
/// and otherwise ignored.
pub struct Outbox {
    file: JsonlFile<Notification>,
}

impl Outbox {
    pub fn new(dir: &Path) -> Self {
        Self {
            file: JsonlFile::new(dir.join("notifications.jsonl")),
        }
    }

    pub fn read_all(&self) -> Result<Vec<Notification>> {
        self.file.read_all()
    }
}

impl NotificationSink for Outbox {
    fn emit(&self, notification: &Notification) {
        if let Err(e) = self.file.append(notification) {
            let cause = format!("{:#}", e);
            error!(form_id = %notification.form_id, kind = ?notification.kind, error = %cause, "failed to queue notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, CarryOver, CarryOverSource, CensusCounters, Shift};
    use crate::engine::NotificationKind;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_form(shift: Shift) -> ShiftForm {
        let key = FormKey::new(
            "WARD6".parse().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            shift,
        );
        let mut form = ShiftForm::new_draft(
            key,
            &Actor::recorder("u-1", "Nurse Joy"),
            CarryOver {
                previous_census: 12,
                source: CarryOverSource::Initial,
            },
            Some(12),
            CensusCounters::default(),
            Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap(),
        );
        form.revision = 1;
        form
    }

    #[test]
    fn read_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());

        assert!(store.read_all().unwrap().is_empty());
        assert!(store.get(&make_form(Shift::Morning).key()).unwrap().is_none());
    }

    #[test]
    fn put_and_get_form() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());
        let form = make_form(Shift::Morning);

        store.put(&form).unwrap();

        assert_eq!(store.get(&form.key()).unwrap(), Some(form.clone()));
        assert_eq!(store.get_by_id(&form.id).unwrap(), Some(form));
    }

    #[test]
    fn stale_put_is_conflict() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());
        let mut form = make_form(Shift::Night);
        store.put(&form).unwrap();

        form.revision = 2;
        store.put(&form).unwrap();
        assert!(matches!(
            store.put(&form),
            Err(StoreError::Conflict { found: 2, .. })
        ));
    }

    #[test]
    fn held_lock_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());

        let holder = File::create(dir.path().join("write.lock")).unwrap();
        holder.lock_exclusive().unwrap();

        assert!(matches!(
            store.put(&make_form(Shift::Morning)),
            Err(StoreError::Unavailable(_))
        ));

        holder.unlock().unwrap();
        store.put(&make_form(Shift::Morning)).unwrap();
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("forms.jsonl"), "{not json}\n").unwrap();
        let store = FormFileStore::new(dir.path());

        let err = store.get_by_id(&"f-1234567".parse().unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(format!("{:#}", anyhow::Error::from(err)).contains("line 1"));
    }

    #[test]
    fn history_is_filtered_by_form() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());
        let morning = make_form(Shift::Morning);
        let night = make_form(Shift::Night);
        let approver = Actor::approver("a-1", "Head Nurse");
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        store
            .append_history(&ApprovalHistoryRecord::approved(&morning, &approver, ts))
            .unwrap();
        store
            .append_history(&ApprovalHistoryRecord::rejected(
                &night,
                &approver,
                "recount".to_string(),
                ts,
            ))
            .unwrap();

        let history = store.history(&night.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason.as_deref(), Some("recount"));
    }

    #[test]
    fn summary_put_replaces_same_day() {
        let dir = TempDir::new().unwrap();
        let store = SummaryFileStore::new(dir.path());
        let form = make_form(Shift::Morning);
        let ward = form.ward_id.clone();

        let first = DailySummary::aggregate(&ward, form.date, None, None).unwrap();
        store.put(&first).unwrap();
        let second = DailySummary::aggregate(&ward, form.date, Some(&form), None).unwrap();
        store.put(&second).unwrap();

        let all = store.range(None, form.date, form.date).unwrap();
        assert_eq!(all, vec![second]);
    }

    #[test]
    fn outbox_appends_notifications() {
        let dir = TempDir::new().unwrap();
        let outbox = Outbox::new(dir.path());
        let form = make_form(Shift::Morning);

        outbox.emit(&Notification {
            kind: NotificationKind::FormApproved,
            ward_id: form.ward_id.clone(),
            date: form.date,
            form_id: form.id.clone(),
            recipient_ids: vec!["u-1".to_string()],
        });

        let queued = outbox.read_all().unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, NotificationKind::FormApproved);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FormFileStore::new(dir.path());
        store.put(&make_form(Shift::Morning)).unwrap();

        assert!(!store.forms_path().with_extension("jsonl.tmp").exists());
    }
}
