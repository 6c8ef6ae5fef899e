//! Shift form workflow service
//!
//! Drives forms through the state machine over the host's stores, records
//! approval history, keeps daily summaries current and emits notification
//! triggers. Every operation reads fresh state, applies one transition and
//! writes it back with an optimistic revision check.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::ports::{
    Clock, FormStore, Notification, NotificationKind, NotificationSink, SummaryStore,
};
use crate::domain::trend::{analyze, TrendReport, TrendSample};
use crate::domain::{
    resolve_carry_over, validate_reason, Actor, ApprovalAction, ApprovalHistoryRecord,
    CarryOver, CensusCounters, CounterField, DailySummary, FormId, FormKey, FormStatus, Shift,
    ShiftForm, ValidationError, WardId, WardRegistry, WorkflowError, MAX_REASON_LEN,
};

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Host policy the engine needs but does not own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub max_reason_len: usize,
    /// Notified of every approval decision, alongside the form's creator
    pub recipients: Vec<String>,
    /// Notified when a date's summary becomes final
    pub approvers: Vec<String>,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            max_reason_len: MAX_REASON_LEN,
            recipients: Vec::new(),
            approvers: Vec::new(),
        }
    }
}

/// Records trend analytics are computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendSource {
    /// One sample per ward-day
    #[default]
    Summaries,
    /// One sample per shift form
    Shifts,
}

/// Input for a new draft
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub key: FormKey,
    pub counters: CensusCounters,
    /// Starting census when the ward has no qualifying predecessor shift
    pub initial_census: Option<u32>,
}

pub struct Workflow<F, S, N, C> {
    forms: F,
    summaries: S,
    notifier: N,
    clock: C,
    wards: WardRegistry,
    policy: WorkflowPolicy,
}

impl<F, S, N, C> Workflow<F, S, N, C>
where
    F: FormStore,
    S: SummaryStore,
    N: NotificationSink,
    C: Clock,
{
    pub fn new(forms: F, summaries: S, notifier: N, clock: C, wards: WardRegistry) -> Self {
        Self {
            forms,
            summaries,
            notifier,
            clock,
            wards,
            policy: WorkflowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn wards(&self) -> &WardRegistry {
        &self.wards
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Loads a form by ID
    pub fn form(&self, id: &FormId) -> Result<ShiftForm> {
        self.forms
            .get_by_id(id)?
            .ok_or_else(|| WorkflowError::FormNotFound(id.to_string()))
    }

    /// Loads the live form for a key, if any
    pub fn live_form(&self, key: &FormKey) -> Result<Option<ShiftForm>> {
        Ok(self.forms.get(key)?)
    }

    pub fn forms(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftForm>> {
        Ok(self.forms.list(ward, from, to)?)
    }

    pub fn history(&self, id: &FormId) -> Result<Vec<ApprovalHistoryRecord>> {
        Ok(self.forms.history(id)?)
    }

    fn carry_over_for(&self, key: &FormKey, initial_census: Option<u32>) -> Result<CarryOver> {
        let predecessor = match key.predecessor() {
            Some(pred_key) => self.forms.get(&pred_key)?,
            None => None,
        };
        let carry = resolve_carry_over(key, predecessor.as_ref(), initial_census)?;
        debug!(key = %key, previous_census = carry.previous_census, source = ?carry.source, "resolved carry-over");
        Ok(carry)
    }

    fn recompute(&self, form: &mut ShiftForm) -> Result<()> {
        let carry = self.carry_over_for(&form.key(), form.initial_census)?;
        let outcome = form.recompute(carry);
        if let Some(warning) = outcome.warning {
            warn!(
                form_id = %form.id,
                key = %form.key(),
                previous_census = warning.previous_census,
                raw_census = warning.raw_census,
                "negative census clamped to zero"
            );
        }
        Ok(())
    }

    fn save(&self, form: &mut ShiftForm) -> Result<()> {
        form.revision += 1;
        if let Err(e) = self.forms.put(form) {
            form.revision -= 1;
            return Err(e.into());
        }
        Ok(())
    }

    /// Creates a draft for a key with no live form, or superseding a rejected one
    pub fn create_draft(&self, actor: &Actor, request: DraftRequest) -> Result<ShiftForm> {
        let DraftRequest {
            key,
            counters,
            initial_census,
        } = request;

        self.wards.require_active(&key.ward_id)?;

        let supersedes = match self.forms.get(&key)? {
            None => None,
            Some(existing) if existing.status == FormStatus::Rejected => Some(existing.id),
            Some(existing) => {
                return Err(WorkflowError::DuplicateForm {
                    key,
                    form: existing.id,
                    status: existing.status,
                })
            }
        };

        let carry = self.carry_over_for(&key, initial_census)?;
        let mut form = ShiftForm::new_draft(
            key,
            actor,
            carry,
            initial_census,
            counters,
            self.clock.now(),
        );
        if let Some(previous) = supersedes {
            form.supersede(previous);
        }
        if let Some(warning) = form.census_warning {
            warn!(key = %form.key(), raw_census = warning.raw_census, "negative census clamped to zero");
        }

        self.save(&mut form)?;
        info!(form_id = %form.id, key = %form.key(), actor = %actor.id, census = form.patient_census, supersedes = ?form.supersedes, "draft created");

        self.refresh(&form.ward_id, form.date)?;
        Ok(form)
    }

    /// Applies counter edits to a draft and recomputes its census
    pub fn update_draft(
        &self,
        id: &FormId,
        actor: &Actor,
        changes: &[(CounterField, i64)],
    ) -> Result<ShiftForm> {
        if changes.is_empty() {
            return Err(ValidationError::NoChanges.into());
        }
        let mut form = self.form(id)?;
        form.check_editable(actor)?;
        let now = self.clock.now();
        for (field, value) in changes {
            form.set_counter(*field, *value, actor, now)?;
        }
        self.recompute(&mut form)?;

        self.save(&mut form)?;
        info!(form_id = %form.id, actor = %actor.id, changes = changes.len(), census = form.patient_census, "draft updated");

        self.refresh(&form.ward_id, form.date)?;
        Ok(form)
    }

    /// DRAFT -> FINAL
    pub fn finalize(&self, id: &FormId, actor: &Actor) -> Result<ShiftForm> {
        let mut form = self.form(id)?;
        if form.status == FormStatus::Draft {
            // Pick up a predecessor that was approved since the last edit
            self.recompute(&mut form)?;
        }
        form.finalize(actor, self.clock.now())?;

        self.save(&mut form)?;
        info!(form_id = %form.id, key = %form.key(), actor = %actor.id, census = form.patient_census, "form finalized");

        self.refresh(&form.ward_id, form.date)?;
        Ok(form)
    }

    /// FINAL -> APPROVED, recording the decision
    ///
    /// Safe to retry: an approval whose history record never landed is
    /// completed from the decision stored on the form.
    pub fn approve(&self, id: &FormId, actor: &Actor) -> Result<ApprovalHistoryRecord> {
        let mut form = self.form(id)?;
        if let Some(record) = self.unrecorded_decision(&form, ApprovalAction::Approved, actor)? {
            info!(form_id = %form.id, actor = %actor.id, "completing interrupted approval");
            return self.complete_approval(&form, record);
        }

        let now = self.clock.now();
        if let Err(e) = form.approve(actor, now) {
            warn!(form_id = %id, actor = %actor.id, error = %e, "approval refused");
            return Err(e);
        }

        self.save(&mut form)?;
        info!(form_id = %form.id, key = %form.key(), actor = %actor.id, "form approved");
        let record = ApprovalHistoryRecord::approved(&form, actor, now);
        self.complete_approval(&form, record)
    }

    /// FINAL -> REJECTED, recording the decision and reason
    pub fn reject(
        &self,
        id: &FormId,
        actor: &Actor,
        reason: &str,
    ) -> Result<ApprovalHistoryRecord> {
        let reason = validate_reason(reason, self.policy.max_reason_len)?;
        let mut form = self.form(id)?;
        if let Some(record) = self.unrecorded_decision(&form, ApprovalAction::Rejected, actor)? {
            info!(form_id = %form.id, actor = %actor.id, "completing interrupted rejection");
            return self.complete_rejection(&form, record);
        }

        let now = self.clock.now();
        if let Err(e) = form.reject(actor, reason.clone(), now) {
            warn!(form_id = %id, actor = %actor.id, error = %e, "rejection refused");
            return Err(e);
        }

        self.save(&mut form)?;
        info!(form_id = %form.id, key = %form.key(), actor = %actor.id, "form rejected");
        let record = ApprovalHistoryRecord::rejected(&form, actor, reason, now);
        self.complete_rejection(&form, record)
    }

    /// A decision saved on the form whose history record is missing
    fn unrecorded_decision(
        &self,
        form: &ShiftForm,
        action: ApprovalAction,
        actor: &Actor,
    ) -> Result<Option<ApprovalHistoryRecord>> {
        let Some(record) = ApprovalHistoryRecord::recorded_on(form) else {
            return Ok(None);
        };
        if record.action != action || !actor.role.can_approve() {
            return Ok(None);
        }
        let history = self.forms.history(&form.id)?;
        if history.iter().any(|r| r.action == action) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    // The history record goes last: until it is written, a retry finishes the decision
    fn complete_approval(
        &self,
        form: &ShiftForm,
        record: ApprovalHistoryRecord,
    ) -> Result<ApprovalHistoryRecord> {
        let summary = self.refresh(&form.ward_id, form.date)?;
        self.forms.append_history(&record)?;

        self.notify(NotificationKind::FormApproved, form, self.recipients_for(form));
        if summary.is_final() {
            info!(ward = %summary.ward_id, date = %summary.date_string(), "daily summary complete");
            self.notify(
                NotificationKind::SummaryRequired,
                form,
                self.policy.approvers.clone(),
            );
        }
        Ok(record)
    }

    fn complete_rejection(
        &self,
        form: &ShiftForm,
        record: ApprovalHistoryRecord,
    ) -> Result<ApprovalHistoryRecord> {
        self.refresh(&form.ward_id, form.date)?;
        self.forms.append_history(&record)?;
        self.notify(NotificationKind::FormRejected, form, self.recipients_for(form));
        Ok(record)
    }

    /// Regenerates the daily summary for a ward and date
    ///
    /// A stored summary that is already final is returned untouched.
    pub fn refresh_summary(&self, ward: &WardId, date: NaiveDate) -> Result<DailySummary> {
        self.refresh(ward, date)
    }

    fn refresh(&self, ward: &WardId, date: NaiveDate) -> Result<DailySummary> {
        if let Some(existing) = self.summaries.get(ward, date)? {
            if existing.is_final() {
                debug!(ward = %ward, date = %existing.date_string(), "summary is final; not regenerating");
                return Ok(existing);
            }
        }

        let morning = self.forms.get(&FormKey::new(ward.clone(), date, Shift::Morning))?;
        let night = self.forms.get(&FormKey::new(ward.clone(), date, Shift::Night))?;
        let summary = DailySummary::aggregate(ward, date, morning.as_ref(), night.as_ref())?;
        self.summaries.put(&summary)?;
        debug!(ward = %ward, date = %summary.date_string(), complete = summary.all_forms_approved, "summary regenerated");
        Ok(summary)
    }

    /// Stored summaries in a range
    pub fn summaries(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        Ok(self.summaries.range(ward, from, to)?)
    }

    /// Analytics samples from daily summaries or from individual shift forms
    ///
    /// With `approved_only`, partial days (or non-approved shifts) are left out.
    pub fn trend_samples(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
        source: TrendSource,
        approved_only: bool,
    ) -> Result<Vec<TrendSample>> {
        let samples = match source {
            TrendSource::Summaries => self
                .summaries(ward, from, to)?
                .iter()
                .filter(|s| !approved_only || s.all_forms_approved)
                .map(TrendSample::from_summary)
                .collect(),
            TrendSource::Shifts => self
                .forms(ward, from, to)?
                .iter()
                .filter(|f| !approved_only || f.status == FormStatus::Approved)
                .map(TrendSample::from_shift)
                .collect(),
        };
        Ok(samples)
    }

    /// Trend analytics over stored summaries
    pub fn trends(
        &self,
        ward: Option<&WardId>,
        from: NaiveDate,
        to: NaiveDate,
        approved_only: bool,
    ) -> Result<TrendReport> {
        let samples =
            self.trend_samples(ward, from, to, TrendSource::Summaries, approved_only)?;
        let mut report = analyze(&samples);
        report.from = Some(from);
        report.to = Some(to);
        Ok(report)
    }

    fn recipients_for(&self, form: &ShiftForm) -> Vec<String> {
        let mut recipients = vec![form.created_by.id.clone()];
        for r in &self.policy.recipients {
            if !recipients.contains(r) {
                recipients.push(r.clone());
            }
        }
        recipients
    }

    fn notify(&self, kind: NotificationKind, form: &ShiftForm, recipient_ids: Vec<String>) {
        let notification = Notification {
            kind,
            ward_id: form.ward_id.clone(),
            date: form.date,
            form_id: form.id.clone(),
            recipient_ids,
        };
        debug!(kind = ?kind, form_id = %form.id, recipients = notification.recipient_ids.len(), "emitting notification");
        self.notifier.emit(&notification);
    }
}
