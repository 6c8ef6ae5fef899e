//! Multi-step workflow scenarios over the in-memory ports
//!
//! Each test walks a ward through several shifts the way a host would,
//! checking carry-over, summaries, notifications and analytics together.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use ward_census::domain::{
    parse_date, Actor, ApprovalAction, CarryOverSource, CensusCounters, CounterField, FormKey,
    FormStatus, Shift, ValidationError, Ward, WardId, WardRegistry, WorkflowError,
};
use ward_census::engine::memory::{ManualClock, MemoryFormStore, MemorySummaryStore, RecordingSink};
use ward_census::engine::{
    DraftRequest, NotificationKind, RetryPolicy, TrendSource, Workflow, WorkflowPolicy,
};

type MemoryWorkflow<'a> =
    Workflow<&'a MemoryFormStore, &'a MemorySummaryStore, &'a RecordingSink, &'a ManualClock>;

struct Ward6 {
    forms: MemoryFormStore,
    summaries: MemorySummaryStore,
    sink: RecordingSink,
    clock: ManualClock,
}

impl Ward6 {
    fn new() -> Self {
        Self {
            forms: MemoryFormStore::new(),
            summaries: MemorySummaryStore::new(),
            sink: RecordingSink::new(),
            clock: ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap()),
        }
    }

    fn workflow(&self) -> MemoryWorkflow<'_> {
        let wards = WardRegistry::new(vec![
            Ward::new(ward(), "Medicine 6"),
            Ward::new("WARD7".parse().unwrap(), "Surgery 7"),
        ]);
        Workflow::new(&self.forms, &self.summaries, &self.sink, &self.clock, wards).with_policy(
            WorkflowPolicy {
                recipients: vec!["charge-1".to_string()],
                approvers: vec!["a-1".to_string()],
                ..WorkflowPolicy::default()
            },
        )
    }
}

fn ward() -> WardId {
    "WARD6".parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn key(d: &str, shift: Shift) -> FormKey {
    FormKey::new(ward(), date(d), shift)
}

fn recorder() -> Actor {
    Actor::recorder("u-1", "Nurse Joy")
}

fn approver() -> Actor {
    Actor::approver("a-1", "Head Nurse")
}

fn counters(values: &[(CounterField, i64)]) -> CensusCounters {
    let mut c = CensusCounters::default();
    for field in CounterField::ALL
        .iter()
        .filter(|f| f.is_required() && !f.is_derived())
    {
        c.set(*field, 0).unwrap();
    }
    for (field, value) in values {
        c.set(*field, *value).unwrap();
    }
    c
}

fn draft(key: FormKey, values: &[(CounterField, i64)], initial: Option<u32>) -> DraftRequest {
    DraftRequest {
        key,
        counters: counters(values),
        initial_census: initial,
    }
}

/// Records, finalizes and approves one shift, returning the census
fn record_shift(
    wf: &MemoryWorkflow<'_>,
    key: FormKey,
    values: &[(CounterField, i64)],
    initial: Option<u32>,
) -> u32 {
    let form = wf.create_draft(&recorder(), draft(key, values, initial)).unwrap();
    wf.finalize(&form.id, &recorder()).unwrap();
    wf.approve(&form.id, &approver()).unwrap();
    wf.form(&form.id).unwrap().patient_census
}

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: StdDuration::ZERO,
        max_backoff: StdDuration::ZERO,
    }
}

// =============================================================================
// Multi-day census chain
// =============================================================================

#[test]
fn census_carries_across_two_days() {
    let h = Ward6::new();
    let wf = h.workflow();

    let m1 = record_shift(
        &wf,
        key("2024-01-15", Shift::Morning),
        &[(CounterField::NewAdmit, 2), (CounterField::Rn, 4)],
        Some(20),
    );
    assert_eq!(m1, 22);

    h.clock.advance(Duration::hours(12));
    let n1 = record_shift(
        &wf,
        key("2024-01-15", Shift::Night),
        &[(CounterField::Discharge, 3), (CounterField::Rn, 3)],
        None,
    );
    assert_eq!(n1, 19);

    h.clock.advance(Duration::hours(12));
    let morning = wf
        .create_draft(
            &recorder(),
            draft(
                key("2024-01-16", Shift::Morning),
                &[(CounterField::NewAdmit, 1), (CounterField::Rn, 2)],
                Some(99),
            ),
        )
        .unwrap();
    assert_eq!(morning.patient_census, 20);
    assert_eq!(morning.carry_over.previous_census, 19);
    assert!(matches!(
        morning.carry_over.source,
        CarryOverSource::PriorNight(_)
    ));
    wf.finalize(&morning.id, &recorder()).unwrap();
    wf.approve(&morning.id, &approver()).unwrap();

    h.clock.advance(Duration::hours(12));
    let n2 = record_shift(
        &wf,
        key("2024-01-16", Shift::Night),
        &[(CounterField::Dead, 1), (CounterField::Rn, 2)],
        None,
    );
    assert_eq!(n2, 19);

    let summaries = wf
        .summaries(Some(&ward()), date("2024-01-15"), date("2024-01-16"))
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.all_forms_approved));
    assert_eq!(summaries[0].daily_patient_census, 19);
    assert_eq!(summaries[0].daily_nurse_total, 7);
    assert_eq!(summaries[0].daily_new_admit_total, 2);
    assert_eq!(summaries[0].daily_discharge_total, 3);
    assert_eq!(summaries[1].daily_nurse_total, 4);
    assert_eq!(summaries[1].daily_dead_total, 1);
}

#[test]
fn notifications_follow_each_decision() {
    let h = Ward6::new();
    let wf = h.workflow();

    record_shift(&wf, key("2024-01-15", Shift::Morning), &[(CounterField::Rn, 2)], Some(10));
    record_shift(&wf, key("2024-01-15", Shift::Night), &[(CounterField::Rn, 2)], None);

    let kinds: Vec<NotificationKind> = h.sink.sent().iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::FormApproved,
            NotificationKind::FormApproved,
            NotificationKind::SummaryRequired,
        ]
    );

    let sent = h.sink.sent();
    assert_eq!(sent[0].recipient_ids, vec!["u-1", "charge-1"]);
    assert_eq!(sent[2].recipient_ids, vec!["a-1"]);
    assert_eq!(sent[2].date, date("2024-01-15"));
}

#[test]
fn wards_are_kept_apart() {
    let h = Ward6::new();
    let wf = h.workflow();
    let ward7: WardId = "WARD7".parse().unwrap();

    record_shift(&wf, key("2024-01-15", Shift::Morning), &[(CounterField::Rn, 2)], Some(10));
    let other = wf
        .create_draft(
            &recorder(),
            draft(
                FormKey::new(ward7.clone(), date("2024-01-15"), Shift::Night),
                &[],
                None,
            ),
        )
        .unwrap_err();
    assert!(matches!(
        other,
        WorkflowError::Validation(ValidationError::MissingCarryOver(_))
    ));

    let forms = wf
        .forms(Some(&ward7), date("2024-01-15"), date("2024-01-15"))
        .unwrap();
    assert!(forms.is_empty());
}

// =============================================================================
// Rejection and correction
// =============================================================================

#[test]
fn rejected_morning_is_corrected_by_a_new_draft() {
    let h = Ward6::new();
    let wf = h.workflow();

    let first = wf
        .create_draft(
            &recorder(),
            draft(key("2024-01-15", Shift::Morning), &[(CounterField::Rn, 1)], Some(12)),
        )
        .unwrap();
    wf.finalize(&first.id, &recorder()).unwrap();
    wf.reject(&first.id, &approver(), "  RN count is wrong  ").unwrap();

    // A rejected morning cannot seed the night
    let err = wf
        .create_draft(&recorder(), draft(key("2024-01-15", Shift::Night), &[], None))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::MissingCarryOver(_))
    ));

    h.clock.advance(Duration::minutes(30));
    let second = wf
        .create_draft(
            &recorder(),
            draft(key("2024-01-15", Shift::Morning), &[(CounterField::Rn, 3)], Some(12)),
        )
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.supersedes.as_ref(), Some(&first.id));

    let live = wf.live_form(&key("2024-01-15", Shift::Morning)).unwrap().unwrap();
    assert_eq!(live.id, second.id);

    let old = wf.form(&first.id).unwrap();
    assert_eq!(old.status, FormStatus::Rejected);
    assert_eq!(old.rejection_reason.as_deref(), Some("RN count is wrong"));

    let history = wf.history(&first.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, ApprovalAction::Rejected);
    assert_eq!(history[0].reason.as_deref(), Some("RN count is wrong"));

    wf.finalize(&second.id, &recorder()).unwrap();
    wf.approve(&second.id, &approver()).unwrap();
    assert!(wf.history(&second.id).unwrap()[0].action == ApprovalAction::Approved);

    let rejected = h
        .sink
        .sent()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::FormRejected)
        .count();
    assert_eq!(rejected, 1);
}

#[test]
fn reason_limit_comes_from_policy() {
    let h = Ward6::new();
    let wf = h.workflow().with_policy(WorkflowPolicy {
        max_reason_len: 10,
        ..WorkflowPolicy::default()
    });

    let form = wf
        .create_draft(&recorder(), draft(key("2024-01-15", Shift::Morning), &[], Some(5)))
        .unwrap();
    wf.finalize(&form.id, &recorder()).unwrap();

    let err = wf
        .reject(&form.id, &approver(), "this reason is far too long")
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::ReasonTooLong { max: 10, .. })
    ));
    assert_eq!(wf.form(&form.id).unwrap().status, FormStatus::Final);
}

#[test]
fn recorder_cannot_decide() {
    let h = Ward6::new();
    let wf = h.workflow();
    let form = wf
        .create_draft(&recorder(), draft(key("2024-01-15", Shift::Morning), &[], Some(5)))
        .unwrap();
    wf.finalize(&form.id, &recorder()).unwrap();

    assert!(matches!(
        wf.approve(&form.id, &recorder()).unwrap_err(),
        WorkflowError::Unauthorized { .. }
    ));
    assert!(matches!(
        wf.reject(&form.id, &recorder(), "no").unwrap_err(),
        WorkflowError::Unauthorized { .. }
    ));
    assert!(wf.history(&form.id).unwrap().is_empty());
    assert!(h.sink.sent().is_empty());
}

// =============================================================================
// Transient storage failures
// =============================================================================

#[test]
fn retry_rides_out_a_short_outage() {
    let h = Ward6::new();
    let wf = h.workflow();

    h.forms.fail_next(2);
    let form = quick_retry(3)
        .run(|| {
            wf.create_draft(
                &recorder(),
                draft(key("2024-01-15", Shift::Morning), &[], Some(8)),
            )
        })
        .unwrap();
    assert_eq!(form.patient_census, 8);
    assert_eq!(h.forms.all().len(), 1);
}

#[test]
fn retry_gives_up_after_max_attempts() {
    let h = Ward6::new();
    let wf = h.workflow();

    h.forms.fail_next(5);
    let err = quick_retry(3)
        .run(|| {
            wf.create_draft(
                &recorder(),
                draft(key("2024-01-15", Shift::Morning), &[], Some(8)),
            )
        })
        .unwrap_err();
    assert!(err.is_transient());
    assert!(h.forms.all().is_empty());
}

#[test]
fn validation_errors_are_not_retried() {
    let h = Ward6::new();
    let wf = h.workflow();

    let mut calls = 0;
    let err = quick_retry(5)
        .run(|| {
            calls += 1;
            wf.create_draft(&recorder(), draft(key("2024-01-15", Shift::Morning), &[], None))
        })
        .unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(calls, 1);
}

// =============================================================================
// Analytics
// =============================================================================

fn two_days(h: &Ward6) {
    let wf = h.workflow();
    record_shift(&wf, key("2024-01-15", Shift::Morning), &[(CounterField::Rn, 2)], Some(18));
    record_shift(&wf, key("2024-01-15", Shift::Night), &[(CounterField::Rn, 1)], None);
    record_shift(
        &wf,
        key("2024-01-16", Shift::Morning),
        &[(CounterField::Rn, 1), (CounterField::NewAdmit, 2)],
        None,
    );
    // Second night left in draft
    wf.create_draft(
        &recorder(),
        draft(key("2024-01-16", Shift::Night), &[(CounterField::Rn, 1)], None),
    )
    .unwrap();
}

#[test]
fn trends_use_only_complete_days_by_default() {
    let h = Ward6::new();
    two_days(&h);
    let wf = h.workflow();

    let report = wf
        .trends(Some(&ward()), date("2024-01-15"), date("2024-01-16"), true)
        .unwrap();
    assert_eq!(report.statistics.records, 1);
    assert_eq!(report.statistics.avg_ratio, Some(6.0));
    assert_eq!(report.from, Some(date("2024-01-15")));

    let partial = wf
        .trends(Some(&ward()), date("2024-01-15"), date("2024-01-16"), false)
        .unwrap();
    assert_eq!(partial.statistics.records, 2);
    assert_eq!(partial.statistics.max_census, 20);
}

#[test]
fn shift_samples_count_each_form() {
    let h = Ward6::new();
    two_days(&h);
    let wf = h.workflow();

    let approved = wf
        .trend_samples(
            Some(&ward()),
            date("2024-01-15"),
            date("2024-01-16"),
            TrendSource::Shifts,
            true,
        )
        .unwrap();
    assert_eq!(approved.len(), 3);
    // Morning with 18 patients and 2 nurses
    assert_eq!(approved[0].ratio, Some(9.0));

    let all = wf
        .trend_samples(
            Some(&ward()),
            date("2024-01-15"),
            date("2024-01-16"),
            TrendSource::Shifts,
            false,
        )
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn empty_range_produces_explained_report() {
    let h = Ward6::new();
    let wf = h.workflow();

    let report = wf
        .trends(None, date("2024-03-01"), date("2024-03-31"), true)
        .unwrap();
    assert_eq!(report.statistics.records, 0);
    assert_eq!(report.statistics.avg_ratio, None);
    assert!(!report.recommendations.is_empty());
    assert!(report.trends.census.explanation.contains("insufficient"));
}
