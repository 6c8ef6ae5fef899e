//! Daily summary aggregation
//!
//! Merges a ward's morning and night forms for one date into a 24-hour
//! summary. Aggregation is a pure function of the two forms: the same inputs
//! always produce an identical summary.
//!
//! A missing or unapproved shift never fails aggregation. It contributes
//! zeros, leaves its ratio undefined and marks the summary incomplete.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ValidationError;
use super::form::{ratio, FormStatus, ShiftForm};
use super::id::{FormId, FormKey, Shift, WardId, DATE_FORMAT};

/// One shift's contribution to a daily summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftSubtotal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FormStatus>,
    pub patient_census: u32,
    pub nurse_manager: u32,
    pub rn: u32,
    pub pn: u32,
    pub wc: u32,
    pub nurse_total: u32,
    pub new_admit: u32,
    pub transfer_in: u32,
    pub refer_in: u32,
    pub transfer_out: u32,
    pub refer_out: u32,
    pub discharge: u32,
    pub dead: u32,
    pub available: u32,
    pub unavailable: u32,
    pub planned_discharge: u32,
    /// Patients per nurse; None when no nurses or no form
    pub nurse_ratio: Option<f64>,
}

impl ShiftSubtotal {
    fn from_form(form: &ShiftForm) -> Self {
        let c = &form.counters;
        let v = |x: Option<u32>| x.unwrap_or(0);
        Self {
            form_id: Some(form.id.clone()),
            status: Some(form.status),
            patient_census: form.patient_census,
            nurse_manager: v(c.nurse_manager),
            rn: v(c.rn),
            pn: v(c.pn),
            wc: v(c.wc),
            nurse_total: form.nurse_total(),
            new_admit: v(c.new_admit),
            transfer_in: v(c.transfer_in),
            refer_in: v(c.refer_in),
            transfer_out: v(c.transfer_out),
            refer_out: v(c.refer_out),
            discharge: v(c.discharge),
            dead: v(c.dead),
            available: v(c.available),
            unavailable: v(c.unavailable),
            planned_discharge: v(c.planned_discharge),
            nurse_ratio: form.nurse_ratio(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.form_id.is_some()
    }

    pub fn is_approved(&self) -> bool {
        self.status == Some(FormStatus::Approved)
    }
}

/// Why a summary is not yet a historical fact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationIncomplete {
    /// Shifts with no form at all
    pub missing: Vec<Shift>,
    /// Shifts whose form is present but not APPROVED
    pub unapproved: Vec<Shift>,
}

impl fmt::Display for AggregationIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            let shifts: Vec<_> = self.missing.iter().map(|s| s.as_str()).collect();
            parts.push(format!("awaiting {} shift", shifts.join(" and ")));
        }
        if !self.unapproved.is_empty() {
            let shifts: Vec<_> = self.unapproved.iter().map(|s| s.as_str()).collect();
            parts.push(format!("awaiting approval of {} shift", shifts.join(" and ")));
        }
        f.write_str(&parts.join("; "))
    }
}

/// 24-hour summary for one ward and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub morning: ShiftSubtotal,
    pub night: ShiftSubtotal,

    /// End-of-day census: night when present, otherwise morning
    pub daily_patient_census: u32,
    pub daily_nurse_total: u32,
    pub daily_new_admit_total: u32,
    pub daily_transfer_in_total: u32,
    pub daily_refer_in_total: u32,
    pub daily_transfer_out_total: u32,
    pub daily_refer_out_total: u32,
    pub daily_discharge_total: u32,
    pub daily_dead_total: u32,

    /// Bed figures follow the same night-over-morning precedence as census
    pub available_beds: u32,
    pub unavailable_beds: u32,
    pub planned_discharge: u32,

    pub daily_nurse_ratio: Option<f64>,

    pub all_forms_approved: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<AggregationIncomplete>,
}

impl DailySummary {
    /// Merges the two shifts of a date into a summary
    ///
    /// Either form may be absent. A form whose key does not match its slot is
    /// a caller bug and is reported instead of being silently dropped.
    pub fn aggregate(
        ward_id: &WardId,
        date: NaiveDate,
        morning: Option<&ShiftForm>,
        night: Option<&ShiftForm>,
    ) -> Result<Self, ValidationError> {
        for (slot, form) in [(Shift::Morning, morning), (Shift::Night, night)] {
            if let Some(form) = form {
                let expected = FormKey::new(ward_id.clone(), date, slot);
                if form.key() != expected {
                    return Err(ValidationError::KeyMismatch {
                        form: form.id.clone(),
                        expected: expected.to_string(),
                        actual: form.key(),
                    });
                }
            }
        }

        let m = morning.map(ShiftSubtotal::from_form).unwrap_or_default();
        let n = night.map(ShiftSubtotal::from_form).unwrap_or_default();

        let end_of_day = if n.is_present() { &n } else { &m };
        let daily_patient_census = end_of_day.patient_census;
        let available_beds = end_of_day.available;
        let unavailable_beds = end_of_day.unavailable;
        let planned_discharge = end_of_day.planned_discharge;

        let daily_nurse_total = m.nurse_total.saturating_add(n.nurse_total);

        let mut incomplete = AggregationIncomplete::default();
        for (shift, sub) in [(Shift::Morning, &m), (Shift::Night, &n)] {
            if !sub.is_present() {
                incomplete.missing.push(shift);
            } else if !sub.is_approved() {
                incomplete.unapproved.push(shift);
            }
        }
        let all_forms_approved = incomplete.missing.is_empty() && incomplete.unapproved.is_empty();

        Ok(Self {
            ward_id: ward_id.clone(),
            date,
            daily_patient_census,
            daily_nurse_total,
            daily_new_admit_total: m.new_admit.saturating_add(n.new_admit),
            daily_transfer_in_total: m.transfer_in.saturating_add(n.transfer_in),
            daily_refer_in_total: m.refer_in.saturating_add(n.refer_in),
            daily_transfer_out_total: m.transfer_out.saturating_add(n.transfer_out),
            daily_refer_out_total: m.refer_out.saturating_add(n.refer_out),
            daily_discharge_total: m.discharge.saturating_add(n.discharge),
            daily_dead_total: m.dead.saturating_add(n.dead),
            available_beds,
            unavailable_beds,
            planned_discharge,
            daily_nurse_ratio: ratio(daily_patient_census, daily_nurse_total),
            all_forms_approved,
            incomplete: (!all_forms_approved).then_some(incomplete),
            morning: m,
            night: n,
        })
    }

    pub fn morning_nurse_total(&self) -> u32 {
        self.morning.nurse_total
    }

    pub fn night_nurse_total(&self) -> u32 {
        self.night.nurse_total
    }

    /// Complete summaries are historical fact and are never regenerated
    pub fn is_final(&self) -> bool {
        self.all_forms_approved
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}
