//! Staffing trend analytics
//!
//! Aggregates daily summaries (or raw shift reports) over a date range into
//! statistics, severity buckets, recommendations and first-half versus
//! second-half trends. Sparse input never fails: empty sets produce zeroed
//! statistics and stable trends with an explanation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::form::ShiftForm;
use super::id::WardId;
use super::summary::DailySummary;

/// Ratio above which staffing is critical
pub const CRITICAL_RATIO: f64 = 8.0;
/// Ratio above which staffing needs attention
pub const WARNING_RATIO: f64 = 6.0;
/// Ratio above which staffing is no longer optimal
pub const ACCEPTABLE_RATIO: f64 = 4.0;
/// Share of critical days that escalates to a policy review
pub const CRITICAL_DAY_SHARE: f64 = 0.30;
/// Changes smaller than this percentage are stable
pub const STABLE_CHANGE_PCT: f64 = 5.0;

/// Severity of a nurse:patient ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Optimal,
    Acceptable,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Optimal => "optimal",
            Severity::Acceptable => "acceptable",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a ratio; thresholds are strict and checked high to low
pub fn classify_ratio(ratio: f64) -> Severity {
    if ratio > CRITICAL_RATIO {
        Severity::Critical
    } else if ratio > WARNING_RATIO {
        Severity::Warning
    } else if ratio > ACCEPTABLE_RATIO {
        Severity::Acceptable
    } else {
        Severity::Optimal
    }
}

/// One data point: a day (from a summary) or a single shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub census: u32,
    pub rn: u32,
    pub pn: u32,
    /// Nursing assistants, recorded in the form's `wc` counter
    pub na: u32,
    pub nurse_total: u32,
    pub ratio: Option<f64>,
}

impl TrendSample {
    pub fn from_summary(summary: &DailySummary) -> Self {
        Self {
            ward_id: summary.ward_id.clone(),
            date: summary.date,
            census: summary.daily_patient_census,
            rn: summary.morning.rn.saturating_add(summary.night.rn),
            pn: summary.morning.pn.saturating_add(summary.night.pn),
            na: summary.morning.wc.saturating_add(summary.night.wc),
            nurse_total: summary.daily_nurse_total,
            ratio: summary.daily_nurse_ratio,
        }
    }

    pub fn from_shift(form: &ShiftForm) -> Self {
        let c = &form.counters;
        Self {
            ward_id: form.ward_id.clone(),
            date: form.date,
            census: form.patient_census,
            rn: c.rn.unwrap_or(0),
            pn: c.pn.unwrap_or(0),
            na: c.wc.unwrap_or(0),
            nurse_total: form.nurse_total(),
            ratio: form.nurse_ratio(),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.ratio.map(classify_ratio)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub optimal: usize,
    pub acceptable: usize,
    pub warning: usize,
    pub critical: usize,
    /// Records with no nurses, whose ratio is undefined
    pub unrated: usize,
}

impl SeverityCounts {
    pub fn rated(&self) -> usize {
        self.optimal + self.acceptable + self.warning + self.critical
    }

    fn add(&mut self, severity: Option<Severity>) {
        match severity {
            Some(Severity::Optimal) => self.optimal += 1,
            Some(Severity::Acceptable) => self.acceptable += 1,
            Some(Severity::Warning) => self.warning += 1,
            Some(Severity::Critical) => self.critical += 1,
            None => self.unrated += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStatistics {
    pub records: usize,
    pub avg_census: f64,
    pub min_census: u32,
    pub max_census: u32,
    pub avg_rn: f64,
    pub avg_pn: f64,
    pub avg_na: f64,
    pub avg_nurse_total: f64,
    /// Mean of the defined ratios
    pub avg_ratio: Option<f64>,
    pub severity: SeverityCounts,
    /// Critical records as a share of all records, 0-100
    pub critical_pct: f64,
}

impl TrendStatistics {
    pub fn compute(samples: &[TrendSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut severity = SeverityCounts::default();
        for s in samples {
            severity.add(s.severity());
        }

        let critical_pct = severity.critical as f64 / samples.len() as f64 * 100.0;

        Self {
            records: samples.len(),
            avg_census: mean(samples.iter().map(|s| f64::from(s.census))).unwrap_or(0.0),
            min_census: samples.iter().map(|s| s.census).min().unwrap_or(0),
            max_census: samples.iter().map(|s| s.census).max().unwrap_or(0),
            avg_rn: mean(samples.iter().map(|s| f64::from(s.rn))).unwrap_or(0.0),
            avg_pn: mean(samples.iter().map(|s| f64::from(s.pn))).unwrap_or(0.0),
            avg_na: mean(samples.iter().map(|s| f64::from(s.na))).unwrap_or(0.0),
            avg_nurse_total: mean(samples.iter().map(|s| f64::from(s.nurse_total)))
                .unwrap_or(0.0),
            avg_ratio: mean(samples.iter().filter_map(|s| s.ratio)),
            severity,
            critical_pct,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    Critical,
    Warning,
    Info,
}

impl RecommendationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationLevel::Critical => "CRITICAL",
            RecommendationLevel::Warning => "WARNING",
            RecommendationLevel::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub level: RecommendationLevel,
    pub title: String,
    pub message: String,
}

impl Recommendation {
    fn new(level: RecommendationLevel, title: &str, message: String) -> Self {
        Self {
            level,
            title: title.to_string(),
            message,
        }
    }
}

/// Builds staffing recommendations; the result is never empty
pub fn recommend(stats: &TrendStatistics) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if let Some(avg) = stats.avg_ratio {
        if avg > CRITICAL_RATIO {
            recs.push(Recommendation::new(
                RecommendationLevel::Critical,
                "Add nursing staff immediately",
                format!(
                    "Average ratio is {:.1} patients per nurse, above the critical limit of {}",
                    avg, CRITICAL_RATIO
                ),
            ));
        } else if avg > WARNING_RATIO {
            recs.push(Recommendation::new(
                RecommendationLevel::Warning,
                "Review staffing levels",
                format!(
                    "Average ratio is {:.1} patients per nurse, above the target of {}",
                    avg, WARNING_RATIO
                ),
            ));
        }
    }

    if stats.severity.critical > 0 {
        let share = stats.critical_pct / 100.0;
        if share > CRITICAL_DAY_SHARE {
            recs.push(Recommendation::new(
                RecommendationLevel::Critical,
                "Review staffing policy",
                format!(
                    "{:.0}% of records were critical; recurring shortfalls need a policy review",
                    stats.critical_pct
                ),
            ));
        } else {
            recs.push(Recommendation::new(
                RecommendationLevel::Warning,
                "Investigate critical shifts",
                format!(
                    "{} record(s) exceeded a ratio of {}; check what caused them",
                    stats.severity.critical, CRITICAL_RATIO
                ),
            ));
        }
    }

    if recs.is_empty() {
        let message = match stats.avg_ratio {
            Some(avg) => format!("Average ratio of {:.1} patients per nurse is acceptable", avg),
            None => "No staffed records in range; ratio could not be assessed".to_string(),
        };
        recs.push(Recommendation::new(
            RecommendationLevel::Info,
            "Staffing ratio acceptable",
            message,
        ));
    }

    recs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Classifies a percentage change
pub fn classify_change(change_pct: f64) -> TrendDirection {
    if change_pct.abs() < STABLE_CHANGE_PCT {
        TrendDirection::Stable
    } else if change_pct > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    }
}

/// Period-over-period trend of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    pub change_pct: Option<f64>,
    pub first_mean: Option<f64>,
    pub second_mean: Option<f64>,
    pub explanation: String,
}

impl MetricTrend {
    fn stable(explanation: &str, first_mean: Option<f64>, second_mean: Option<f64>) -> Self {
        Self {
            direction: TrendDirection::Stable,
            change_pct: None,
            first_mean,
            second_mean,
            explanation: explanation.to_string(),
        }
    }

    fn between(first: Option<f64>, second: Option<f64>) -> Self {
        let (first_mean, second_mean) = match (first, second) {
            (Some(a), Some(b)) => (a, b),
            _ => return Self::stable("insufficient data in one half of the range", first, second),
        };
        if first_mean == 0.0 {
            return Self::stable("baseline is zero; change is undefined", first, second);
        }

        let change_pct = (second_mean - first_mean) / first_mean * 100.0;
        let direction = classify_change(change_pct);
        Self {
            direction,
            change_pct: Some(change_pct),
            first_mean: first,
            second_mean: second,
            explanation: format!(
                "{:+.1}% from {:.2} to {:.2}",
                change_pct, first_mean, second_mean
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSet {
    pub census: MetricTrend,
    pub nurses: MetricTrend,
    pub ratio: MetricTrend,
}

/// Splits the chronological samples at the midpoint and compares halves
pub fn detect_trends(samples: &[TrendSample]) -> TrendSet {
    if samples.len() < 2 {
        let insufficient =
            MetricTrend::stable("insufficient data: fewer than 2 records", None, None);
        return TrendSet {
            census: insufficient.clone(),
            nurses: insufficient.clone(),
            ratio: insufficient,
        };
    }

    let mut sorted: Vec<&TrendSample> = samples.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ward_id.cmp(&b.ward_id)));
    let (first, second) = sorted.split_at(sorted.len() / 2);

    let census = |half: &[&TrendSample]| mean(half.iter().map(|s| f64::from(s.census)));
    let nurses = |half: &[&TrendSample]| mean(half.iter().map(|s| f64::from(s.nurse_total)));
    let ratio = |half: &[&TrendSample]| mean(half.iter().filter_map(|s| s.ratio));

    TrendSet {
        census: MetricTrend::between(census(first), census(second)),
        nurses: MetricTrend::between(nurses(first), nurses(second)),
        ratio: MetricTrend::between(ratio(first), ratio(second)),
    }
}

/// Full analytics over a set of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    pub statistics: TrendStatistics,
    pub recommendations: Vec<Recommendation>,
    pub trends: TrendSet,
}

/// Analyzes samples from one or more wards as a single set
pub fn analyze(samples: &[TrendSample]) -> TrendReport {
    let statistics = TrendStatistics::compute(samples);
    let recommendations = recommend(&statistics);
    TrendReport {
        from: samples.iter().map(|s| s.date).min(),
        to: samples.iter().map(|s| s.date).max(),
        statistics,
        recommendations,
        trends: detect_trends(samples),
    }
}

/// Analyzes each ward separately
pub fn analyze_by_ward(samples: &[TrendSample]) -> BTreeMap<WardId, TrendReport> {
    let mut by_ward: BTreeMap<WardId, Vec<TrendSample>> = BTreeMap::new();
    for s in samples {
        by_ward.entry(s.ward_id.clone()).or_default().push(s.clone());
    }
    by_ward
        .into_iter()
        .map(|(ward, samples)| (ward, analyze(&samples)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::parse_date;

    fn sample(day: u32, census: u32, nurses: u32) -> TrendSample {
        TrendSample {
            ward_id: "WARD6".parse().unwrap(),
            date: parse_date(&format!("2024-01-{:02}", day)).unwrap(),
            census,
            rn: nurses,
            pn: 0,
            na: 0,
            nurse_total: nurses,
            ratio: crate::domain::form::ratio(census, nurses),
        }
    }

    #[test]
    fn ratio_boundaries() {
        assert_eq!(classify_ratio(8.0), Severity::Warning);
        assert_eq!(classify_ratio(8.0001), Severity::Critical);
        assert_eq!(classify_ratio(6.0), Severity::Acceptable);
        assert_eq!(classify_ratio(6.0001), Severity::Warning);
        assert_eq!(classify_ratio(4.0), Severity::Optimal);
        assert_eq!(classify_ratio(4.0001), Severity::Acceptable);
        assert_eq!(classify_ratio(0.0), Severity::Optimal);
    }

    #[test]
    fn change_boundaries() {
        assert_eq!(classify_change(4.99), TrendDirection::Stable);
        assert_eq!(classify_change(-4.99), TrendDirection::Stable);
        assert_eq!(classify_change(5.0), TrendDirection::Increasing);
        assert_eq!(classify_change(-5.0), TrendDirection::Decreasing);
    }

    #[test]
    fn two_point_series_is_increasing() {
        let trends = detect_trends(&[sample(1, 10, 2), sample(2, 12, 2)]);

        assert_eq!(trends.ratio.first_mean, Some(5.0));
        assert_eq!(trends.ratio.second_mean, Some(6.0));
        assert_eq!(trends.ratio.direction, TrendDirection::Increasing);
        let pct = trends.ratio.change_pct.unwrap();
        assert!((pct - 20.0).abs() < 1e-9);

        assert_eq!(trends.nurses.direction, TrendDirection::Stable);
        assert_eq!(trends.census.direction, TrendDirection::Increasing);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = detect_trends(&[sample(1, 10, 2), sample(2, 12, 2)]);
        let b = detect_trends(&[sample(2, 12, 2), sample(1, 10, 2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn single_record_is_stable_with_explanation() {
        let trends = detect_trends(&[sample(1, 10, 2)]);
        assert_eq!(trends.census.direction, TrendDirection::Stable);
        assert!(trends.census.change_pct.is_none());
        assert!(trends.census.explanation.contains("insufficient data"));
    }

    #[test]
    fn undefined_ratios_are_ignored_in_trend() {
        let trends = detect_trends(&[sample(1, 10, 0), sample(2, 10, 2)]);
        assert_eq!(trends.ratio.direction, TrendDirection::Stable);
        assert!(trends.ratio.change_pct.is_none());
    }

    #[test]
    fn statistics_over_samples() {
        let samples = [sample(1, 10, 2), sample(2, 20, 2), sample(3, 30, 0)];
        let stats = TrendStatistics::compute(&samples);

        assert_eq!(stats.records, 3);
        assert_eq!(stats.avg_census, 20.0);
        assert_eq!(stats.min_census, 10);
        assert_eq!(stats.max_census, 30);
        assert_eq!(stats.avg_ratio, Some(7.5));
        assert_eq!(stats.severity.acceptable, 1);
        assert_eq!(stats.severity.critical, 1);
        assert_eq!(stats.severity.unrated, 1);
        assert!((stats.critical_pct - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unrated_days_count_toward_critical_share() {
        let samples = [
            sample(1, 20, 2),
            sample(2, 15, 0),
            sample(3, 15, 0),
            sample(4, 15, 0),
        ];
        let report = analyze(&samples);

        assert_eq!(report.statistics.critical_pct, 25.0);
        let titles: Vec<_> = report.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"Investigate critical shifts"));
        assert!(!titles.contains(&"Review staffing policy"));
    }

    #[test]
    fn empty_input_is_degenerate_not_an_error() {
        let report = analyze(&[]);
        assert_eq!(report.statistics.records, 0);
        assert_eq!(report.statistics.avg_ratio, None);
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].level, RecommendationLevel::Info);
        assert_eq!(report.trends.ratio.direction, TrendDirection::Stable);
    }

    #[test]
    fn critical_average_with_many_critical_days() {
        let samples = [sample(1, 20, 2), sample(2, 18, 2), sample(3, 12, 2)];
        let recs = analyze(&samples).recommendations;

        assert_eq!(recs[0].level, RecommendationLevel::Critical);
        assert_eq!(recs[0].title, "Add nursing staff immediately");
        assert_eq!(recs[1].title, "Review staffing policy");
    }

    #[test]
    fn occasional_critical_day_asks_for_investigation() {
        let mut samples: Vec<_> = (1..=9).map(|d| sample(d, 8, 2)).collect();
        samples.push(sample(10, 20, 2));
        let recs = analyze(&samples).recommendations;

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Investigate critical shifts");
    }

    #[test]
    fn warning_average_without_critical_days() {
        let recs = analyze(&[sample(1, 14, 2), sample(2, 14, 2)]).recommendations;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].level, RecommendationLevel::Warning);
    }

    #[test]
    fn healthy_ratio_gets_single_info() {
        let recs = analyze(&[sample(1, 8, 2), sample(2, 9, 2)]).recommendations;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].level, RecommendationLevel::Info);
    }

    #[test]
    fn per_ward_analysis_splits_wards() {
        let mut other = sample(1, 30, 2);
        other.ward_id = "ICU".parse().unwrap();
        let reports = analyze_by_ward(&[sample(1, 10, 2), sample(2, 12, 2), other]);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[&"ICU".parse::<WardId>().unwrap()].statistics.records, 1);
        assert_eq!(reports[&"WARD6".parse::<WardId>().unwrap()].statistics.records, 2);
    }
}
