use chrono::NaiveDate;
use proptest::prelude::*;
use ward_census::domain::trend::analyze;
use ward_census::domain::{
    classify_ratio, compute_census, ratio, settle, Movement, TrendSample, WardId,
};

fn movement() -> impl Strategy<Value = Movement> {
    (
        0u32..50,
        0u32..50,
        0u32..50,
        0u32..50,
        0u32..50,
        0u32..50,
        0u32..50,
    )
        .prop_map(
            |(new_admit, transfer_in, refer_in, transfer_out, refer_out, discharge, dead)| {
                Movement {
                    new_admit,
                    transfer_in,
                    refer_in,
                    transfer_out,
                    refer_out,
                    discharge,
                    dead,
                }
            },
        )
}

fn sample() -> impl Strategy<Value = TrendSample> {
    (0u32..60, 0u32..10, 0u32..10, 0u32..10, 0u32..28).prop_map(|(census, rn, pn, na, day)| {
        let nurse_total = rn + pn + na;
        TrendSample {
            ward_id: "WARD6".parse::<WardId>().unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 2, 1 + day).unwrap(),
            census,
            rn,
            pn,
            na,
            nurse_total,
            ratio: ratio(census, nurse_total),
        }
    })
}

proptest! {
    #[test]
    fn census_is_previous_plus_inflow_minus_outflow(previous in 0u32..500, m in movement()) {
        let inflow = i64::from(m.new_admit) + i64::from(m.transfer_in) + i64::from(m.refer_in);
        let outflow = i64::from(m.transfer_out)
            + i64::from(m.refer_out)
            + i64::from(m.discharge)
            + i64::from(m.dead);
        prop_assert_eq!(m.apply(previous), i64::from(previous) + inflow - outflow);
    }

    #[test]
    fn no_movement_keeps_previous(previous in 0u32..10_000) {
        prop_assert_eq!(compute_census(previous, 0, 0, 0, 0, 0, 0, 0), i64::from(previous));
    }

    #[test]
    fn settle_warns_exactly_when_raw_is_negative(previous in 0u32..100, m in movement()) {
        let outcome = settle(previous, &m);
        prop_assert_eq!(outcome.raw, m.apply(previous));
        prop_assert_eq!(outcome.warning.is_some(), outcome.raw < 0);
        prop_assert_eq!(i64::from(outcome.census), outcome.raw.max(0));
        if let Some(warning) = outcome.warning {
            prop_assert_eq!(warning.previous_census, previous);
            prop_assert_eq!(warning.raw_census, outcome.raw);
        }
    }

    #[test]
    fn classification_is_monotonic(a in 0.0f64..20.0, b in 0.0f64..20.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify_ratio(low) <= classify_ratio(high));
    }

    #[test]
    fn ratio_is_undefined_only_without_nurses(patients in 0u32..100, nurses in 0u32..20) {
        match ratio(patients, nurses) {
            None => prop_assert_eq!(nurses, 0),
            Some(r) => {
                prop_assert!(nurses > 0);
                prop_assert!((r - f64::from(patients) / f64::from(nurses)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn statistics_stay_in_bounds(samples in prop::collection::vec(sample(), 0..40)) {
        let report = analyze(&samples);
        let stats = &report.statistics;

        prop_assert_eq!(stats.records, samples.len());
        prop_assert_eq!(stats.severity.rated() + stats.severity.unrated, samples.len());
        prop_assert!(stats.critical_pct >= 0.0 && stats.critical_pct <= 100.0);
        prop_assert!(stats.min_census <= stats.max_census);
        prop_assert!(!report.recommendations.is_empty());
    }
}
