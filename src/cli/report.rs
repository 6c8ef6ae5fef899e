//! Daily summary and trend commands

use anyhow::Result;
use clap::{Subcommand, ValueEnum};

use super::output::Output;
use super::{date_range, Session};
use crate::domain::trend::{analyze, analyze_by_ward, MetricTrend, TrendReport};
use crate::domain::{parse_date, DailySummary, ShiftSubtotal, WardId};
use crate::engine::TrendSource;

#[derive(Subcommand)]
pub enum SummaryCommands {
    /// Recompute and show one ward's day
    Show {
        /// Ward ID
        ward: String,

        /// Date (YYYY-MM-DD)
        date: String,
    },

    /// List stored daily summaries
    List {
        /// Filter by ward
        #[arg(long)]
        ward: Option<String>,

        /// First date (default: 30 days before --to)
        #[arg(long)]
        from: Option<String>,

        /// Last date (default: today)
        #[arg(long)]
        to: Option<String>,
    },
}

/// What each trend data point represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SampleSource {
    /// One point per ward-day
    #[default]
    Days,
    /// One point per shift form
    Shifts,
}

impl From<SampleSource> for TrendSource {
    fn from(source: SampleSource) -> Self {
        match source {
            SampleSource::Days => TrendSource::Summaries,
            SampleSource::Shifts => TrendSource::Shifts,
        }
    }
}

pub fn summary(cmd: SummaryCommands, session: &Session, output: &Output) -> Result<()> {
    match cmd {
        SummaryCommands::Show { ward, date } => show_summary(session, output, &ward, &date),
        SummaryCommands::List { ward, from, to } => {
            list_summaries(session, output, ward.as_deref(), from.as_deref(), to.as_deref())
        }
    }
}

fn show_summary(session: &Session, output: &Output, ward: &str, date: &str) -> Result<()> {
    let ward: WardId = ward.parse()?;
    let date = parse_date(date)?;

    let workflow = session.workflow();
    let summary = session.retry(|| workflow.refresh_summary(&ward, date))?;

    if output.is_json() {
        output.data(&summary);
    } else {
        print_summary(session, &summary);
    }
    Ok(())
}

fn list_summaries(
    session: &Session,
    output: &Output,
    ward: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let ward: Option<WardId> = ward.map(str::parse).transpose()?;
    let (from, to) = date_range(from, to)?;

    let summaries = session.retry(|| session.workflow().summaries(ward.as_ref(), from, to))?;

    if output.is_json() {
        output.data(&summaries);
    } else if summaries.is_empty() {
        println!("No summaries between {} and {}", from, to);
    } else {
        println!(
            "{:<11} {:<8} {:>6} {:>6} {:>6} {:>6} {:>6}  STATUS",
            "DATE", "WARD", "CENSUS", "NURSES", "RATIO", "IN", "OUT"
        );
        println!("{}", "-".repeat(72));
        for s in &summaries {
            let inflow = u64::from(s.daily_new_admit_total)
                + u64::from(s.daily_transfer_in_total)
                + u64::from(s.daily_refer_in_total);
            let outflow = u64::from(s.daily_transfer_out_total)
                + u64::from(s.daily_refer_out_total)
                + u64::from(s.daily_discharge_total)
                + u64::from(s.daily_dead_total);
            let status = match &s.incomplete {
                None => "complete".to_string(),
                Some(incomplete) => incomplete.to_string(),
            };
            println!(
                "{:<11} {:<8} {:>6} {:>6} {:>6} {:>6} {:>6}  {}",
                s.date_string(),
                s.ward_id.to_string(),
                s.daily_patient_census,
                s.daily_nurse_total,
                format_ratio(s.daily_nurse_ratio),
                inflow,
                outflow,
                status
            );
        }
    }
    Ok(())
}

fn format_ratio(ratio: Option<f64>) -> String {
    ratio
        .map(|r| format!("{:.2}", r))
        .unwrap_or_else(|| "-".to_string())
}

fn print_shift(label: &str, sub: &ShiftSubtotal) {
    match (&sub.form_id, sub.status) {
        (Some(id), Some(status)) => println!(
            "{:<8} {}  {:<9} census {:>4}  nurses {:>3}  ratio {}",
            label,
            id,
            status.to_string(),
            sub.patient_census,
            sub.nurse_total,
            format_ratio(sub.nurse_ratio)
        ),
        _ => println!("{:<8} (not recorded)", label),
    }
}

fn print_summary(session: &Session, summary: &DailySummary) {
    println!(
        "{} ({}) {}",
        summary.ward_id,
        session.wards().label(&summary.ward_id),
        summary.date_string()
    );
    match &summary.incomplete {
        None => println!("All shifts approved"),
        Some(incomplete) => println!("Incomplete: {}", incomplete),
    }
    println!();

    print_shift("Morning", &summary.morning);
    print_shift("Night", &summary.night);
    println!();

    println!("Census:            {}", summary.daily_patient_census);
    println!(
        "Nurses:            {} (morning {}, night {})",
        summary.daily_nurse_total,
        summary.morning_nurse_total(),
        summary.night_nurse_total()
    );
    println!("Ratio:             {}", format_ratio(summary.daily_nurse_ratio));
    println!(
        "Admitted:          {} new, {} transferred in, {} referred in",
        summary.daily_new_admit_total, summary.daily_transfer_in_total, summary.daily_refer_in_total
    );
    println!(
        "Left:              {} transferred out, {} referred out, {} discharged, {} died",
        summary.daily_transfer_out_total,
        summary.daily_refer_out_total,
        summary.daily_discharge_total,
        summary.daily_dead_total
    );
    println!(
        "Beds:              {} available, {} unavailable, {} planned discharges",
        summary.available_beds, summary.unavailable_beds, summary.planned_discharge
    );
}

#[allow(clippy::too_many_arguments)]
pub fn trends(
    session: &Session,
    output: &Output,
    ward: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    source: SampleSource,
    include_partial: bool,
    by_ward: bool,
) -> Result<()> {
    let ward: Option<WardId> = ward.map(str::parse).transpose()?;
    let (from, to) = date_range(from, to)?;
    output.verbose_ctx(
        "trends",
        &format!("Analyzing {:?} from {} to {}, partial={}", source, from, to, include_partial),
    );

    let samples = session.retry(|| {
        session
            .workflow()
            .trend_samples(ward.as_ref(), from, to, source.into(), !include_partial)
    })?;
    output.verbose_ctx("trends", &format!("{} sample(s)", samples.len()));

    let with_range = |mut report: TrendReport| {
        report.from = Some(from);
        report.to = Some(to);
        report
    };

    if by_ward {
        let reports: Vec<(WardId, TrendReport)> = analyze_by_ward(&samples)
            .into_iter()
            .map(|(ward, report)| (ward, with_range(report)))
            .collect();
        if output.is_json() {
            let map: serde_json::Map<String, serde_json::Value> = reports
                .iter()
                .map(|(ward, report)| {
                    serde_json::to_value(report).map(|v| (ward.to_string(), v))
                })
                .collect::<Result<_, _>>()?;
            output.data(&map);
        } else if reports.is_empty() {
            println!("No data between {} and {}", from, to);
        } else {
            for (i, (ward, report)) in reports.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("== {} ({}) ==", ward, session.wards().label(ward));
                print_report(report);
            }
        }
    } else {
        let report = with_range(analyze(&samples));
        if output.is_json() {
            output.data(&report);
        } else {
            print_report(&report);
        }
    }
    Ok(())
}

fn print_trend(label: &str, trend: &MetricTrend) {
    println!("  {:<8} {:<11} {}", label, trend.direction.as_str(), trend.explanation);
}

fn print_report(report: &TrendReport) {
    let stats = &report.statistics;
    if let (Some(from), Some(to)) = (report.from, report.to) {
        println!("Period: {} to {} ({} records)", from, to, stats.records);
    }
    if stats.records == 0 {
        println!("No records in range");
    } else {
        println!(
            "Census:  avg {:.1}, min {}, max {}",
            stats.avg_census, stats.min_census, stats.max_census
        );
        println!(
            "Staff:   avg {:.1} (RN {:.1}, PN {:.1}, NA {:.1})",
            stats.avg_nurse_total, stats.avg_rn, stats.avg_pn, stats.avg_na
        );
        println!("Ratio:   avg {}", format_ratio(stats.avg_ratio));
        println!(
            "Levels:  {} optimal, {} acceptable, {} warning, {} critical ({:.0}%), {} unrated",
            stats.severity.optimal,
            stats.severity.acceptable,
            stats.severity.warning,
            stats.severity.critical,
            stats.critical_pct,
            stats.severity.unrated
        );
    }

    println!();
    println!("Trends:");
    print_trend("census", &report.trends.census);
    print_trend("nurses", &report.trends.nurses);
    print_trend("ratio", &report.trends.ratio);

    println!();
    println!("Recommendations:");
    for rec in &report.recommendations {
        println!("  [{}] {}: {}", rec.level.as_str(), rec.title, rec.message);
    }
}
