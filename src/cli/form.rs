//! Shift form CLI commands

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;

use super::output::Output;
use super::{date_range, Session};
use crate::domain::{
    parse_date, ApprovalAction, CarryOverSource, CensusCounters, CounterField, FormId, FormKey,
    Shift, ShiftForm, ValidationError, WardId,
};
use crate::engine::DraftRequest;

#[derive(Subcommand)]
pub enum FormCommands {
    /// Start a draft for a ward, date and shift
    ///
    /// Examples:
    ///   census form new WARD6 2024-01-15 morning --initial 20 --set rn=3 --set pn=2
    ///   census form new WARD6 2024-01-15 night --set new_admit=1
    New {
        /// Ward ID
        ward: String,

        /// Date (YYYY-MM-DD)
        date: String,

        /// Shift: morning or night
        shift: String,

        /// Starting census when there is no approved previous shift
        #[arg(long)]
        initial: Option<u32>,

        /// Counter value, e.g. rn=3 (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
    },

    /// Update counters on a draft
    Set {
        /// Form ID
        id: String,

        /// Counter values, e.g. discharge=2 dead=0
        #[arg(required = true, value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
    },

    /// Show form details
    Show {
        /// Form ID
        id: String,
    },

    /// Show the current form for a ward, date and shift
    Get {
        ward: String,
        date: String,
        shift: String,
    },

    /// List current forms
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

    /// Lock a draft for approval
    Finalize {
        /// Form ID
        id: String,
    },

    /// Approve a finalized form
    Approve {
        /// Form ID
        id: String,
    },

    /// Reject a finalized form
    Reject {
        /// Form ID
        id: String,

        /// Why the form is rejected
        #[arg(long, short)]
        reason: String,
    },

    /// Show approval decisions for a form
    History {
        /// Form ID
        id: String,
    },
}

pub fn run(cmd: FormCommands, session: &Session, output: &Output) -> Result<()> {
    match cmd {
        FormCommands::New {
            ward,
            date,
            shift,
            initial,
            assignments,
        } => new_form(session, output, &ward, &date, &shift, initial, &assignments),
        FormCommands::Set { id, assignments } => set_counters(session, output, &id, &assignments),
        FormCommands::Show { id } => show_form(session, output, &id),
        FormCommands::Get { ward, date, shift } => get_form(session, output, &ward, &date, &shift),
        FormCommands::List { ward, from, to } => {
            list_forms(session, output, ward.as_deref(), from.as_deref(), to.as_deref())
        }
        FormCommands::Finalize { id } => finalize_form(session, output, &id),
        FormCommands::Approve { id } => approve_form(session, output, &id),
        FormCommands::Reject { id, reason } => reject_form(session, output, &id, &reason),
        FormCommands::History { id } => show_history(session, output, &id),
    }
}

/// Parses `field=value` into a counter assignment
pub fn parse_assignment(s: &str) -> Result<(CounterField, i64), ValidationError> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| ValidationError::InvalidAssignment(s.to_string()))?;
    let field: CounterField = field.parse()?;
    let value: i64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAssignment(s.to_string()))?;
    Ok((field, value))
}

fn parse_assignments(assignments: &[String]) -> Result<Vec<(CounterField, i64)>> {
    assignments
        .iter()
        .map(|a| parse_assignment(a).map_err(Into::into))
        .collect()
}

fn parse_key(ward: &str, date: &str, shift: &str) -> Result<FormKey> {
    let ward: WardId = ward.parse()?;
    let date: NaiveDate = parse_date(date)?;
    let shift: Shift = shift.parse()?;
    Ok(FormKey::new(ward, date, shift))
}

fn parse_id(id: &str) -> Result<FormId> {
    Ok(id.parse()?)
}

fn new_form(
    session: &Session,
    output: &Output,
    ward: &str,
    date: &str,
    shift: &str,
    initial: Option<u32>,
    assignments: &[String],
) -> Result<()> {
    let key = parse_key(ward, date, shift)?;
    let mut counters = CensusCounters::default();
    for (field, value) in parse_assignments(assignments)? {
        counters.set(field, value)?;
    }

    output.verbose_ctx("form", &format!("Creating draft for {} as {}", key, session.actor));
    let workflow = session.workflow();
    let form = session.retry(|| {
        workflow.create_draft(
            &session.actor,
            DraftRequest {
                key: key.clone(),
                counters: counters.clone(),
                initial_census: initial,
            },
        )
    })?;

    report_form(output, &form, "Created draft");
    Ok(())
}

fn set_counters(
    session: &Session,
    output: &Output,
    id: &str,
    assignments: &[String],
) -> Result<()> {
    let id = parse_id(id)?;
    let changes = parse_assignments(assignments)?;

    let workflow = session.workflow();
    let form = session.retry(|| workflow.update_draft(&id, &session.actor, &changes))?;

    report_form(output, &form, "Updated");
    Ok(())
}

fn show_form(session: &Session, output: &Output, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let form = session.retry(|| session.workflow().form(&id))?;

    if output.is_json() {
        output.data(&form);
    } else {
        print_form(session, &form);
    }
    Ok(())
}

fn get_form(session: &Session, output: &Output, ward: &str, date: &str, shift: &str) -> Result<()> {
    let key = parse_key(ward, date, shift)?;
    let form = session
        .retry(|| session.workflow().live_form(&key))?
        .with_context(|| format!("No form recorded for {}", key))?;

    if output.is_json() {
        output.data(&form);
    } else {
        print_form(session, &form);
    }
    Ok(())
}

fn list_forms(
    session: &Session,
    output: &Output,
    ward: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let ward: Option<WardId> = ward.map(str::parse).transpose()?;
    let (from, to) = date_range(from, to)?;
    output.verbose_ctx("form", &format!("Listing forms from {} to {}", from, to));

    let forms = session.retry(|| session.workflow().forms(ward.as_ref(), from, to))?;

    if output.is_json() {
        output.data(&forms);
    } else if forms.is_empty() {
        println!("No forms between {} and {}", from, to);
    } else {
        println!(
            "{:<10} {:<8} {:<11} {:<8} {:<9} {:>6} {:>6}",
            "ID", "WARD", "DATE", "SHIFT", "STATUS", "CENSUS", "NURSES"
        );
        println!("{}", "-".repeat(64));

        for form in &forms {
            println!(
                "{:<10} {:<8} {:<11} {:<8} {:<9} {:>6} {:>6}{}",
                form.id.to_string(),
                form.ward_id.to_string(),
                form.date.to_string(),
                form.shift.to_string(),
                form.status.to_string(),
                form.patient_census,
                form.nurse_total(),
                if form.census_warning.is_some() { "  !" } else { "" }
            );
        }
    }
    Ok(())
}

fn finalize_form(session: &Session, output: &Output, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let workflow = session.workflow();
    let form = session.retry(|| workflow.finalize(&id, &session.actor))?;

    report_form(output, &form, "Finalized");
    Ok(())
}

fn approve_form(session: &Session, output: &Output, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let workflow = session.workflow();
    let record = session.retry(|| workflow.approve(&id, &session.actor))?;

    if output.is_json() {
        output.data(&record);
    } else {
        output.success(&format!("Approved {} by {}", record.form_id, record.actor_name));
    }
    Ok(())
}

fn reject_form(session: &Session, output: &Output, id: &str, reason: &str) -> Result<()> {
    let id = parse_id(id)?;
    let workflow = session.workflow();
    let record = session.retry(|| workflow.reject(&id, &session.actor, reason))?;

    if output.is_json() {
        output.data(&record);
    } else {
        output.success(&format!(
            "Rejected {}: {}",
            record.form_id,
            record.reason.as_deref().unwrap_or_default()
        ));
    }
    Ok(())
}

fn show_history(session: &Session, output: &Output, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let history = session.retry(|| session.workflow().history(&id))?;

    if output.is_json() {
        output.data(&history);
    } else if history.is_empty() {
        println!("No approval decisions for {}", id);
    } else {
        println!("{:<20} {:<9} {:<20} REASON", "TIMESTAMP", "ACTION", "ACTOR");
        println!("{}", "-".repeat(70));
        for record in &history {
            let action = match record.action {
                ApprovalAction::Approved => "APPROVED",
                ApprovalAction::Rejected => "REJECTED",
            };
            println!(
                "{:<20} {:<9} {:<20} {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                action,
                record.actor_name,
                record.reason.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

/// Prints a form after a change, with any census warning
fn report_form(output: &Output, form: &ShiftForm, verb: &str) {
    if output.is_json() {
        output.data(form);
        return;
    }

    output.success(&format!("{} {} ({}, {})", verb, form.id, form.key(), form.status));
    if let Some(warning) = &form.census_warning {
        output.warn(&format!(
            "movement takes census from {} to {}; recorded as 0. \
             Correct the counters before approval.",
            warning.previous_census, warning.raw_census
        ));
    }
    if !form.counters.missing_required().is_empty() && form.is_draft {
        output.verbose(&format!(
            "Still required before finalize: {}",
            form.counters.missing_required().join(", ")
        ));
    }
}

fn print_form(session: &Session, form: &ShiftForm) {
    let ward_label = session.wards().label(&form.ward_id);

    println!("{}  {}", form.id, form.status);
    println!("Ward:      {} ({})", form.ward_id, ward_label);
    println!("Date:      {}", form.date);
    println!("Shift:     {}", form.shift);

    let source = match &form.carry_over.source {
        CarryOverSource::PriorNight(id) => format!("prior night {}", id),
        CarryOverSource::SameDayMorning(id) => format!("morning {}", id),
        CarryOverSource::Initial => "initial census".to_string(),
    };
    println!(
        "Census:    {} (carried over {} from {})",
        form.patient_census, form.carry_over.previous_census, source
    );
    match form.nurse_ratio() {
        Some(r) => println!("Nurses:    {} ({:.2} patients per nurse)", form.nurse_total(), r),
        None => println!("Nurses:    {}", form.nurse_total()),
    }

    if let Some(warning) = &form.census_warning {
        println!(
            "Warning:   negative census ({}) clamped to 0",
            warning.raw_census
        );
    }

    println!();
    println!("Counters:");
    for field in CounterField::ALL.iter().filter(|f| !f.is_derived()) {
        let value = form
            .counters
            .get(*field)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<18} {}", field.name(), value);
    }

    println!();
    println!(
        "Created:   {} by {}",
        form.created_at.format("%Y-%m-%d %H:%M"),
        form.created_by.name
    );
    if let Some(at) = form.finalized_at {
        println!("Finalized: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let (Some(at), Some(by)) = (form.approved_at, &form.approved_by) {
        println!("Approved:  {} by {}", at.format("%Y-%m-%d %H:%M"), by.name);
    }
    if let (Some(at), Some(by)) = (form.rejected_at, &form.rejected_by) {
        println!("Rejected:  {} by {}", at.format("%Y-%m-%d %H:%M"), by.name);
    }
    if let Some(reason) = &form.rejection_reason {
        println!("Reason:    {}", reason);
    }
    if let Some(previous) = &form.supersedes {
        println!("Replaces:  {}", previous);
    }
}
