//! Ward reference data commands

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{Ward, WardId};
use crate::storage::Project;

#[derive(Subcommand)]
pub enum WardCommands {
    /// Register a ward
    Add {
        /// Ward ID, e.g. WARD6
        id: String,

        /// Display name
        name: String,
    },

    /// List registered wards
    List,

    /// Stop accepting new forms for a ward
    Deactivate {
        /// Ward ID
        id: String,
    },

    /// Accept new forms for a ward again
    Activate {
        /// Ward ID
        id: String,
    },
}

pub fn run(cmd: WardCommands, output: &Output) -> Result<()> {
    match cmd {
        WardCommands::Add { id, name } => add_ward(output, &id, &name),
        WardCommands::List => list_wards(output),
        WardCommands::Deactivate { id } => set_active(output, &id, false),
        WardCommands::Activate { id } => set_active(output, &id, true),
    }
}

fn add_ward(output: &Output, id: &str, name: &str) -> Result<()> {
    let mut project = Project::open_current()?;
    let id: WardId = id.parse()?;

    let wards = &mut project.config_mut().project.wards;
    if wards.iter().any(|w| w.id == id) {
        bail!("Ward {} already exists", id);
    }
    let ward = Ward::new(id, name);
    wards.push(ward.clone());
    project.config().save_project()?;

    if output.is_json() {
        output.data(&ward);
    } else {
        output.success(&format!("Added ward {} ({})", ward.id, ward.name));
    }
    Ok(())
}

fn list_wards(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let wards = &project.config().project.wards;

    if output.is_json() {
        output.data(wards);
    } else if wards.is_empty() {
        println!("No wards. Add one with 'census ward add <ID> <NAME>'.");
    } else {
        println!("{:<10} {:<8} NAME", "ID", "ACTIVE");
        println!("{}", "-".repeat(40));
        for ward in wards {
            println!(
                "{:<10} {:<8} {}",
                ward.id.to_string(),
                if ward.active { "yes" } else { "no" },
                ward.name
            );
        }
    }
    Ok(())
}

fn set_active(output: &Output, id: &str, active: bool) -> Result<()> {
    let mut project = Project::open_current()?;
    let id: WardId = id.parse()?;

    let ward = match project
        .config_mut()
        .project
        .wards
        .iter_mut()
        .find(|w| w.id == id)
    {
        Some(ward) => {
            ward.active = active;
            ward.clone()
        }
        None => bail!("Unknown ward: {}", id),
    };
    project.config().save_project()?;

    if output.is_json() {
        output.data(&ward);
    } else if active {
        output.success(&format!("Ward {} is active", ward.id));
    } else {
        output.success(&format!("Ward {} no longer accepts new forms", ward.id));
    }
    Ok(())
}
