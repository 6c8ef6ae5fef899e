//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::actor::ActorArgs;
use super::output::{Output, OutputFormat};
use super::report::SampleSource;
use super::{form, report, ward, Session};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "census")]
#[command(author, version, about = "Ward shift census and approval workflow")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (default from global config, else text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub identity: ActorArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new census project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage wards
    #[command(subcommand)]
    Ward(ward::WardCommands),

    /// Record, finalize and approve shift forms
    #[command(subcommand)]
    Form(form::FormCommands),

    /// Daily summaries
    #[command(subcommand)]
    Summary(report::SummaryCommands),

    /// Staffing ratio statistics, trends and recommendations
    Trends {
        /// Filter by ward
        #[arg(long)]
        ward: Option<String>,

        /// First date (default: 30 days before --to)
        #[arg(long)]
        from: Option<String>,

        /// Last date (default: today)
        #[arg(long)]
        to: Option<String>,

        /// Data points: whole days or single shifts
        #[arg(long, value_enum, default_value = "days")]
        source: SampleSource,

        /// Include days or shifts that are not fully approved
        #[arg(long)]
        include_partial: bool,

        /// Report each ward separately
        #[arg(long)]
        by_ward: bool,
    },
}

/// Installs the stderr log subscriber
///
/// `CENSUS_LOG` takes an `EnvFilter` directive; otherwise warnings only, or
/// debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("CENSUS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load()
            .map(|c| OutputFormat::from(c.global.default_format))
            .unwrap_or_default(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("census starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .census directory at: {}", project.census_dir().display()),
            );
            output.success(&format!(
                "Initialized census project at {}",
                project.root().display()
            ));
        }

        Commands::Ward(cmd) => ward::run(cmd, &output)?,

        Commands::Form(cmd) => {
            let session = Session::open(&cli.identity)?;
            output.verbose_ctx("form", &format!("Acting as {}", session.actor));
            form::run(cmd, &session, &output)?
        }

        Commands::Summary(cmd) => {
            let session = Session::open(&cli.identity)?;
            report::summary(cmd, &session, &output)?
        }

        Commands::Trends {
            ward,
            from,
            to,
            source,
            include_partial,
            by_ward,
        } => {
            let session = Session::open(&cli.identity)?;
            report::trends(
                &session,
                &output,
                ward.as_deref(),
                from.as_deref(),
                to.as_deref(),
                source,
                include_partial,
                by_ward,
            )?
        }
    }

    output.verbose("Command completed successfully");
    Ok(())
}
