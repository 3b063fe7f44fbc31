// Engine command line: reads JSON records, runs one engine operation and
// prints the result as JSON on stdout. Logs go to stderr.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::allocator::BudgetAllocator;
use engine::certificate::CertificateAssembler;
use engine::config::EngineSettings;
use engine::data::BudgetCsvParser;
use engine::migration::{to_legacy, BudgetRecord};
use engine::progress::{with_advancement, ProgressTracker};
use engine::EngineError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::models::{Budget, EditedData, Measurement, ProgressPoint, Project};
use shared::Period;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "engine")]
#[command(about = "Construction budget allocation, progress measurement and certificates")]
struct Cli {
    /// Path to a JSON settings file
    #[arg(short, long, global = true, env = "OBRA_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Section and item shares of a budget's declared total
    Allocate {
        /// Budget record (current or legacy layout)
        #[arg(short, long)]
        budget: PathBuf,
    },
    /// Convert a budget record to the current layout
    Migrate {
        #[arg(short, long)]
        budget: PathBuf,
        /// Print the section list used by old records instead
        #[arg(long)]
        to_legacy: bool,
    },
    /// Opening measurement for a period, seeded from earlier measurements
    Seed {
        #[arg(short, long)]
        budget: PathBuf,
        /// JSON array of the project's earlier measurements
        #[arg(long)]
        history: Option<PathBuf>,
        /// Period to measure, YYYY-MM
        #[arg(short, long)]
        period: String,
    },
    /// Set one item's progress for the period
    UpdateEntry {
        #[arg(short, long)]
        measurement: PathBuf,
        #[arg(short, long)]
        item: String,
        /// Percentage for this period, e.g. "12,5"
        #[arg(long, allow_hyphen_values = true)]
        progress: String,
        /// Budget record used to refresh the advancement figures
        #[arg(short, long)]
        budget: Option<PathBuf>,
    },
    /// Assemble a certificate from a project, budget and measurement
    Certify {
        #[arg(long)]
        project: PathBuf,
        #[arg(short, long)]
        budget: PathBuf,
        #[arg(short, long)]
        measurement: PathBuf,
        /// Contractual fields of the certificate
        #[arg(short, long)]
        edited: Option<PathBuf>,
        /// JSON array of monthly progress points
        #[arg(long)]
        progress: Option<PathBuf>,
    },
    /// Build a budget from a semicolon-separated spreadsheet export
    ImportCsv {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        project_id: i64,
        #[arg(short, long, default_value = "Presupuesto")]
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engine=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading settings");
            EngineSettings::load_from_file(path)?
        }
        None => EngineSettings::default(),
    };

    if let Err(err) = run(cli.command, &settings) {
        let rejected = err.downcast_ref::<EngineError>().map_or(false, EngineError::is_input_error);
        if rejected {
            tracing::error!(error = %err, "Input rejected");
            std::process::exit(2);
        }
        return Err(err);
    }
    Ok(())
}

fn run(command: Command, settings: &EngineSettings) -> Result<()> {
    match command {
        Command::Allocate { budget } => {
            let budget = read_budget(&budget)?;
            let allocated = BudgetAllocator::new(settings.allocation.clone()).allocate(&budget);
            info!(
                budget_id = ?allocated.budget_id,
                sections = allocated.sections.len(),
                items = allocated.item_count(),
                "Budget allocated"
            );
            print_json(&allocated)
        }
        Command::Migrate { budget, to_legacy: legacy } => {
            let budget = read_budget(&budget)?;
            if legacy {
                print_json(&to_legacy(&budget.data))
            } else {
                print_json(&budget)
            }
        }
        Command::Seed { budget, history, period } => {
            let budget = read_budget(&budget)?;
            let period = Period::parse(&period).map_err(|e| EngineError::InvalidPeriod(format!("'{}': {}", period, e)))?;
            let history: Vec<Measurement> = match history {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            let measurement = ProgressTracker::new(settings.progress.clone()).seed_measurement(
                budget.project_id,
                budget.id,
                period,
                &history,
                budget.data.items(),
            );
            print_json(&measurement)
        }
        Command::UpdateEntry { measurement, item, progress, budget } => {
            let measurement: Measurement = read_json(&measurement)?;
            let monthly = settings
                .number_format
                .parse_decimal_strict(&progress)
                .with_context(|| format!("Invalid progress '{}'", progress))?;
            let updated = ProgressTracker::new(settings.progress.clone()).update_entry(&measurement, &item, monthly)?;
            let updated = match budget {
                Some(path) => {
                    let budget = read_budget(&path)?;
                    let allocated = BudgetAllocator::new(settings.allocation.clone()).allocate(&budget);
                    with_advancement(&updated, allocated.items())
                }
                None => updated,
            };
            print_json(&updated)
        }
        Command::Certify { project, budget, measurement, edited, progress } => {
            let project: Project = read_json(&project)?;
            let budget = read_budget(&budget)?;
            let measurement: Measurement = read_json(&measurement)?;
            let edited: EditedData = match edited {
                Some(path) => read_json(&path)?,
                None => EditedData::default(),
            };
            let progress: Option<Vec<ProgressPoint>> = match progress {
                Some(path) => Some(read_json(&path)?),
                None => None,
            };
            let allocated = BudgetAllocator::new(settings.allocation.clone()).allocate(&budget);
            let certificate = CertificateAssembler::new().assemble(&project, &allocated, &measurement, edited, progress)?;
            print_json(&certificate)
        }
        Command::ImportCsv { file, project_id, name } => {
            let data = BudgetCsvParser::new(settings.number_format.clone()).parse_file(&file)?;
            let budget = Budget {
                id: None,
                project_id,
                name,
                total: data.item_sum(),
                data,
                created_at: None,
                updated_at: None,
            };
            print_json(&budget)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let load = || -> Result<T, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    };
    load().with_context(|| format!("Failed to load '{}'", path.display()))
}

fn read_budget(path: &Path) -> Result<Budget> {
    let record: BudgetRecord = read_json(path)?;
    Ok(record.normalize())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
