use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use mahakrama::config::Config;
use mahakrama::rest;
use mahakrama::store::{HttpStore, MahakramaStore};
use mahakrama::types::{MahakramaHistory, MahakramaStep, StepInput, StepUpdate};
use mahakrama::{logging, Confirmation, CsvStepImporter, TransitionEngine};

#[derive(Parser)]
#[command(name = "mahakrama")]
#[command(about = "Mahakrama curriculum progression tracking")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Server root to talk to (overrides client.base_url)
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reference REST API server
    Serve {
        /// Port to listen on (default: 7010)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the step catalog
    Steps {
        #[command(subcommand)]
        command: StepCommands,
    },

    /// Import steps from a CSV file, appended after the current catalog
    Import {
        /// CSV file with groupId, groupName, stepId, stepName and optional description columns
        file: String,

        /// Show the parsed records without writing anything
        #[arg(long)]
        preview: bool,

        /// Records to show with --preview (default: import.preview_rows)
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Show a person's progression history
    History {
        person_id: Uuid,
    },

    /// Start a step for a person
    Start {
        person_id: Uuid,

        /// Catalog id of the step to start (lists the choices when omitted)
        #[arg(long)]
        step: Option<Uuid>,

        #[arg(long)]
        instructor: Uuid,

        /// Start date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Complete a person's current step
    Complete {
        person_id: Uuid,

        #[arg(long)]
        instructor: Uuid,

        /// Completion date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Skip the fast-completion confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write the effective configuration to .mahakrama/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the OpenAPI document
    Openapi {
        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
}

#[derive(Subcommand)]
enum StepCommands {
    /// List steps in sequence order
    List,

    /// Add a single step
    Add(StepArgs),

    /// Update fields of a step
    Update {
        id: Uuid,

        #[arg(long)]
        sequence: Option<f64>,

        #[arg(long)]
        group_id: Option<String>,

        #[arg(long)]
        group_name: Option<String>,

        #[arg(long)]
        step_id: Option<String>,

        #[arg(long)]
        step_name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,
    },

    /// Delete a step no history refers to
    Delete { id: Uuid },
}

#[derive(Args)]
struct StepArgs {
    /// Position in the catalog, at least 0.01
    #[arg(long)]
    sequence: f64,

    #[arg(long)]
    group_id: String,

    #[arg(long)]
    group_name: String,

    #[arg(long)]
    step_id: String,

    #[arg(long)]
    step_name: String,

    #[arg(long)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.client.base_url = url;
    }

    let is_server_mode = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server_mode, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Serve { port } => cmd_serve(&config, port).await?,
        Commands::Steps { command } => cmd_steps(&config, command).await?,
        Commands::Import {
            file,
            preview,
            rows,
        } => cmd_import(&config, &file, preview, rows).await?,
        Commands::History { person_id } => cmd_history(&config, person_id).await?,
        Commands::Start {
            person_id,
            step,
            instructor,
            date,
            notes,
        } => cmd_start(&config, person_id, step, instructor, date, notes).await?,
        Commands::Complete {
            person_id,
            instructor,
            date,
            notes,
            yes,
        } => cmd_complete(&config, person_id, instructor, date, notes, yes).await?,
        Commands::Init { force } => cmd_init(&config, force)?,
        Commands::Openapi { yaml } => cmd_openapi(yaml)?,
    }

    Ok(())
}

fn engine(config: &Config) -> Result<TransitionEngine> {
    let store: Arc<dyn MahakramaStore> = Arc::new(HttpStore::from_config(&config.client)?);
    tracing::debug!(
        store = store.name(),
        base_url = %config.client.base_url,
        "Using Mahakrama server"
    );
    Ok(TransitionEngine::new(store, config.progression.clone()))
}

/// `YYYY-MM-DD` as midnight UTC, today when absent
fn parse_date(value: Option<&str>) -> Result<DateTime<Utc>> {
    let date = match value {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        None => Utc::now().date_naive(),
    };
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn print_step(step: &MahakramaStep) {
    println!(
        "{:>8}  {:<10} {:<10} {}",
        step.sequence_number, step.group_id, step.step_id, step.step_name
    );
}

fn print_input(input: &StepInput) {
    println!(
        "{:>8}  {:<10} {:<10} {}",
        input.sequence_number, input.group_id, input.step_id, input.step_name
    );
}

fn print_history(record: &MahakramaHistory) {
    let end = record
        .end_date
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
    println!(
        "{:<10} {}/{} {}  {} → {}",
        record.status.to_string(),
        record.group_id,
        record.step_id,
        record.step_name,
        record.start_date.format("%Y-%m-%d"),
        end
    );
    if let Some(name) = &record.instructor_name {
        println!("    Instructor: {}", name);
    }
    if let Some(notes) = &record.completion_notes {
        println!("    Notes: {}", notes);
    }
}

async fn cmd_serve(config: &Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);

    println!("Starting Mahakrama REST API server...");
    println!("  Port: {}", port);
    println!(
        "  Auth: {}",
        if config.server.auth_token.is_some() {
            "bearer token"
        } else {
            "open"
        }
    );
    println!("  Endpoints:");
    println!("    GET    /api/health                                          Health check");
    println!("    GET    /api/openapi.json                                    OpenAPI document");
    println!("    GET    /api/mahakrama/steps                                 List steps");
    println!("    POST   /api/mahakrama/steps                                 Create step");
    println!("    POST   /api/mahakrama/steps/import                          Import steps");
    println!("    GET    /api/mahakrama/steps/:id                             Get step");
    println!("    PUT    /api/mahakrama/steps/:id                             Update step");
    println!("    DELETE /api/mahakrama/steps/:id                             Delete step");
    println!("    GET    /api/mahakrama/person/:personId/history              List history");
    println!("    POST   /api/mahakrama/person/:personId/history              Start step");
    println!("    POST   /api/mahakrama/person/:personId/history/:id/complete Complete step");
    println!();

    let state = rest::ApiState::new(config.clone());
    rest::serve(state, port).await?;

    Ok(())
}

async fn cmd_steps(config: &Config, command: StepCommands) -> Result<()> {
    let engine = engine(config)?;
    let catalog = engine.catalog();

    match command {
        StepCommands::List => {
            let steps = catalog.list().await?;
            if steps.is_empty() {
                println!("Catalog is empty");
                return Ok(());
            }

            println!("Mahakrama Steps ({})", steps.len());
            println!("{}", "─".repeat(60));
            for step in &steps {
                print_step(step);
            }
        }
        StepCommands::Add(args) => {
            let step = catalog
                .create(StepInput {
                    sequence_number: args.sequence,
                    group_id: args.group_id,
                    group_name: args.group_name,
                    step_id: args.step_id,
                    step_name: args.step_name,
                    description: args.description,
                })
                .await?;
            println!("Created {} ({})", step.label(), step.id);
        }
        StepCommands::Update {
            id,
            sequence,
            group_id,
            group_name,
            step_id,
            step_name,
            description,
            clear_description,
        } => {
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let step = catalog
                .update(
                    id,
                    StepUpdate {
                        sequence_number: sequence,
                        group_id,
                        group_name,
                        step_id,
                        step_name,
                        description,
                    },
                )
                .await?;
            println!("Updated {}", step.label());
        }
        StepCommands::Delete { id } => {
            catalog.delete(id).await?;
            println!("Deleted step {}", id);
        }
    }

    Ok(())
}

async fn cmd_import(config: &Config, file: &str, preview: bool, rows: Option<usize>) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let engine = engine(config)?;
    let importer = CsvStepImporter::for_catalog(engine.catalog()).await?;

    if preview {
        let total = importer.parse(&text)?.len();
        let shown = importer.preview(&text, rows.unwrap_or(config.import.preview_rows))?;

        println!(
            "Preview: {} record(s), appended after sequence {}",
            total,
            importer.starting_sequence()
        );
        println!("{}", "─".repeat(60));
        for record in &shown {
            print_input(record);
        }
        if total > shown.len() {
            println!("... and {} more", total - shown.len());
        }
        return Ok(());
    }

    let summary = importer.import(engine.catalog(), &text).await?;
    println!(
        "Imported {} step(s), sequence {} to {}",
        summary.inserted, summary.first_sequence, summary.last_sequence
    );
    Ok(())
}

async fn cmd_history(config: &Config, person_id: Uuid) -> Result<()> {
    let engine = engine(config)?;
    let history = engine.progression().history_for(person_id).await?;

    if history.is_empty() {
        println!("No Mahakrama history for {}", person_id);
        return Ok(());
    }

    println!("Mahakrama History ({} records)", history.len());
    println!("{}", "─".repeat(60));
    for record in &history {
        print_history(record);
    }
    Ok(())
}

async fn cmd_start(
    config: &Config,
    person_id: Uuid,
    step: Option<Uuid>,
    instructor: Uuid,
    date: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let start_date = parse_date(date.as_deref())?;
    let engine = engine(config)?;

    let Some(step) = step else {
        let steps = engine.selectable_steps().await?;
        if steps.is_empty() {
            bail!("Catalog is empty; add or import steps first");
        }
        println!("Choose a step with --step <id>:");
        for step in &steps {
            println!("  {}  {}", step.id, step.label());
        }
        return Ok(());
    };

    let record = engine
        .start_progression(person_id, step, start_date, instructor, notes)
        .await?;
    println!(
        "Started {}/{} {} on {}",
        record.group_id,
        record.step_id,
        record.step_name,
        record.start_date.format("%Y-%m-%d")
    );
    Ok(())
}

async fn cmd_complete(
    config: &Config,
    person_id: Uuid,
    instructor: Uuid,
    date: Option<String>,
    notes: Option<String>,
    yes: bool,
) -> Result<()> {
    let completed_date = parse_date(date.as_deref())?;
    let engine = engine(config)?;

    let assessment = engine.assess_completion(person_id, completed_date).await?;
    let mut confirmed = yes;
    if assessment.requires_confirmation && !yes {
        println!("{}", assessment.prompt());
        print!("Confirm? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
        confirmed = true;
    }

    let outcome = engine
        .complete_current(
            person_id,
            completed_date,
            instructor,
            notes,
            Confirmation::from(confirmed),
        )
        .await?;
    println!(
        "Completed {}/{} {} after {} day(s)",
        outcome.completed.group_id,
        outcome.completed.step_id,
        outcome.completed.step_name,
        outcome.days_elapsed
    );
    Ok(())
}

fn cmd_init(config: &Config, force: bool) -> Result<()> {
    let path = Config::local_config_path();
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }

    config.save()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_openapi(yaml: bool) -> Result<()> {
    let spec = if yaml {
        rest::ApiDoc::yaml().context("Failed to render OpenAPI YAML")?
    } else {
        rest::ApiDoc::json().context("Failed to render OpenAPI JSON")?
    };
    println!("{}", spec);
    Ok(())
}
