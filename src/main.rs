//! CLI Entry Point for field_daq
//!
//! Provides a console front end for:
//! - Creating the data file and writing a starter configuration file
//! - One-shot acquisitions (a single field or the whole environmental sequence)
//! - Collecting and committing a complete record for one location
//! - An interactive station console, one command per line
//!
//! # Usage
//!
//! ```bash
//! field_daq write-config config/field_daq.toml
//! field_daq init data/plot_a.csv
//! field_daq --config config/field_daq.toml acquire air-temp
//! field_daq collect --code P1 --wind-speed 3.2 --ground-humidity 40
//! field_daq console
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use field_daq::acquisition::SequenceReport;
use field_daq::config::{FieldDaqConfig, DEFAULT_CONFIG_PATH};
use field_daq::data::CsvRecordLog;
use field_daq::logging;
use field_daq::record::Field;
use field_daq::session::Session;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser)]
#[command(name = "field_daq")]
#[command(about = "Environmental field station acquisition console", long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data file with its header row (defaults to `storage.output_path`)
    Init { path: Option<PathBuf> },

    /// Write the default configuration to a file
    WriteConfig {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Acquire one field (e.g. `air-temp`, `PRESSURE`) or `all`, without committing
    Acquire { target: String },

    /// Acquire every environmental field, add the operator values and commit one row
    Collect {
        /// Location code
        #[arg(long)]
        code: String,

        #[arg(long)]
        wind_speed: Option<String>,

        #[arg(long)]
        ground_humidity: Option<String>,

        /// Print the committed record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive station console reading commands from stdin
    Console,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::WriteConfig { path, force } = &cli.command {
        return write_default_config(path, *force);
    }

    let config = load_config(cli.config.as_deref())?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    if let Commands::Init { path } = &cli.command {
        let path = path.as_ref().unwrap_or(&config.storage.output_path);
        let log = CsvRecordLog::create(path)?;
        println!("Data file ready at {}", log.path().display());
        return Ok(());
    }

    // Calibration failure is fatal, as on the station itself.
    let session = Session::start(&config)
        .await
        .context("Failed to start acquisition session")?;

    match cli.command {
        Commands::Init { .. } | Commands::WriteConfig { .. } => Ok(()),
        Commands::Acquire { target } => acquire(&session, &target).await,
        Commands::Collect {
            code,
            wind_speed,
            ground_humidity,
            json,
        } => collect(&session, code, wind_speed, ground_humidity, json).await,
        Commands::Console => console(&session).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<FieldDaqConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let file = path.exists().then_some(path);
    let config = FieldDaqConfig::load_or_default(file)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&FieldDaqConfig::default())?;
    std::fs::write(path, content)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

async fn acquire(session: &Session, target: &str) -> Result<()> {
    if target.eq_ignore_ascii_case("all") {
        let report = session.acquire_all().await?;
        print_report(session, &report);
        return Ok(());
    }

    let field: Field = target.parse()?;
    session.acquire(field).await?;
    println!("{}", session.presentation().describe(field));
    Ok(())
}

async fn collect(
    session: &Session,
    code: String,
    wind_speed: Option<String>,
    ground_humidity: Option<String>,
    json: bool,
) -> Result<()> {
    let report = session.acquire_all().await?;
    print_report(session, &report);

    session.enter_text(Field::Code, code)?;
    if let Some(wind) = wind_speed {
        session.enter_text(Field::WindSpeed, wind)?;
    }
    if let Some(ground) = ground_humidity {
        session.enter_text(Field::GroundHumidity, ground)?;
    }

    let receipt = session.commit().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&receipt.record)?);
    } else {
        println!("Record saved to {}", receipt.location);
    }
    Ok(())
}

async fn console(session: &Session) -> Result<()> {
    println!("Commands: acquire <field|all>, set <field> <text>, show, save, reset, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let outcome: Result<()> = match command {
            "" => continue,
            "quit" | "exit" => break,
            "acquire" => acquire(session, rest).await,
            "set" => match rest.split_once(' ') {
                Some((field, text)) => field
                    .parse::<Field>()
                    .map_err(anyhow::Error::from)
                    .and_then(|field| Ok(session.enter_text(field, text.trim())?)),
                None => Err(anyhow::anyhow!("usage: set <field> <text>")),
            },
            "show" => {
                let view = session.presentation();
                for field in Field::ALL {
                    println!("{}", view.describe(field));
                }
                Ok(())
            }
            "save" => session
                .commit()
                .await
                .map(|receipt| println!("Record saved to {}", receipt.location))
                .map_err(anyhow::Error::from),
            "reset" => session.reset().map_err(anyhow::Error::from),
            other => Err(anyhow::anyhow!("unknown command '{}'", other)),
        };

        if let Err(e) = outcome {
            eprintln!("error: {:#}", e);
        }
    }
    Ok(())
}

fn print_report(session: &Session, report: &SequenceReport) {
    let view = session.presentation();
    for field in &report.completed {
        println!("{}", view.describe(*field));
    }
    for (field, error) in &report.failed {
        warn!(field = %field, "{}", error);
        println!("{}: failed ({})", field.label(), error);
    }
    if report.cancelled {
        println!("Sequence cancelled");
    }
}
