//! TPP CLI - Command-line interface for the TPP monitoring engine
//!
//! Commands:
//! - generate: Produce a synthetic daily or episode dataset
//! - analyze: Summarize a dataset as a text or JSON report
//! - validate: Check every record of a dataset
//! - enrich: Attach time features, rolling statistics and change flags
//! - upload: Send a dataset to the ingestion backend (`upload` feature)

use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tpp_monitor::generator::{DEFAULT_DAILY_RECORDS, DEFAULT_EPISODE_MINUTES};
use tpp_monitor::types::format_timestamp;
use tpp_monitor::{
    Batch, DatasetAdapter, EngineConfig, EngineError, GenerationRequest, MonitoringProcessor,
    ReportEncoder, ReportFormat, Value, VERSION,
};

#[cfg(feature = "upload")]
use tpp_monitor::{UploadClient, UploadError};

const PREVIEW_RECORDS: usize = 5;

/// TPP - heart-rate monitoring data toolkit for periodic paralysis
#[derive(Parser)]
#[command(name = "tpp")]
#[command(version = VERSION)]
#[command(about = "Generate, validate, enrich and analyze TPP monitoring data", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic dataset
    Generate {
        /// Output file path (.json or .csv)
        #[arg(short, long, default_value = "synthetic-data.json")]
        output: PathBuf,

        /// Pattern to generate
        #[arg(short = 't', long = "type", value_enum, default_value = "daily")]
        kind: GenerationType,

        /// Number of records (daily pattern)
        #[arg(short = 'n', long, default_value_t = DEFAULT_DAILY_RECORDS)]
        records: usize,

        /// Episode duration in minutes (episode pattern)
        #[arg(short, long, default_value_t = DEFAULT_EPISODE_MINUTES)]
        duration: u32,

        /// Start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Base heart rate (bpm)
        #[arg(long)]
        base_hr: Option<f64>,

        /// Heart-rate noise level
        #[arg(long)]
        noise: Option<f64>,
    },

    /// Analyze a dataset
    Analyze {
        /// Input file path (.csv or .json)
        input: PathBuf,

        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormatArg,

        /// Anomaly z-score threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Validate every record of a dataset
    Validate {
        /// Input file path (.csv or .json)
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a fully enriched copy of a dataset
    Enrich {
        /// Input file path (.csv or .json)
        input: PathBuf,

        /// Output file path (.csv or .json)
        #[arg(short, long)]
        output: PathBuf,

        /// Rolling window in samples
        #[arg(long)]
        window: Option<usize>,

        /// Rapid-change threshold (bpm)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Upload a dataset to the ingestion backend
    #[cfg(feature = "upload")]
    Upload {
        /// Input file path
        input: PathBuf,

        /// Backend base URL
        #[arg(short, long)]
        url: Option<String>,

        /// Skip the server health check before uploading
        #[arg(long)]
        skip_health_check: bool,

        /// Print the full server response
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GenerationType {
    /// 24-hour pattern at 30-minute cadence
    Daily,
    /// Paralysis episode at 5-minute cadence
    Episode,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormatArg {
    /// Multi-section plain text
    Text,
    /// JSON with producer metadata
    Json,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Text => ReportFormat::Text,
            ReportFormatArg::Json => ReportFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), TppCliError> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            output,
            kind,
            records,
            duration,
            date,
            base_hr,
            noise,
        } => {
            if let Some(base_hr) = base_hr {
                config.generator.base_hr = base_hr;
            }
            if let Some(noise) = noise {
                config.generator.noise_level = noise;
            }
            let start = start_instant(date.as_deref())?;
            let request = match kind {
                GenerationType::Daily => GenerationRequest::Daily {
                    start,
                    num_records: records,
                },
                GenerationType::Episode => GenerationRequest::Episode {
                    start,
                    duration_minutes: duration,
                },
            };
            cmd_generate(config, request, &output)
        }

        Commands::Analyze {
            input,
            output,
            format,
            threshold,
        } => {
            if let Some(threshold) = threshold {
                config.anomaly_threshold = threshold;
            }
            cmd_analyze(config, &input, output.as_deref(), format.into())
        }

        Commands::Validate { input, json } => cmd_validate(config, &input, json),

        Commands::Enrich {
            input,
            output,
            window,
            threshold,
        } => {
            if let Some(window) = window {
                config.rolling_window = window;
            }
            if let Some(threshold) = threshold {
                config.rapid_change_threshold = threshold;
            }
            cmd_enrich(config, &input, &output)
        }

        #[cfg(feature = "upload")]
        Commands::Upload {
            input,
            url,
            skip_health_check,
            verbose,
        } => {
            if let Some(url) = url {
                config.upload.base_url = url;
            }
            cmd_upload(config, &input, skip_health_check, verbose)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, TppCliError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(EngineConfig::from_file(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Midnight of the given date, or of today
fn start_instant(date: Option<&str>) -> Result<NaiveDateTime, TppCliError> {
    let day = match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| TppCliError::InvalidDate(raw.to_string()))?,
        None => Local::now().date_naive(),
    };
    day.and_hms_opt(0, 0, 0)
        .ok_or_else(|| TppCliError::InvalidDate(day.to_string()))
}

fn cmd_generate(
    config: EngineConfig,
    request: GenerationRequest,
    output: &Path,
) -> Result<(), TppCliError> {
    let processor = MonitoringProcessor::new(config)?;
    let batch = processor.generate(request);

    DatasetAdapter::save(&batch, output)?;

    let instants: Vec<NaiveDateTime> = batch.timestamps().into_iter().flatten().collect();
    if let (Some(first), Some(last)) = (instants.iter().min(), instants.iter().max()) {
        info!(
            records = batch.len(),
            start = %format_timestamp(first),
            end = %format_timestamp(last),
            "generated {} data",
            request.kind().as_str()
        );
    }

    println!("Wrote {} records to {}", batch.len(), output.display());
    print_preview(&batch, PREVIEW_RECORDS);
    Ok(())
}

fn cmd_analyze(
    config: EngineConfig,
    input: &Path,
    output: Option<&Path>,
    format: ReportFormat,
) -> Result<(), TppCliError> {
    let processor = MonitoringProcessor::new(config)?;
    let batch = DatasetAdapter::load(input)?;

    let report = processor.analyze(&batch);
    let rendered = ReportEncoder::new().render(&report, format)?;

    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            info!(path = %path.display(), "results written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn cmd_validate(config: EngineConfig, input: &Path, json: bool) -> Result<(), TppCliError> {
    let processor = MonitoringProcessor::new(config)?;
    let batch = DatasetAdapter::load(input)?;
    let validation = processor.validate(&batch);

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        let invalid = validation.invalid_records();
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", validation.total_records);
        if validation.is_schema_failure() {
            println!("Schema check:    failed");
        } else {
            println!("Valid records:   {}", validation.total_records - invalid);
            println!("Invalid records: {invalid}");
        }

        let errors = validation.errors();
        if !errors.is_empty() {
            println!("\nErrors:");
            for error in &errors {
                println!("  - {error}");
            }
        }
    }

    if validation.is_valid() {
        Ok(())
    } else {
        Err(TppCliError::ValidationFailed(validation.issues.len()))
    }
}

fn cmd_enrich(config: EngineConfig, input: &Path, output: &Path) -> Result<(), TppCliError> {
    let processor = MonitoringProcessor::new(config)?;
    let batch = DatasetAdapter::load(input)?;

    let enriched = processor.enrich(&batch)?;
    DatasetAdapter::save(&enriched, output)?;

    println!(
        "Wrote {} enriched records ({} columns) to {}",
        enriched.len(),
        enriched.columns().len(),
        output.display()
    );
    Ok(())
}

#[cfg(feature = "upload")]
fn cmd_upload(
    config: EngineConfig,
    input: &Path,
    skip_health_check: bool,
    verbose: bool,
) -> Result<(), TppCliError> {
    if !input.exists() {
        return Err(TppCliError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("File '{}' not found", input.display()),
        )));
    }

    let client = UploadClient::new(config.upload)?;

    if !skip_health_check {
        let health = client.health_check()?;
        if verbose {
            println!("Server is healthy");
            println!("   Status: {}", health.status.as_deref().unwrap_or("N/A"));
            println!("   Message: {}", health.message.as_deref().unwrap_or("N/A"));
            println!();
        }
    }

    let response = client.upload_file(input)?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    println!("Upload successful");
    println!("   File: {file_name}");
    println!(
        "   Records: {}",
        response.count.map_or_else(|| "N/A".to_string(), |c| c.to_string())
    );
    println!("   Message: {}", response.message.as_deref().unwrap_or("N/A"));
    if verbose {
        println!("   Response: {}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

fn print_preview(batch: &Batch, limit: usize) {
    let columns = batch.columns();
    println!();
    println!("Preview (first {} records):", limit.min(batch.len()));
    println!("  {}", columns.join(" | "));
    for row in batch.rows().iter().take(limit) {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(Value::to_string).unwrap_or_default())
            .collect();
        println!("  {}", cells.join(" | "));
    }
}

// Error handling

#[derive(Debug)]
enum TppCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    InvalidDate(String),
    ValidationFailed(usize),
    #[cfg(feature = "upload")]
    Upload(UploadError),
}

impl From<io::Error> for TppCliError {
    fn from(e: io::Error) -> Self {
        TppCliError::Io(e)
    }
}

impl From<EngineError> for TppCliError {
    fn from(e: EngineError) -> Self {
        TppCliError::Engine(e)
    }
}

impl From<serde_json::Error> for TppCliError {
    fn from(e: serde_json::Error) -> Self {
        TppCliError::Json(e)
    }
}

#[cfg(feature = "upload")]
impl From<UploadError> for TppCliError {
    fn from(e: UploadError) -> Self {
        TppCliError::Upload(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TppCliError> for CliError {
    fn from(e: TppCliError) -> Self {
        match e {
            TppCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TppCliError::Engine(e) => engine_error(e),
            TppCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            TppCliError::InvalidDate(raw) => CliError {
                code: "INVALID_DATE".to_string(),
                message: format!("Invalid date format '{raw}'"),
                hint: Some("Use YYYY-MM-DD".to_string()),
            },
            TppCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} validation errors"),
                hint: Some("Fix the listed records and retry".to_string()),
            },
            #[cfg(feature = "upload")]
            TppCliError::Upload(e) => {
                let hint = match &e {
                    UploadError::Network(_) => {
                        Some("Make sure the backend is running, or use --skip-health-check".to_string())
                    }
                    _ => None,
                };
                CliError {
                    code: "UPLOAD_ERROR".to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
        }
    }
}

fn engine_error(e: EngineError) -> CliError {
    let (code, hint) = match &e {
        EngineError::MissingColumn(_) => (
            "MISSING_COLUMN",
            Some("Input needs timestamp, heartRate, hrv and activity columns"),
        ),
        EngineError::UnsupportedFormat(_) => ("UNSUPPORTED_FORMAT", Some("Use a .csv or .json file")),
        EngineError::InvalidParameter(_) => ("INVALID_PARAMETER", None),
        EngineError::DateParseError(_) | EngineError::MalformedInput(_) => (
            "PARSE_ERROR",
            Some("Run 'tpp validate' for details"),
        ),
        EngineError::JsonError(_) => ("JSON_ERROR", Some("Check JSON syntax")),
        EngineError::CsvError(_) => ("CSV_ERROR", Some("Check that every row has the header's column count")),
        EngineError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: hint.map(str::to_string),
    }
}
