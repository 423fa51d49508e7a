//! Glykos CLI - Command-line interface for the Glykos compute engine
//!
//! Commands:
//! - transform: Align a record batch into rows, sequences, or a snapshot
//! - score: Compute an Insulin Sensitivity Score from raw series
//! - isf: Compute an Insulin Sensitivity Factor from a total daily dose
//! - doctor: Diagnose input data and environment
//! - serve: Run the HTTP surface (requires the `server` feature)

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use glykos::pipeline::{self, FeatureEngine};
use glykos::schema::RecordBatch;
use glykos::types::{GlucoseUnit, IsfMethod, DEFAULT_WINDOW};
use glykos::{EngineError, GLYKOS_VERSION, PRODUCER_NAME};

/// Glykos - compute engine for diabetes time-series features
#[derive(Parser)]
#[command(name = "glykos")]
#[command(version = GLYKOS_VERSION)]
#[command(about = "Align health record streams into features and scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align a record batch into rows, sequences, or a dashboard snapshot
    Transform {
        /// Input file with glucose/activity/insulin arrays (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Unit of the glucose values in the input
        #[arg(long, value_enum, default_value = "mg-dl")]
        unit: UnitArg,

        /// What to emit
        #[arg(long, value_enum, default_value = "rows")]
        emit: Emit,

        /// Sequence window size (only used with --emit sequences)
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Compute an Insulin Sensitivity Score from raw series
    Score {
        /// Input file with glucose/insulin_units arrays (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute an Insulin Sensitivity Factor from a total daily dose
    Isf {
        /// Rule to apply
        #[arg(long, value_enum, default_value = "1800-rule")]
        method: MethodArg,

        /// Total daily insulin dose in units
        #[arg(long)]
        tdd: f64,
    },

    /// Diagnose input data and environment
    Doctor {
        /// Record batch file to inspect
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the HTTP surface over a record batch file
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind to
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Record batch file backing the server
        #[arg(long)]
        data: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    /// Glucose values are mg/dL
    MgDl,
    /// Glucose values are mmol/L
    MmolL,
}

impl From<UnitArg> for GlucoseUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::MgDl => GlucoseUnit::MgDl,
            UnitArg::MmolL => GlucoseUnit::MmolL,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    /// 1800 / TDD, mg/dL per unit
    #[value(name = "1800-rule")]
    Rule1800,
    /// 100 / TDD, mmol/L per unit
    #[value(name = "100-rule")]
    Rule100,
}

impl From<MethodArg> for IsfMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Rule1800 => IsfMethod::Rule1800,
            MethodArg::Rule100 => IsfMethod::Rule100,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    /// Aligned unified rows
    Rows,
    /// Sliding feature sequences
    Sequences,
    /// Dashboard snapshot
    Snapshot,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one item per line)
    Ndjson,
}

/// Raw series input for the score command
#[derive(Deserialize)]
struct ScoreInput {
    #[serde(default)]
    glucose: Vec<f64>,
    #[serde(default)]
    insulin_units: Vec<f64>,
    #[serde(default)]
    unit: GlucoseUnit,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GlykosCliError> {
    match cli.command {
        Commands::Transform {
            input,
            output,
            unit,
            emit,
            window,
            output_format,
        } => cmd_transform(&input, &output, unit.into(), emit, window, output_format),

        Commands::Score { input } => cmd_score(&input),

        Commands::Isf { method, tdd } => cmd_isf(method.into(), tdd),

        Commands::Doctor { data, json } => cmd_doctor(data.as_deref(), json),

        #[cfg(feature = "server")]
        Commands::Serve { port, data } => cmd_serve(port, &data),
    }
}

fn cmd_transform(
    input: &PathBuf,
    output: &PathBuf,
    unit: GlucoseUnit,
    emit: Emit,
    window: usize,
    output_format: OutputFormat,
) -> Result<(), GlykosCliError> {
    let input_data = read_input(input)?;
    let batch = RecordBatch::from_json(&input_data)?;

    let rows = pipeline::align_records(&batch, unit);

    let rendered = match emit {
        Emit::Rows => render_items(&rows, output_format)?,
        Emit::Sequences => {
            let sequences = pipeline::derive_sequences(&rows, window)?;
            render_items(&sequences, output_format)?
        }
        Emit::Snapshot => {
            let snapshot = FeatureEngine::new().snapshot(&rows);
            render_one(&snapshot, output_format)?
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", rendered);
    } else {
        fs::write(output, rendered)?;
    }

    Ok(())
}

fn cmd_score(input: &PathBuf) -> Result<(), GlykosCliError> {
    let input_data = read_input(input)?;
    let score_input: ScoreInput = serde_json::from_str(&input_data)?;

    let glucose = pipeline::to_mgdl(&score_input.glucose, score_input.unit);
    let result = pipeline::compute_sensitivity_score(&glucose, &score_input.insulin_units);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "iss": result.score,
            "components": result.components,
        }))?
    );
    Ok(())
}

fn cmd_isf(method: IsfMethod, tdd: f64) -> Result<(), GlykosCliError> {
    let factor = pipeline::compute_sensitivity_factor(method, tdd)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "isf": factor.value,
            "unit": factor.unit,
        }))?
    );
    Ok(())
}

fn cmd_doctor(data: Option<&std::path::Path>, json: bool) -> Result<(), GlykosCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "glykos_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Glykos version {}", GLYKOS_VERSION),
    });

    if let Some(data_path) = data {
        if data_path.exists() {
            match fs::read_to_string(data_path) {
                Ok(content) => match RecordBatch::from_json(&content) {
                    Ok(batch) => {
                        checks.push(DoctorCheck {
                            name: "data".to_string(),
                            status: if batch.glucose.is_empty() {
                                CheckStatus::Warning
                            } else {
                                CheckStatus::Ok
                            },
                            message: format!(
                                "Batch parsed: {} glucose, {} activity, {} insulin records",
                                batch.glucose.len(),
                                batch.activity.len(),
                                batch.insulin.len()
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "data".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid record batch JSON: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "data".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read data file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "data".to_string(),
                status: CheckStatus::Warning,
                message: "Data file does not exist".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GLYKOS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Glykos Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GlykosCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16, data: &std::path::Path) -> Result<(), GlykosCliError> {
    use glykos::server::{run, ServerConfig};
    use glykos::StaticRecordSource;
    use std::sync::Arc;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let content = fs::read_to_string(data)?;
    let source = Arc::new(StaticRecordSource::from_json(&content)?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (_addr, shutdown_tx) = run(ServerConfig::new(port), source)
            .await
            .map_err(|e| GlykosCliError::Server(e.to_string()))?;

        tokio::signal::ctrl_c()
            .await
            .map_err(GlykosCliError::Io)?;
        let _ = shutdown_tx.send(());
        Ok(())
    })
}

// Helper functions

fn read_input(input: &PathBuf) -> Result<String, GlykosCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn render_items<T: Serialize>(
    items: &[T],
    format: OutputFormat,
) -> Result<String, GlykosCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
    }
}

fn render_one<T: Serialize>(item: &T, format: OutputFormat) -> Result<String, GlykosCliError> {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => Ok(serde_json::to_string(item)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(item)?),
    }
}

// Error types

#[derive(Debug)]
enum GlykosCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    DoctorFailed,
    #[cfg(feature = "server")]
    Server(String),
}

impl From<io::Error> for GlykosCliError {
    fn from(e: io::Error) -> Self {
        GlykosCliError::Io(e)
    }
}

impl From<EngineError> for GlykosCliError {
    fn from(e: EngineError) -> Self {
        GlykosCliError::Engine(e)
    }
}

impl From<serde_json::Error> for GlykosCliError {
    fn from(e: serde_json::Error) -> Self {
        GlykosCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GlykosCliError> for CliError {
    fn from(e: GlykosCliError) -> Self {
        match e {
            GlykosCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GlykosCliError::Engine(e) => {
                let code = match &e {
                    EngineError::InvalidDose(_) => "INVALID_DOSE",
                    EngineError::WindowOutOfRange { .. } => "WINDOW_OUT_OF_RANGE",
                    EngineError::InvalidQuery(_) => "INVALID_QUERY",
                    EngineError::UnsupportedTimestampType(_) => "UNSUPPORTED_TIMESTAMP",
                    EngineError::MalformedRecord(_) => "MALFORMED_RECORD",
                    EngineError::JsonError(_) => "JSON_ERROR",
                    EngineError::SourceError(_) => "SOURCE_ERROR",
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: None,
                }
            }
            GlykosCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GlykosCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            #[cfg(feature = "server")]
            GlykosCliError::Server(message) => CliError {
                code: "SERVER_ERROR".to_string(),
                message,
                hint: None,
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
