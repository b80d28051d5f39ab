//! Bilbo CLI - Command-line interface for the Bilbo engine
//!
//! Commands:
//! - estimate: Estimate a one-rep max from a single set
//! - max-reps: Estimate achievable reps at a weight for a known 1RM
//! - plan: Show the BILBO training weight for a 1RM
//! - init: Start tracking an exercise and write its state file
//! - log: Log one session against a state file
//! - run: Apply NDJSON session entries from stdin (streaming mode)
//! - report: Print a progress report for a state file
//! - doctor: Diagnose configuration and state files

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bilbo_engine::config::PolicyConfig;
use bilbo_engine::formulas::{estimate_average_one_rm, estimate_max_reps, estimate_one_rm, Formula};
use bilbo_engine::one_rm::is_within_bilbo_tolerance;
use bilbo_engine::pipeline::{seed_one_rm_from_default_weight, BilboProcessor, ProgressReport, SessionEntry};
use bilbo_engine::types::OneRmSource;
use bilbo_engine::units::{UnitConverter, WeightUnit};
use bilbo_engine::{EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// Bilbo - 1RM estimation and BILBO progressive overload
#[derive(Parser)]
#[command(name = "bilbo")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Estimate one-rep maxes and track BILBO progression", long_about = None)]
struct Cli {
    /// Policy configuration file (JSON). Applies to init, plan and doctor;
    /// log, run and report use the policy saved in the state file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Unit for weights on the command line and in text output
    #[arg(long, global = true, default_value = "kg")]
    unit: UnitArg,

    /// Reference time (RFC 3339); defaults to the current time
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate a one-rep max from a single set
    Estimate {
        weight: f64,
        reps: u32,

        #[arg(long, default_value = "epley")]
        formula: FormulaArg,

        /// Print every formula and their mean
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate achievable reps at a weight for a known 1RM
    MaxReps {
        weight: f64,
        one_rm: f64,

        #[arg(long, default_value = "epley")]
        formula: FormulaArg,
    },

    /// Show the BILBO training weight for a 1RM
    Plan {
        one_rm: f64,

        /// Check whether this weight is close enough to the BILBO weight
        #[arg(long)]
        check: Option<f64>,
    },

    /// Start tracking an exercise and write its state file
    Init {
        /// State file to create
        #[arg(short, long)]
        state: PathBuf,

        /// Known one-rep max
        #[arg(long, conflicts_with = "default_weight")]
        one_rm: Option<f64>,

        /// Seed the 1RM as twice the exercise's usual working weight
        #[arg(long)]
        default_weight: Option<f64>,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Log one session against a state file
    Log {
        #[arg(short, long)]
        state: PathBuf,

        /// Weight used
        weight: f64,

        /// Reps completed
        reps: u32,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Apply NDJSON session entries from stdin (streaming mode)
    Run {
        #[arg(short, long)]
        state: PathBuf,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Print a progress report for a state file
    Report {
        #[arg(short, long)]
        state: PathBuf,

        /// Recalculate the 1RM from history first when it moved by more than 5%
        #[arg(long)]
        recalculate: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and state files
    Doctor {
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormulaArg {
    Epley,
    Brzycki,
    Lombardi,
    Oconnor,
    Wathan,
}

impl From<FormulaArg> for Formula {
    fn from(arg: FormulaArg) -> Self {
        match arg {
            FormulaArg::Epley => Formula::Epley,
            FormulaArg::Brzycki => Formula::Brzycki,
            FormulaArg::Lombardi => Formula::Lombardi,
            FormulaArg::Oconnor => Formula::OConnor,
            FormulaArg::Wathan => Formula::Wathan,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Kg,
    Lb,
}

impl From<UnitArg> for WeightUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Kg => WeightUnit::Kilograms,
            UnitArg::Lb => WeightUnit::Pounds,
        }
    }
}

/// Settings shared by every command
struct Context {
    policy: PolicyConfig,
    units: UnitConverter,
    now: DateTime<Utc>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), BilboCliError> {
    let ctx = Context {
        policy: load_policy(cli.config.as_deref())?,
        units: UnitConverter::new(cli.unit.into()),
        now: parse_now(cli.now.as_deref())?,
    };

    match cli.command {
        Commands::Estimate {
            weight,
            reps,
            formula,
            all,
            json,
        } => cmd_estimate(&ctx, weight, reps, formula.into(), all, json),

        Commands::MaxReps {
            weight,
            one_rm,
            formula,
        } => cmd_max_reps(&ctx, weight, one_rm, formula.into()),

        Commands::Plan { one_rm, check } => cmd_plan(&ctx, one_rm, check),

        Commands::Init {
            state,
            one_rm,
            default_weight,
            force,
        } => cmd_init(&ctx, &state, one_rm, default_weight, force),

        Commands::Log {
            state,
            weight,
            reps,
            notes,
        } => cmd_log(&ctx, &state, weight, reps, &notes),

        Commands::Run { state, flush } => cmd_run(&ctx, &state, flush),

        Commands::Report {
            state,
            recalculate,
            json,
        } => cmd_report(&ctx, &state, recalculate, json),

        Commands::Doctor { state, json } => cmd_doctor(cli.config.as_deref(), state.as_deref(), json),
    }
}

fn load_policy(path: Option<&Path>) -> Result<PolicyConfig, BilboCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(PolicyConfig::from_json(&json)?)
        }
        None => Ok(PolicyConfig::default()),
    }
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, BilboCliError> {
    match now {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| BilboCliError::ParseError(format!("Invalid --now timestamp '{}': {}", s, e))),
        None => Ok(Utc::now()),
    }
}

fn load_processor(path: &Path) -> Result<BilboProcessor, BilboCliError> {
    if !path.exists() {
        return Err(BilboCliError::MissingState(path.to_path_buf()));
    }
    let json = fs::read_to_string(path)?;
    Ok(BilboProcessor::from_state_json(&json)?)
}

fn save_processor(processor: &BilboProcessor, path: &Path) -> Result<(), BilboCliError> {
    fs::write(path, processor.save_state()?)?;
    info!(path = %path.display(), "state saved");
    Ok(())
}

fn cmd_estimate(
    ctx: &Context,
    weight: f64,
    reps: u32,
    formula: Formula,
    all: bool,
    json: bool,
) -> Result<(), BilboCliError> {
    let weight_kg = ctx.units.to_kilograms(weight);

    let rows: Vec<(Formula, f64)> = if all {
        Formula::all()
            .into_iter()
            .map(|f| (f, estimate_one_rm(weight_kg, reps, f)))
            .collect()
    } else {
        vec![(formula, estimate_one_rm(weight_kg, reps, formula))]
    };
    let average = all.then(|| estimate_average_one_rm(weight_kg, reps));

    if json {
        let estimates: Vec<serde_json::Value> = rows
            .iter()
            .map(|(f, value)| serde_json::json!({ "formula": f, "one_rep_max_kg": value }))
            .collect();
        let output = serde_json::json!({
            "weight_kg": weight_kg,
            "reps": reps,
            "estimates": estimates,
            "average_kg": average,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (f, value) in &rows {
        println!("{:<10} {}", f.display_name(), ctx.units.format(*value));
    }
    if let Some(average) = average {
        println!("{:<10} {}", "Average", ctx.units.format(average));
    }
    Ok(())
}

fn cmd_max_reps(ctx: &Context, weight: f64, one_rm: f64, formula: Formula) -> Result<(), BilboCliError> {
    let reps = estimate_max_reps(
        ctx.units.to_kilograms(weight),
        ctx.units.to_kilograms(one_rm),
        formula,
    );
    println!("{}", reps);
    Ok(())
}

fn cmd_plan(ctx: &Context, one_rm: f64, check: Option<f64>) -> Result<(), BilboCliError> {
    let one_rm_kg = ctx.units.to_kilograms(one_rm);
    let bilbo_weight = ctx.policy.bilbo_weight(one_rm_kg);

    println!("1RM:            {}", ctx.units.format(one_rm_kg));
    println!("BILBO weight:   {}", ctx.units.format(bilbo_weight));
    println!(
        "Target reps:    {}+ (progress above {})",
        ctx.policy.progression_rep_threshold, ctx.policy.progression_rep_threshold
    );
    println!(
        "Progression:    +{} per successful session",
        ctx.units.format(ctx.policy.progression_increment)
    );

    if let Some(weight) = check {
        let weight_kg = ctx.units.to_kilograms(weight);
        let verdict = if is_within_bilbo_tolerance(weight_kg, bilbo_weight) {
            "within 10% of the BILBO weight"
        } else {
            "outside 10% of the BILBO weight"
        };
        println!("Check:          {} is {}", ctx.units.format(weight_kg), verdict);
    }
    Ok(())
}

fn cmd_init(
    ctx: &Context,
    state: &Path,
    one_rm: Option<f64>,
    default_weight: Option<f64>,
    force: bool,
) -> Result<(), BilboCliError> {
    if state.exists() && !force {
        return Err(BilboCliError::StateExists(state.to_path_buf()));
    }

    let one_rm_kg = match (one_rm, default_weight) {
        (Some(one_rm), _) => ctx.units.to_kilograms(one_rm),
        (None, Some(weight)) => seed_one_rm_from_default_weight(ctx.units.to_kilograms(weight)),
        (None, None) => {
            return Err(BilboCliError::ParseError(
                "Either --one-rm or --default-weight is required".to_string(),
            ))
        }
    };

    let processor = BilboProcessor::with_policy(one_rm_kg, OneRmSource::Manual, ctx.policy.clone(), ctx.now);
    save_processor(&processor, state)?;

    println!(
        "Tracking started: 1RM {}, training weight {}",
        ctx.units.format(one_rm_kg),
        ctx.units.format(processor.tracker().state().training_weight)
    );
    Ok(())
}

fn cmd_log(ctx: &Context, state: &Path, weight: f64, reps: u32, notes: &str) -> Result<(), BilboCliError> {
    let mut processor = load_processor(state)?;
    let record = processor.log_session(ctx.units.to_kilograms(weight), reps, notes, ctx.now)?;
    save_processor(&processor, state)?;

    let tracker = processor.tracker();
    println!(
        "Logged {} x {} on {}",
        ctx.units.format(record.weight_used),
        record.reps_completed,
        record.performed_at.format("%Y-%m-%d")
    );
    if tracker.should_progress() {
        println!("Progress! Next session: {}", ctx.units.format(tracker.state().training_weight));
    } else {
        println!("Next session: {}", ctx.units.format(tracker.state().training_weight));
    }
    Ok(())
}

fn cmd_run(ctx: &Context, state: &Path, flush: bool) -> Result<(), BilboCliError> {
    let mut processor = load_processor(state)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut rejected = 0usize;

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let result = serde_json::from_str::<SessionEntry>(trimmed)
            .map_err(EngineError::from)
            .and_then(|entry| processor.apply_entry(&entry, ctx.now));

        match result {
            Ok(record) => {
                let output = serde_json::json!({
                    "session": record,
                    "training_weight": processor.tracker().state().training_weight,
                });
                writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
                if flush {
                    stdout.flush()?;
                }
            }
            Err(e) => {
                rejected += 1;
                warn!(line = index + 1, error = %e, "rejected session entry");
            }
        }
    }

    save_processor(&processor, state)?;

    if rejected > 0 {
        warn!(rejected, "some session entries were not applied");
    }
    Ok(())
}

fn cmd_report(ctx: &Context, state: &Path, recalculate: bool, json: bool) -> Result<(), BilboCliError> {
    let mut processor = load_processor(state)?;

    if recalculate {
        if let Some(one_rm) = processor.recalculate_one_rm(ctx.now) {
            info!(one_rm, "one-rep max recalculated from history");
            save_processor(&processor, state)?;
        }
    }

    let report = processor.report(ctx.now);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &ctx.units);
    }
    Ok(())
}

fn print_report(report: &ProgressReport, units: &UnitConverter) {
    let source = if report.one_rep_max_source.is_auto_calculated() {
        format!("auto, {}", report.formula)
    } else {
        "manual".to_string()
    };

    println!("BILBO Progress Report");
    println!("=====================");
    println!("1RM:              {} ({})", units.format(report.one_rep_max), source);
    println!(
        "Training weight:  {} ({:.1}% of 1RM{})",
        units.format(report.training_weight),
        report.current_percentage,
        if report.in_correct_range { "" } else { ", outside 45-55%" }
    );
    println!("Next session:     {}", units.format(report.suggested_next_weight));
    println!("Reps in reserve:  {}", report.estimated_reps_in_reserve);
    println!("Progress:         {:.0}%", report.progress_percentage);

    if report.should_recalculate_one_rm {
        println!("\n1RM is more than a week old; consider recalculating.");
    }
    if let Some(proposed) = report.proposed_one_rep_max {
        println!("History suggests a 1RM of {}.", units.format(proposed));
    }

    let stats = &report.stats;
    println!("\nSessions:         {}", stats.total_sessions);
    if stats.total_sessions > 0 {
        println!("Average weight:   {}", units.format(stats.avg_weight));
        println!("Max weight:       {}", units.format(stats.max_weight));
        println!("Average reps:     {:.1}", stats.avg_reps);
        println!("Max reps:         {}", stats.max_reps);
        println!("Total volume:     {}", units.format(stats.total_volume));

        let improvement = &report.improvement;
        println!(
            "Improvement:      {:+.2} weight, {:+} reps, {:+.1}% volume",
            units.from_kilograms(improvement.weight_increase),
            improvement.reps_increase,
            improvement.percentage_improvement
        );
    }
}

fn cmd_doctor(config: Option<&Path>, state: Option<&Path>, json: bool) -> Result<(), BilboCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Bilbo engine version {}", ENGINE_VERSION),
    });

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match PolicyConfig::from_json(&content) {
                Ok(_) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: "Policy configuration valid".to_string(),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid policy configuration: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default policy".to_string(),
        });
    }

    if let Some(state_path) = state {
        let check = if !state_path.exists() {
            DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(state_path) {
                Ok(content) => match BilboProcessor::from_state_json(&content) {
                    Ok(processor) => DoctorCheck {
                        name: "state".to_string(),
                        status: if processor.tracker().is_in_correct_range() {
                            CheckStatus::Ok
                        } else {
                            CheckStatus::Warning
                        },
                        message: format!(
                            "State file valid ({} sessions, training weight at {:.1}% of 1RM)",
                            processor.history().len(),
                            processor.tracker().current_percentage()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "state".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid state file: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read state file: {}", e),
                },
            }
        };
        checks.push(check);
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Bilbo Doctor Report");
        println!("===================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BilboCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum BilboCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    MissingState(PathBuf),
    StateExists(PathBuf),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BilboCliError {
    fn from(e: io::Error) -> Self {
        BilboCliError::Io(e)
    }
}

impl From<EngineError> for BilboCliError {
    fn from(e: EngineError) -> Self {
        BilboCliError::Engine(e)
    }
}

impl From<serde_json::Error> for BilboCliError {
    fn from(e: serde_json::Error) -> Self {
        BilboCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BilboCliError> for CliError {
    fn from(e: BilboCliError) -> Self {
        match e {
            BilboCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BilboCliError::Engine(EngineError::InvalidSample(e)) => CliError {
                code: "INVALID_SAMPLE".to_string(),
                message: e.to_string(),
                hint: Some("Sessions need a positive weight and at least one rep".to_string()),
            },
            BilboCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'bilbo doctor --config <file>' for details".to_string()),
            },
            BilboCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that the state file was written by bilbo".to_string()),
            },
            BilboCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BilboCliError::MissingState(path) => CliError {
                code: "MISSING_STATE".to_string(),
                message: format!("State file not found: {}", path.display()),
                hint: Some("Create it with 'bilbo init --state <file> --one-rm <kg>'".to_string()),
            },
            BilboCliError::StateExists(path) => CliError {
                code: "STATE_EXISTS".to_string(),
                message: format!("State file already exists: {}", path.display()),
                hint: Some("Pass --force to overwrite it".to_string()),
            },
            BilboCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BilboCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check command-line arguments".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
