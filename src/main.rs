use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{error, warn};
use uuid::Uuid;

use liftrs::config::AppConfig;
use liftrs::database::SqliteStore;
use liftrs::engine::TrainingEngine;
use liftrs::error::{ErrorSeverity, LiftRsError};
use liftrs::forecast::PrPrediction;
use liftrs::import::SetCsvImporter;
use liftrs::logging::{init_logging, LogLevel};
use liftrs::overload::ProgressionSuggestion;
use liftrs::recovery::{MuscleRecoveryReport, RecoveryStatus};

/// LiftRS - Strength Training Intelligence CLI
///
/// Tracks muscle recovery, suggests progressive overload, forecasts
/// personal records and awards achievements from logged sets.
#[derive(Parser)]
#[command(name = "liftrs")]
#[command(author = "LiftRS Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Strength Training Intelligence CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// User to act for (defaults to settings.default_user_id)
    #[arg(short, long)]
    user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import set history from a CSV file
    Import {
        /// Input file path
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Record a completed workout from a CSV of its sets
    Complete {
        /// CSV file with one row per set, including muscle_group
        #[arg(short, long)]
        file: PathBuf,

        /// Workout identifier (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Completion time, RFC 3339 or YYYY-MM-DD (default: now); must fall on the CSV's date
        #[arg(long)]
        at: Option<String>,

        /// Workout duration in minutes
        #[arg(short, long, default_value = "60")]
        duration: u32,

        /// Personal records set during the workout
        #[arg(long, default_value = "0")]
        prs: u32,
    },

    /// Show recovery status per muscle group
    Recovery {
        /// Only list muscle groups ready to train
        #[arg(short, long)]
        ready: bool,

        /// Evaluate at this time instead of now
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Progressive overload suggestions
    Suggest {
        /// Single exercise (default: all recently trained)
        #[arg(short, long)]
        exercise: Option<String>,

        /// Evaluate at this date instead of today
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Personal record predictions
    Predict {
        /// Single exercise (default: all recently trained)
        #[arg(short, long)]
        exercise: Option<String>,

        /// Evaluate at this time instead of now
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Lifetime stats, level and achievements
    Stats,

    /// Show or initialise the configuration file
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct RecoveryRow {
    #[tabled(rename = "Muscle")]
    muscle: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Recovered")]
    percent: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Last trained")]
    last_trained: String,
}

impl From<&MuscleRecoveryReport> for RecoveryRow {
    fn from(report: &MuscleRecoveryReport) -> Self {
        RecoveryRow {
            muscle: report.muscle_group.to_string(),
            status: report.status.to_string(),
            percent: format!("{}%", report.recovery_percent),
            remaining: format!("{:.1} h", report.hours_remaining),
            last_trained: report
                .last_trained_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
struct SuggestionRow {
    #[tabled(rename = "Exercise")]
    exercise: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Suggested")]
    suggested: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&ProgressionSuggestion> for SuggestionRow {
    fn from(s: &ProgressionSuggestion) -> Self {
        SuggestionRow {
            exercise: s.exercise_id.clone(),
            current: format!("{:.1}", s.current_weight),
            suggested: format!("{:.1}", s.suggested_weight),
            confidence: s.confidence.to_string(),
            trend: s.trend.to_string(),
            reason: s.reason.clone(),
        }
    }
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Exercise")]
    exercise: String,
    #[tabled(rename = "Current e1RM")]
    current_max: String,
    #[tabled(rename = "Predicted")]
    predicted_max: String,
    #[tabled(rename = "Attempt")]
    suggested: String,
    #[tabled(rename = "R²")]
    confidence: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "PR ready")]
    ready: String,
}

impl From<&PrPrediction> for PredictionRow {
    fn from(p: &PrPrediction) -> Self {
        PredictionRow {
            exercise: p.exercise_id.clone(),
            current_max: format!("{:.1}", p.current_max),
            predicted_max: format!("{:.1}", p.predicted_max),
            suggested: format!("{:.1}", p.suggested_weight),
            confidence: format!("{:.2}", p.confidence),
            trend: p.trend.to_string(),
            ready: if p.ready_for_pr { "yes" } else { "no" }.to_string(),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Parse an RFC 3339 timestamp or a bare date (midnight UTC)
fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid time '{}', expected RFC 3339 or YYYY-MM-DD", value))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("Invalid date: {}", value))
}

fn instant_or_now(value: Option<&str>) -> Result<DateTime<Utc>> {
    value.map(parse_instant).unwrap_or_else(|| Ok(Utc::now()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // an explicit --config must load; only the implicit default may fall back
    let (config_path, config, config_error) = match cli.config.clone() {
        Some(path) => {
            let config = AppConfig::load_from_file(&path)?;
            (path, config, None)
        }
        None => {
            let path = AppConfig::default_config_path();
            let (config, err) = AppConfig::load_or_default(&path);
            (path, config, err)
        }
    };

    let mut log_config = config.logging.clone();
    log_config.level = LogLevel::from_verbosity(log_config.level, cli.verbose);
    init_logging(&log_config)?;

    if let Some(err) = config_error {
        warn!(
            path = %config_path.display(),
            error = %format!("{err:#}"),
            "Config not loaded, using defaults"
        );
    }

    run(cli, config, &config_path).map_err(report_failure)
}

/// Log a library error at its severity and reduce it to the user-facing message
fn report_failure(err: anyhow::Error) -> anyhow::Error {
    let Some(lift_err) = err.downcast_ref::<LiftRsError>() else {
        return err;
    };

    let retryable = lift_err.is_retryable();
    match lift_err.severity() {
        ErrorSeverity::Critical => error!(error = %lift_err, "Training data is damaged"),
        ErrorSeverity::Error => error!(error = %lift_err, retryable, "Command failed"),
        ErrorSeverity::Warning => warn!(error = %lift_err, "Command rejected its input"),
    }

    if retryable {
        anyhow!("{} The database is busy, try again.", lift_err.user_message())
    } else {
        anyhow!(lift_err.user_message())
    }
}

fn run(cli: Cli, mut config: AppConfig, config_path: &Path) -> Result<()> {
    if let Commands::Config { init } = cli.command {
        if init && !config_path.exists() {
            config.save_to_file(config_path)?;
            println!(
                "{}",
                format!("✓ Wrote default config to {}", config_path.display()).green()
            );
        }
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let user_id = config
        .resolve_user(cli.user.clone())
        .ok_or_else(|| anyhow!("No user given; pass --user or set settings.default_user_id"))?;

    let database_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.settings.database_path.clone());
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }

    let store = SqliteStore::open(&database_path)?;
    let mut engine = TrainingEngine::with_config(store, &config.engine);

    match cli.command {
        Commands::Import { file } => {
            let sets = SetCsvImporter::new().import_file(&file)?;
            let records: Vec<_> = sets.iter().map(|s| s.to_record()).collect();
            let inserted = engine.store_mut().insert_sets(&user_id, None, &records)?;

            if cli.json {
                print_json(&serde_json::json!({ "imported": inserted }))?;
            } else {
                println!("{}", format!("✓ Imported {} sets", inserted).green());
            }
        }

        Commands::Complete {
            file,
            id,
            at,
            duration,
            prs,
        } => {
            let sets = SetCsvImporter::new().import_file(&file)?;
            let completed_at = instant_or_now(at.as_deref())?;
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

            let workout = SetCsvImporter::workout_from_sets(&id, completed_at, duration, prs, &sets)?;
            engine.store_mut().insert_workout(&user_id, &workout)?;
            let completion = engine.complete_workout(&user_id, &workout)?;

            if cli.json {
                print_json(&completion)?;
            } else {
                println!("{}", format!("✓ Workout {} recorded", completion.workout_id).green().bold());
                for state in &completion.recovery {
                    println!(
                        "  {:<10} {} sets, recovery window {:.0} h",
                        state.muscle_group.to_string(),
                        state.total_sets,
                        state.recovery_hours
                    );
                }
                println!(
                    "  Streak: {} day(s), level {}",
                    completion.stats.current_streak, completion.stats.current_level
                );
                for name in &completion.unlocked {
                    println!("  {} {}", "🏆 Unlocked:".yellow().bold(), name);
                }
            }
        }

        Commands::Recovery { ready, as_of } => {
            let now = instant_or_now(as_of.as_deref())?;
            let reports = if ready {
                engine.suggested_muscles(&user_id, now)?
            } else {
                engine.recovery_status(&user_id, now)?
            };

            if cli.json {
                print_json(&reports)?;
            } else {
                println!("{}", "Muscle recovery".cyan().bold());
                print_table(reports.iter().map(RecoveryRow::from).collect());

                let fatigued = reports
                    .iter()
                    .filter(|r| r.status == RecoveryStatus::Fatigued)
                    .count();
                if fatigued > 0 {
                    println!("{}", format!("{} muscle group(s) still fatigued", fatigued).red());
                }
            }
        }

        Commands::Suggest { exercise, as_of } => {
            let today = instant_or_now(as_of.as_deref())?.date_naive();
            let suggestions = match exercise {
                Some(exercise_id) => engine
                    .suggestion(&user_id, &exercise_id)?
                    .into_iter()
                    .collect(),
                None => engine.suggestions(&user_id, today)?,
            };

            if cli.json {
                print_json(&suggestions)?;
            } else if suggestions.is_empty() {
                println!("{}", "Not enough history for suggestions yet".yellow());
            } else {
                println!("{}", "Progressive overload".cyan().bold());
                print_table(suggestions.iter().map(SuggestionRow::from).collect());
            }
        }

        Commands::Predict { exercise, as_of } => {
            let now = instant_or_now(as_of.as_deref())?;
            let predictions = match exercise {
                Some(exercise_id) => engine
                    .prediction(&user_id, &exercise_id, now)?
                    .into_iter()
                    .collect(),
                None => engine.predictions(&user_id, now)?,
            };

            if cli.json {
                print_json(&predictions)?;
            } else if predictions.is_empty() {
                println!("{}", "Not enough history for PR predictions yet".yellow());
            } else {
                println!("{}", "PR forecast".cyan().bold());
                print_table(predictions.iter().map(PredictionRow::from).collect());
            }
        }

        Commands::Stats => {
            let stats = engine.stats(&user_id)?;
            let level = engine.level_summary(&user_id)?;

            if cli.json {
                print_json(&serde_json::json!({ "stats": stats, "level": level }))?;
            } else {
                match (stats, level) {
                    (Some(stats), Some(level)) => {
                        println!(
                            "{}",
                            format!("Level {} · {}", level.level, level.title).magenta().bold()
                        );
                        println!(
                            "  XP: {} / {} ({:.1}%)",
                            level.total_xp, level.xp_for_next_level, level.progress_percent
                        );
                        println!("  Workouts: {}", stats.total_workouts);
                        println!("  Sets: {}  Reps: {}", stats.total_sets, stats.total_reps);
                        println!("  Total weight: {:.0} kg", stats.total_weight);
                        println!("  PRs: {}", stats.total_prs);
                        println!(
                            "  Streak: {} (longest {})",
                            stats.current_streak, stats.longest_streak
                        );
                    }
                    _ => println!("{}", "No workouts recorded yet".yellow()),
                }
            }
        }

        // handled before the store is opened
        Commands::Config { .. } => {}
    }

    Ok(())
}
