use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod classify;
mod config;
mod db;
mod metrics;
mod models;
mod report;
mod streak;
mod voice;

use crate::classify::{GlucoseThresholds, ThresholdOverrides};
use crate::models::{ActivityLog, InsulinDose, MealContext, MedicationLog, Period, ReadingRecord};

#[derive(Parser)]
#[command(name = "glucose-insights")]
#[command(about = "Glucose logging, metrics and reports for diabetes self-management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import glucose readings from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record a glucose reading
    LogGlucose {
        #[arg(long)]
        email: String,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        meal_context: Option<MealContext>,
        #[arg(long)]
        notes: Option<String>,
        /// RFC 3339 timestamp, defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Change a stored glucose reading
    EditGlucose {
        #[arg(long)]
        email: String,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        meal_context: Option<MealContext>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a stored glucose reading
    DeleteGlucose {
        #[arg(long)]
        email: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Record an insulin dose
    LogInsulin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        units: f64,
        #[arg(long, default_value = "rapid")]
        insulin_type: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Record a medication
    LogMedication {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        dosage: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Record physical activity
    LogActivity {
        #[arg(long)]
        email: String,
        #[arg(long)]
        activity_type: String,
        #[arg(long)]
        minutes: i32,
        #[arg(long)]
        intensity: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Change personal glucose targets; unset flags keep their current value
    SetTargets {
        #[arg(long)]
        email: String,
        #[arg(long)]
        hypo: Option<i32>,
        #[arg(long)]
        low: Option<i32>,
        #[arg(long)]
        high: Option<i32>,
        #[arg(long)]
        hyper: Option<i32>,
    },
    /// Classify a single value, against a user's targets if given
    Classify {
        #[arg(long)]
        value: f64,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print period statistics
    Summary {
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(i64).range(1..))]
        days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(i64).range(1..))]
        days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Show the consecutive-day logging streak
    Streak {
        #[arg(long)]
        email: String,
    },
    /// Check an extracted voice log and store it once confirmed
    Interpret {
        #[arg(long)]
        email: String,
        /// JSON produced by the speech extractor
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    config::init_logging();

    let cli = Cli::parse();

    if let Commands::Classify { value, email: None } = &cli.command {
        print_classification(*value, &GlucoseThresholds::default());
        return Ok(());
    }

    let app_config = config::AppConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(app_config.max_connections)
        .connect(&app_config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} readings).");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} readings from {}.", csv.display());
        }
        Commands::LogGlucose {
            email,
            value,
            meal_context,
            notes,
            at,
        } => {
            if !value.is_finite() {
                anyhow::bail!("glucose value must be a finite number");
            }
            let user_id = db::ensure_user(&pool, &email, None).await?;
            let record = ReadingRecord {
                id: Uuid::new_v4(),
                value,
                timestamp: at.unwrap_or_else(Utc::now),
                meal_context,
                notes,
            };
            let id = record.id;
            db::insert_reading(&pool, user_id, &record, None).await?;
            let thresholds = db::fetch_thresholds(&pool, &email).await?;
            println!(
                "Logged {value} mg/dL ({}) as {id}.",
                classify::classify(value, &thresholds).label()
            );
        }
        Commands::EditGlucose {
            email,
            id,
            value,
            meal_context,
            notes,
        } => {
            let thresholds = db::fetch_thresholds(&pool, &email).await?;
            let mut reading = db::fetch_reading(&pool, &email, id, &thresholds).await?;
            if let Some(value) = value {
                if !value.is_finite() {
                    anyhow::bail!("glucose value must be a finite number");
                }
                reading.value = value;
            }
            if meal_context.is_some() {
                reading.meal_context = meal_context;
            }
            if notes.is_some() {
                reading.notes = notes;
            }
            reading.reclassify(&thresholds);
            db::update_reading(&pool, &reading).await?;
            println!(
                "Updated reading {id}: {} mg/dL ({}).",
                reading.value,
                reading.level.label()
            );
        }
        Commands::DeleteGlucose { email, id } => {
            if db::delete_reading(&pool, &email, id).await? {
                println!("Deleted reading {id}.");
            } else {
                println!("No reading {id} for {email}.");
            }
        }
        Commands::LogInsulin {
            email,
            units,
            insulin_type,
            notes,
            at,
        } => {
            if !units.is_finite() || units <= 0.0 {
                anyhow::bail!("insulin units must be a positive number");
            }
            let user_id = db::ensure_user(&pool, &email, None).await?;
            let dose = InsulinDose {
                id: Uuid::new_v4(),
                units,
                insulin_type,
                timestamp: at.unwrap_or_else(Utc::now),
                notes,
            };
            db::insert_insulin(&pool, user_id, &dose).await?;
            println!("Logged {} units of {} insulin.", dose.units, dose.insulin_type);
        }
        Commands::LogMedication {
            email,
            name,
            dosage,
            at,
        } => {
            let user_id = db::ensure_user(&pool, &email, None).await?;
            let medication = MedicationLog {
                id: Uuid::new_v4(),
                name,
                dosage,
                timestamp: at.unwrap_or_else(Utc::now),
            };
            db::insert_medication(&pool, user_id, &medication).await?;
            println!("Logged medication {}.", medication.name);
        }
        Commands::LogActivity {
            email,
            activity_type,
            minutes,
            intensity,
            at,
        } => {
            if minutes <= 0 {
                anyhow::bail!("activity minutes must be positive");
            }
            let user_id = db::ensure_user(&pool, &email, None).await?;
            let activity = ActivityLog {
                id: Uuid::new_v4(),
                activity_type,
                duration_minutes: minutes,
                intensity,
                timestamp: at.unwrap_or_else(Utc::now),
            };
            db::insert_activity(&pool, user_id, &activity).await?;
            println!(
                "Logged {} minutes of {}.",
                activity.duration_minutes, activity.activity_type
            );
        }
        Commands::SetTargets {
            email,
            hypo,
            low,
            high,
            hyper,
        } => {
            let current = db::fetch_thresholds(&pool, &email).await?;
            let updated = ThresholdOverrides {
                hypo_threshold: hypo,
                target_low: low,
                target_high: high,
                hyper_threshold: hyper,
            }
            .apply_to(current);
            db::update_thresholds(&pool, &email, &updated).await?;
            println!(
                "Targets for {email}: {}-{} mg/dL, alerts below {} and above {} mg/dL.",
                updated.target_low,
                updated.target_high,
                updated.hypo_threshold,
                updated.hyper_threshold
            );
        }
        Commands::Classify { value, email } => {
            let thresholds = match email {
                Some(email) => db::fetch_thresholds(&pool, &email).await?,
                None => GlucoseThresholds::default(),
            };
            print_classification(value, &thresholds);
        }
        Commands::Summary { email, days, json } => {
            let thresholds = db::fetch_thresholds(&pool, &email).await?;
            let period = Period::last_days(Utc::now(), days);
            let readings = db::fetch_readings(&pool, &email, period, &thresholds).await?;
            let summary = metrics::summarize(&readings, period, &thresholds);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            if summary.count == 0 {
                println!("No readings found for this window.");
                return Ok(());
            }

            let show = |value: Option<f64>| match value {
                Some(value) => format!("{value:.1}"),
                None => "n/a".to_string(),
            };
            println!("Last {days} days for {email}:");
            println!("- readings: {}", summary.count);
            println!("- average: {} mg/dL", show(summary.mean));
            println!("- std dev: {} mg/dL", show(summary.std_dev));
            println!("- CV: {}%", show(summary.cv));
            println!(
                "- time in range: {}% below, {}% in range, {}% above",
                show(summary.time_in_range.below),
                show(summary.time_in_range.in_range),
                show(summary.time_in_range.above)
            );
            println!(
                "- trend: {}",
                summary.trend.map(|trend| trend.label()).unwrap_or("n/a")
            );
        }
        Commands::Report { email, days, out } => {
            let thresholds = db::fetch_thresholds(&pool, &email).await?;
            let period = Period::last_days(Utc::now(), days);
            let lookback = Period::new(period.preceding().start, period.end);
            let all = db::fetch_readings(&pool, &email, lookback, &thresholds).await?;
            let (previous, readings) = metrics::split_at(&all, period.start);
            let insulin = db::fetch_insulin(&pool, &email, period).await?;
            let activities = db::fetch_activities(&pool, &email, period).await?;

            let summary = metrics::summarize(&readings, period, &thresholds);
            let context = report::ReportContext {
                alerts: report::count_alerts(&readings, &thresholds),
                previous_trend: metrics::trend(&previous, &readings),
                insulin: report::insulin_totals(&insulin, days),
                activity: report::activity_totals(&activities),
                streak_days: current_streak(&pool, &email).await?,
            };
            let report = report::build_report(&email, &summary, &context);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Streak { email } => {
            let days = current_streak(&pool, &email).await?;
            println!("{email} has logged glucose {days} days in a row.");
            for badge in streak::earned_badges(days) {
                println!("- {} ({} days)", badge.title(), badge.required_days());
            }
        }
        Commands::Interpret {
            email,
            file,
            confirm,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let interpretation = voice::interpret(&raw);
            println!("Heard: {}", interpretation.describe());

            if !interpretation.is_loggable() {
                println!("Nothing to log.");
            } else if confirm {
                let user_id = db::ensure_user(&pool, &email, None).await?;
                db::insert_interpretation(&pool, user_id, &interpretation, Utc::now()).await?;
                println!("Saved.");
            } else {
                println!("Re-run with --confirm to save this entry.");
            }
        }
    }

    Ok(())
}

async fn current_streak(pool: &PgPool, email: &str) -> anyhow::Result<u32> {
    let days = db::fetch_reading_days(pool, email).await?;
    Ok(streak::streak(days, Utc::now().date_naive()))
}

fn print_classification(value: f64, thresholds: &GlucoseThresholds) {
    let level = classify::classify(value, thresholds);
    match classify::alert(value, thresholds) {
        Some(alert) => println!("{value} mg/dL is {} ({alert:?} alert).", level.label()),
        None => println!("{value} mg/dL is {}.", level.label()),
    }
}
