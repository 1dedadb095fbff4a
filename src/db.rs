use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::classify::{GlucoseThresholds, ThresholdOverrides};
use crate::models::{
    ActivityLog, GlucoseReading, InsulinDose, MealContext, MedicationLog, Period, ReadingRecord,
};
use crate::voice::VoiceInterpretation;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let users = vec![
        ("avery.lee@example.com", "Avery Lee", None),
        (
            "jules.moreno@example.com",
            "Jules Moreno",
            Some(GlucoseThresholds {
                hypo_threshold: 65,
                target_low: 80,
                target_high: 160,
                hyper_threshold: 220,
            }),
        ),
    ];

    let pattern = [
        (7, 96.0, MealContext::Fasting),
        (12, 148.0, MealContext::AfterMeal),
        (18, 121.0, MealContext::BeforeMeal),
        (22, 134.0, MealContext::Bedtime),
    ];
    let today = Utc::now().date_naive();
    let mut inserted = 0usize;

    for (index, (email, name, thresholds)) in users.into_iter().enumerate() {
        let user_id = ensure_user(pool, email, Some(name)).await?;
        if let Some(thresholds) = thresholds {
            update_thresholds(pool, email, &thresholds).await?;
        }

        for days_ago in 0..14i64 {
            let day = today - Duration::days(days_ago);
            for (slot, (hour, base, context)) in pattern.iter().enumerate() {
                let at = day
                    .and_hms_opt(*hour, 0, 0)
                    .context("invalid seed time")?
                    .and_utc();
                if at > Utc::now() {
                    continue;
                }
                let wobble = ((days_ago * 7 + slot as i64 * 13 + index as i64 * 5) % 60) as f64;
                let value = base - 35.0 + wobble * 1.6;
                let record = ReadingRecord {
                    id: Uuid::new_v4(),
                    value,
                    timestamp: at,
                    meal_context: Some(*context),
                    notes: None,
                };
                let source_key = format!("seed-{email}-{day}-{slot}");
                if insert_reading(pool, user_id, &record, Some(&source_key)).await? {
                    inserted += 1;
                }
            }
        }
    }

    let avery = fetch_user_id(pool, "avery.lee@example.com").await?;
    let yesterday = Utc::now() - Duration::days(1);
    insert_insulin(
        pool,
        avery,
        &InsulinDose {
            id: Uuid::new_v4(),
            units: 6.0,
            insulin_type: "rapid".to_string(),
            timestamp: yesterday,
            notes: Some("before dinner".to_string()),
        },
    )
    .await?;
    insert_activity(
        pool,
        avery,
        &ActivityLog {
            id: Uuid::new_v4(),
            activity_type: "walking".to_string(),
            duration_minutes: 35,
            intensity: Some("moderate".to_string()),
            timestamp: yesterday,
        },
    )
    .await?;
    insert_medication(
        pool,
        avery,
        &MedicationLog {
            id: Uuid::new_v4(),
            name: "metformin".to_string(),
            dosage: Some("500 mg".to_string()),
            timestamp: yesterday,
        },
    )
    .await?;

    log::info!("seeded {inserted} glucose readings");
    Ok(inserted)
}

pub async fn ensure_user(
    pool: &PgPool,
    email: &str,
    full_name: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO glucose_insights.users (id, email, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = COALESCE($4, glucose_insights.users.full_name)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name.unwrap_or(email))
    .bind(full_name)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub async fn fetch_user_id(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM glucose_insights.users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user with email {email}"))?;
    Ok(row.get("id"))
}

/// Active thresholds for a user, each unset column taking its default.
pub async fn fetch_thresholds(pool: &PgPool, email: &str) -> anyhow::Result<GlucoseThresholds> {
    let row = sqlx::query(
        r#"
        SELECT hypo_threshold, target_low, target_high, hyper_threshold
        FROM glucose_insights.users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no user with email {email}"))?;

    let overrides = ThresholdOverrides {
        hypo_threshold: row.get("hypo_threshold"),
        target_low: row.get("target_low"),
        target_high: row.get("target_high"),
        hyper_threshold: row.get("hyper_threshold"),
    };
    Ok(overrides.resolve())
}

pub async fn update_thresholds(
    pool: &PgPool,
    email: &str,
    thresholds: &GlucoseThresholds,
) -> anyhow::Result<()> {
    thresholds.validate()?;

    let result = sqlx::query(
        r#"
        UPDATE glucose_insights.users
        SET hypo_threshold = $2, target_low = $3, target_high = $4, hyper_threshold = $5
        WHERE email = $1
        "#,
    )
    .bind(email)
    .bind(thresholds.hypo_threshold)
    .bind(thresholds.target_low)
    .bind(thresholds.target_high)
    .bind(thresholds.hyper_threshold)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("no user with email {email}");
    }
    log::info!("updated glucose targets for {email}");
    Ok(())
}

/// Readings inside `period`, oldest first, classified against `thresholds`.
pub async fn fetch_readings(
    pool: &PgPool,
    email: &str,
    period: Period,
    thresholds: &GlucoseThresholds,
) -> anyhow::Result<Vec<GlucoseReading>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.value, r.recorded_at, r.meal_context, r.notes
        FROM glucose_insights.glucose_readings r
        JOIN glucose_insights.users u ON u.id = r.user_id
        WHERE u.email = $1 AND r.recorded_at >= $2 AND r.recorded_at <= $3
        ORDER BY r.recorded_at, r.id
        "#,
    )
    .bind(email)
    .bind(period.start)
    .bind(period.end)
    .fetch_all(pool)
    .await?;

    let readings: Vec<GlucoseReading> = rows
        .iter()
        .map(|row| GlucoseReading::classify(reading_from_row(row), thresholds))
        .collect();
    log::debug!("loaded {} readings for {email}", readings.len());
    Ok(readings)
}

fn reading_from_row(row: &PgRow) -> ReadingRecord {
    let meal_context: Option<String> = row.get("meal_context");
    ReadingRecord {
        id: row.get("id"),
        value: row.get("value"),
        timestamp: row.get("recorded_at"),
        meal_context: meal_context.and_then(|raw| match raw.parse::<MealContext>() {
            Ok(context) => Some(context),
            Err(err) => {
                log::warn!("ignoring stored meal context: {err}");
                None
            }
        }),
        notes: row.get("notes"),
    }
}

pub async fn fetch_reading(
    pool: &PgPool,
    email: &str,
    id: Uuid,
    thresholds: &GlucoseThresholds,
) -> anyhow::Result<GlucoseReading> {
    let row = sqlx::query(
        r#"
        SELECT r.id, r.value, r.recorded_at, r.meal_context, r.notes
        FROM glucose_insights.glucose_readings r
        JOIN glucose_insights.users u ON u.id = r.user_id
        WHERE u.email = $1 AND r.id = $2
        "#,
    )
    .bind(email)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no reading {id} for {email}"))?;

    Ok(GlucoseReading::classify(reading_from_row(&row), thresholds))
}

pub async fn update_reading(pool: &PgPool, reading: &GlucoseReading) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE glucose_insights.glucose_readings
        SET value = $2, meal_context = $3, notes = $4
        WHERE id = $1
        "#,
    )
    .bind(reading.id)
    .bind(reading.value)
    .bind(reading.meal_context.map(|context| context.as_str()))
    .bind(&reading.notes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_reading(pool: &PgPool, email: &str, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM glucose_insights.glucose_readings r
        USING glucose_insights.users u
        WHERE u.id = r.user_id AND u.email = $1 AND r.id = $2
        "#,
    )
    .bind(email)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Distinct UTC calendar days with at least one reading, newest first.
pub async fn fetch_reading_days(pool: &PgPool, email: &str) -> anyhow::Result<Vec<NaiveDate>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT (r.recorded_at AT TIME ZONE 'UTC')::date AS day
        FROM glucose_insights.glucose_readings r
        JOIN glucose_insights.users u ON u.id = r.user_id
        WHERE u.email = $1
        ORDER BY day DESC
        "#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("day")).collect())
}

/// Returns false when `source_key` was already imported.
pub async fn insert_reading(
    pool: &PgPool,
    user_id: Uuid,
    record: &ReadingRecord,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO glucose_insights.glucose_readings
        (id, user_id, value, recorded_at, meal_context, notes, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(user_id)
    .bind(record.value)
    .bind(record.timestamp)
    .bind(record.meal_context.map(|context| context.as_str()))
    .bind(&record.notes)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_insulin(pool: &PgPool, user_id: Uuid, dose: &InsulinDose) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO glucose_insights.insulin_doses
        (id, user_id, units, insulin_type, recorded_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(dose.id)
    .bind(user_id)
    .bind(dose.units)
    .bind(&dose.insulin_type)
    .bind(dose.timestamp)
    .bind(&dose.notes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_medication(
    pool: &PgPool,
    user_id: Uuid,
    medication: &MedicationLog,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO glucose_insights.medications (id, user_id, name, dosage, recorded_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(medication.id)
    .bind(user_id)
    .bind(&medication.name)
    .bind(&medication.dosage)
    .bind(medication.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_activity(
    pool: &PgPool,
    user_id: Uuid,
    activity: &ActivityLog,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO glucose_insights.activities
        (id, user_id, activity_type, duration_minutes, intensity, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(activity.id)
    .bind(user_id)
    .bind(&activity.activity_type)
    .bind(activity.duration_minutes)
    .bind(&activity.intensity)
    .bind(activity.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_insulin(
    pool: &PgPool,
    email: &str,
    period: Period,
) -> anyhow::Result<Vec<InsulinDose>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id, d.units, d.insulin_type, d.recorded_at, d.notes
        FROM glucose_insights.insulin_doses d
        JOIN glucose_insights.users u ON u.id = d.user_id
        WHERE u.email = $1 AND d.recorded_at >= $2 AND d.recorded_at <= $3
        ORDER BY d.recorded_at
        "#,
    )
    .bind(email)
    .bind(period.start)
    .bind(period.end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| InsulinDose {
            id: row.get("id"),
            units: row.get("units"),
            insulin_type: row.get("insulin_type"),
            timestamp: row.get("recorded_at"),
            notes: row.get("notes"),
        })
        .collect())
}

pub async fn fetch_activities(
    pool: &PgPool,
    email: &str,
    period: Period,
) -> anyhow::Result<Vec<ActivityLog>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.activity_type, a.duration_minutes, a.intensity, a.recorded_at
        FROM glucose_insights.activities a
        JOIN glucose_insights.users u ON u.id = a.user_id
        WHERE u.email = $1 AND a.recorded_at >= $2 AND a.recorded_at <= $3
        ORDER BY a.recorded_at
        "#,
    )
    .bind(email)
    .bind(period.start)
    .bind(period.end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ActivityLog {
            id: row.get("id"),
            activity_type: row.get("activity_type"),
            duration_minutes: row.get("duration_minutes"),
            intensity: row.get("intensity"),
            timestamp: row.get("recorded_at"),
        })
        .collect())
}

/// Stores a confirmed voice interpretation. Returns false for variants that
/// carry nothing to log.
pub async fn insert_interpretation(
    pool: &PgPool,
    user_id: Uuid,
    interpretation: &VoiceInterpretation,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    match interpretation {
        VoiceInterpretation::Glucose {
            value,
            meal_context,
            notes,
        } => {
            let record = ReadingRecord {
                id: Uuid::new_v4(),
                value: *value,
                timestamp: at,
                meal_context: *meal_context,
                notes: notes.clone(),
            };
            insert_reading(pool, user_id, &record, None).await
        }
        VoiceInterpretation::Insulin {
            units,
            insulin_type,
            notes,
        } => {
            let dose = InsulinDose {
                id: Uuid::new_v4(),
                units: *units,
                insulin_type: insulin_type.clone(),
                timestamp: at,
                notes: notes.clone(),
            };
            insert_insulin(pool, user_id, &dose).await?;
            Ok(true)
        }
        VoiceInterpretation::Medication { name, dosage } => {
            let medication = MedicationLog {
                id: Uuid::new_v4(),
                name: name.clone(),
                dosage: dosage.clone(),
                timestamp: at,
            };
            insert_medication(pool, user_id, &medication).await?;
            Ok(true)
        }
        VoiceInterpretation::Activity {
            activity_type,
            duration_minutes,
            intensity,
        } => {
            let activity = ActivityLog {
                id: Uuid::new_v4(),
                activity_type: activity_type.clone(),
                duration_minutes: *duration_minutes,
                intensity: intensity.clone(),
                timestamp: at,
            };
            insert_activity(pool, user_id, &activity).await?;
            Ok(true)
        }
        VoiceInterpretation::Unrecognized { .. } | VoiceInterpretation::ParseError { .. } => {
            Ok(false)
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct CsvReading {
    pub email: String,
    pub full_name: Option<String>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub meal_context: Option<String>,
    pub notes: Option<String>,
    pub source_key: Option<String>,
}

pub fn read_csv(csv_path: &Path) -> anyhow::Result<Vec<CsvReading>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<CsvReading>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        if !row.value.is_finite() {
            anyhow::bail!("CSV record {} has a non-finite glucose value", line + 1);
        }
        rows.push(row);
    }
    Ok(rows)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let rows = read_csv(csv_path)?;
    let mut inserted = 0usize;

    for row in rows {
        let user_id = ensure_user(pool, &row.email, row.full_name.as_deref()).await?;
        let meal_context = row
            .meal_context
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(str::parse::<MealContext>)
            .transpose()?;
        let record = ReadingRecord {
            id: Uuid::new_v4(),
            value: row.value,
            timestamp: row.timestamp,
            meal_context,
            notes: row.notes,
        };
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_reading(pool, user_id, &record, Some(&source_key)).await? {
            inserted += 1;
        }
    }

    log::info!("imported {inserted} readings from {}", csv_path.display());
    Ok(inserted)
}
