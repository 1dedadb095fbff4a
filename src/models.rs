use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::classify::{self, GlucoseThresholds};

/// Ordinal glucose severity band. Variants are declared low to high so the
/// derived `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClassifiedLevel {
    Low,
    Normal,
    High,
    VeryHigh,
}

impl ClassifiedLevel {
    pub fn label(self) -> &'static str {
        match self {
            ClassifiedLevel::Low => "low",
            ClassifiedLevel::Normal => "normal",
            ClassifiedLevel::High => "high",
            ClassifiedLevel::VeryHigh => "very high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MealContext {
    Fasting,
    BeforeMeal,
    AfterMeal,
    Bedtime,
    Other,
}

impl MealContext {
    pub fn as_str(self) -> &'static str {
        match self {
            MealContext::Fasting => "fasting",
            MealContext::BeforeMeal => "before_meal",
            MealContext::AfterMeal => "after_meal",
            MealContext::Bedtime => "bedtime",
            MealContext::Other => "other",
        }
    }
}

impl fmt::Display for MealContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "fasting" => Ok(MealContext::Fasting),
            "before_meal" | "pre_meal" => Ok(MealContext::BeforeMeal),
            "after_meal" | "post_meal" => Ok(MealContext::AfterMeal),
            "bedtime" => Ok(MealContext::Bedtime),
            "other" => Ok(MealContext::Other),
            other => anyhow::bail!("unknown meal context: {other}"),
        }
    }
}

/// A glucose row as it comes from storage or import, before classification.
#[derive(Debug, Clone)]
pub struct ReadingRecord {
    pub id: Uuid,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub meal_context: Option<MealContext>,
    pub notes: Option<String>,
}

/// A glucose reading whose `level` was derived from the thresholds active
/// when it was loaded. Levels are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseReading {
    pub id: Uuid,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub meal_context: Option<MealContext>,
    pub notes: Option<String>,
    pub level: ClassifiedLevel,
}

impl GlucoseReading {
    pub fn classify(record: ReadingRecord, thresholds: &GlucoseThresholds) -> Self {
        Self {
            level: classify::classify(record.value, thresholds),
            id: record.id,
            value: record.value,
            timestamp: record.timestamp,
            meal_context: record.meal_context,
            notes: record.notes,
        }
    }

    /// Recompute `level` after the value or the thresholds changed.
    pub fn reclassify(&mut self, thresholds: &GlucoseThresholds) {
        self.level = classify::classify(self.value, thresholds);
    }
}

/// Explicit `[start, end]` instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn last_days(end: DateTime<Utc>, days: i64) -> Self {
        Self::new(end - Duration::days(days.max(1)), end)
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + self.length() / 2
    }

    /// The equal-length window ending where this one starts.
    pub fn preceding(&self) -> Self {
        Self {
            start: self.start - self.length(),
            end: self.start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl TrendDirection {
    pub fn label(self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Stable => "stable",
            TrendDirection::Decreasing => "decreasing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtremeReading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandCounts {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub very_high: usize,
}

impl BandCounts {
    pub fn total(&self) -> usize {
        self.low + self.normal + self.high + self.very_high
    }

    pub fn get(&self, level: ClassifiedLevel) -> usize {
        match level {
            ClassifiedLevel::Low => self.low,
            ClassifiedLevel::Normal => self.normal,
            ClassifiedLevel::High => self.high,
            ClassifiedLevel::VeryHigh => self.very_high,
        }
    }
}

/// Percentages of readings below, inside and above the target range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeInRange {
    pub below: Option<f64>,
    pub in_range: Option<f64>,
    pub above: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMean {
    pub day: NaiveDate,
    pub mean: f64,
    pub count: usize,
}

/// Statistics for one period. `None` means "no data", never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub thresholds: GlucoseThresholds,
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<ExtremeReading>,
    pub max: Option<ExtremeReading>,
    pub std_dev: Option<f64>,
    pub cv: Option<f64>,
    pub band_counts: BandCounts,
    pub time_in_range: TimeInRange,
    pub trend: Option<TrendDirection>,
    pub daily: Vec<DailyMean>,
}

#[derive(Debug, Clone)]
pub struct InsulinDose {
    pub id: Uuid,
    pub units: f64,
    pub insulin_type: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MedicationLog {
    pub id: Uuid,
    pub name: String,
    pub dosage: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub id: Uuid,
    pub activity_type: String,
    pub duration_minutes: i32,
    pub intensity: Option<String>,
    pub timestamp: DateTime<Utc>,
}
