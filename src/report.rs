use std::fmt::Write;

use crate::classify::{self, GlucoseAlert, GlucoseThresholds};
use crate::models::{
    ActivityLog, ClassifiedLevel, ExtremeReading, GlucoseReading, InsulinDose, PeriodSummary,
    TrendDirection,
};
use crate::streak::{self, StreakBadge};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertCounts {
    pub hypo: usize,
    pub hyper: usize,
}

pub fn count_alerts(readings: &[GlucoseReading], thresholds: &GlucoseThresholds) -> AlertCounts {
    let mut counts = AlertCounts::default();
    for reading in readings {
        match classify::alert(reading.value, thresholds) {
            Some(GlucoseAlert::Hypo) => counts.hypo += 1,
            Some(GlucoseAlert::Hyper) => counts.hyper += 1,
            None => {}
        }
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsulinTotals {
    pub doses: usize,
    pub total_units: f64,
    pub daily_average: Option<f64>,
}

pub fn insulin_totals(doses: &[InsulinDose], days: i64) -> InsulinTotals {
    let total_units: f64 = doses.iter().map(|dose| dose.units).sum();
    InsulinTotals {
        doses: doses.len(),
        total_units,
        daily_average: if doses.is_empty() || days <= 0 {
            None
        } else {
            Some(total_units / days as f64)
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTotals {
    pub sessions: usize,
    pub total_minutes: i64,
}

pub fn activity_totals(activities: &[ActivityLog]) -> ActivityTotals {
    ActivityTotals {
        sessions: activities.len(),
        total_minutes: activities
            .iter()
            .map(|activity| i64::from(activity.duration_minutes))
            .sum(),
    }
}

#[derive(Debug, Clone)]
pub struct ReportContext {
    pub alerts: AlertCounts,
    pub previous_trend: Option<TrendDirection>,
    pub insulin: InsulinTotals,
    pub activity: ActivityTotals,
    pub streak_days: u32,
}

fn fmt_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{value:.1}{unit}"),
        None => "n/a".to_string(),
    }
}

fn fmt_extreme(extreme: Option<ExtremeReading>) -> String {
    match extreme {
        Some(extreme) => format!(
            "{:.0} mg/dL at {}",
            extreme.value,
            extreme.timestamp.format("%Y-%m-%d %H:%M UTC")
        ),
        None => "n/a".to_string(),
    }
}

fn fmt_trend(trend: Option<TrendDirection>) -> &'static str {
    trend.map(TrendDirection::label).unwrap_or("not enough data")
}

pub fn build_report(label: &str, summary: &PeriodSummary, context: &ReportContext) -> String {
    let mut output = String::new();
    let thresholds = &summary.thresholds;

    let _ = writeln!(output, "# Glucose Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} to {})",
        label,
        summary.period.start.format("%Y-%m-%d"),
        summary.period.end.format("%Y-%m-%d")
    );
    let _ = writeln!(
        output,
        "Targets: {}-{} mg/dL, alerts below {} and above {} mg/dL",
        thresholds.target_low,
        thresholds.target_high,
        thresholds.hypo_threshold,
        thresholds.hyper_threshold
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if summary.count == 0 {
        let _ = writeln!(output, "No readings recorded for this period.");
    } else {
        let _ = writeln!(output, "- Readings: {}", summary.count);
        let _ = writeln!(output, "- Average: {}", fmt_value(summary.mean, " mg/dL"));
        let _ = writeln!(output, "- Lowest: {}", fmt_extreme(summary.min));
        let _ = writeln!(output, "- Highest: {}", fmt_extreme(summary.max));
        let _ = writeln!(
            output,
            "- Standard deviation: {}",
            fmt_value(summary.std_dev, " mg/dL")
        );
        let _ = writeln!(
            output,
            "- Coefficient of variation: {}",
            fmt_value(summary.cv, "%")
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Time In Range");
    let tir = &summary.time_in_range;
    let _ = writeln!(output, "- Below range: {}", fmt_value(tir.below, "%"));
    let _ = writeln!(output, "- In range: {}", fmt_value(tir.in_range, "%"));
    let _ = writeln!(output, "- Above range: {}", fmt_value(tir.above, "%"));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Readings By Band");
    for level in [
        ClassifiedLevel::Low,
        ClassifiedLevel::Normal,
        ClassifiedLevel::High,
        ClassifiedLevel::VeryHigh,
    ] {
        let _ = writeln!(
            output,
            "- {}: {}",
            level.label(),
            summary.band_counts.get(level)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    let _ = writeln!(output, "- Hypo events: {}", context.alerts.hypo);
    let _ = writeln!(output, "- Hyper events: {}", context.alerts.hyper);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    let _ = writeln!(output, "- Within period: {}", fmt_trend(summary.trend));
    let _ = writeln!(
        output,
        "- Versus previous period: {}",
        fmt_trend(context.previous_trend)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Averages");
    if summary.daily.is_empty() {
        let _ = writeln!(output, "No readings recorded for this period.");
    } else {
        for day in summary.daily.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.1} mg/dL ({} readings)",
                day.day, day.mean, day.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insulin And Activity");
    let _ = writeln!(
        output,
        "- Insulin: {:.1} units across {} doses (daily average {})",
        context.insulin.total_units,
        context.insulin.doses,
        fmt_value(context.insulin.daily_average, " units")
    );
    let _ = writeln!(
        output,
        "- Activity: {} minutes across {} sessions",
        context.activity.total_minutes, context.activity.sessions
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Logging Streak");
    let _ = writeln!(output, "- Current streak: {} days", context.streak_days);
    let badges: Vec<StreakBadge> = streak::earned_badges(context.streak_days);
    if badges.is_empty() {
        let _ = writeln!(output, "- No badges earned yet.");
    } else {
        for badge in badges {
            let _ = writeln!(
                output,
                "- Badge: {} ({} days)",
                badge.title(),
                badge.required_days()
            );
        }
    }

    output
}
