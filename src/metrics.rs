use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::classify::GlucoseThresholds;
use crate::models::{
    BandCounts, ClassifiedLevel, DailyMean, ExtremeReading, GlucoseReading, Period,
    PeriodSummary, TimeInRange, TrendDirection,
};

/// Relative change between window means needed to call a trend.
pub const TREND_CHANGE_RATIO: f64 = 0.10;

/// Builds the statistics for `period`. Readings must already be limited to
/// the period and classified with `thresholds`; neither is re-checked here.
pub fn summarize(
    readings: &[GlucoseReading],
    period: Period,
    thresholds: &GlucoseThresholds,
) -> PeriodSummary {
    let mean = mean(readings);
    let std_dev = sample_std_dev(readings, mean);
    let band_counts = count_bands(readings);

    PeriodSummary {
        period,
        thresholds: *thresholds,
        count: readings.len(),
        mean,
        min: extreme(readings, |candidate, best| candidate < best),
        max: extreme(readings, |candidate, best| candidate > best),
        std_dev,
        cv: coefficient_of_variation(std_dev, mean),
        band_counts,
        time_in_range: time_in_range(&band_counts),
        trend: window_trend(readings, period),
        daily: daily_means(readings),
    }
}

pub fn mean(readings: &[GlucoseReading]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let total: f64 = readings.iter().map(|reading| reading.value).sum();
    Some(total / readings.len() as f64)
}

/// Bessel-corrected standard deviation; needs at least two readings.
pub fn sample_std_dev(readings: &[GlucoseReading], mean: Option<f64>) -> Option<f64> {
    let mean = mean?;
    if readings.len() < 2 {
        return None;
    }
    let squared: f64 = readings
        .iter()
        .map(|reading| (reading.value - mean).powi(2))
        .sum();
    Some((squared / (readings.len() - 1) as f64).sqrt())
}

/// Standard deviation as a percentage of the mean.
pub fn coefficient_of_variation(std_dev: Option<f64>, mean: Option<f64>) -> Option<f64> {
    let mean = mean?;
    if mean == 0.0 {
        return None;
    }
    Some(std_dev? / mean * 100.0)
}

fn extreme<F>(readings: &[GlucoseReading], better: F) -> Option<ExtremeReading>
where
    F: Fn(f64, f64) -> bool,
{
    let mut iter = readings.iter();
    let first = iter.next()?;
    let best = iter.fold(first, |best, reading| {
        if better(reading.value, best.value) {
            reading
        } else {
            best
        }
    });
    Some(ExtremeReading {
        value: best.value,
        timestamp: best.timestamp,
    })
}

pub fn count_bands(readings: &[GlucoseReading]) -> BandCounts {
    let mut counts = BandCounts::default();
    for reading in readings {
        match reading.level {
            ClassifiedLevel::Low => counts.low += 1,
            ClassifiedLevel::Normal => counts.normal += 1,
            ClassifiedLevel::High => counts.high += 1,
            ClassifiedLevel::VeryHigh => counts.very_high += 1,
        }
    }
    counts
}

pub fn time_in_range(counts: &BandCounts) -> TimeInRange {
    let total = counts.total();
    if total == 0 {
        return TimeInRange::default();
    }
    let pct = |count: usize| Some(count as f64 / total as f64 * 100.0);
    TimeInRange {
        below: pct(counts.low),
        in_range: pct(counts.normal),
        above: pct(counts.high + counts.very_high),
    }
}

/// Applies the fixed ±10% rule to two window means.
pub fn classify_trend(previous_mean: f64, current_mean: f64) -> TrendDirection {
    if current_mean > previous_mean * (1.0 + TREND_CHANGE_RATIO) {
        TrendDirection::Increasing
    } else if current_mean < previous_mean * (1.0 - TREND_CHANGE_RATIO) {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Compares two windows of readings. `None` when either window is empty.
pub fn trend(previous: &[GlucoseReading], current: &[GlucoseReading]) -> Option<TrendDirection> {
    Some(classify_trend(mean(previous)?, mean(current)?))
}

/// Readings before `at`, then readings at or after it.
pub fn split_at(
    readings: &[GlucoseReading],
    at: DateTime<Utc>,
) -> (Vec<GlucoseReading>, Vec<GlucoseReading>) {
    readings
        .iter()
        .cloned()
        .partition(|reading| reading.timestamp < at)
}

/// Compares the later half of `window` with the earlier one.
pub fn window_trend(readings: &[GlucoseReading], window: Period) -> Option<TrendDirection> {
    let (previous, current) = split_at(readings, window.midpoint());
    trend(&previous, &current)
}

/// Per-day means in calendar order. Days without readings are left out.
pub fn daily_means(readings: &[GlucoseReading]) -> Vec<DailyMean> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for reading in readings {
        let entry = buckets
            .entry(reading.timestamp.date_naive())
            .or_insert((0.0, 0));
        entry.0 += reading.value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(day, (total, count))| DailyMean {
            day,
            mean: total / count as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingRecord;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn reading_at(value: f64, timestamp: DateTime<Utc>) -> GlucoseReading {
        GlucoseReading::classify(
            ReadingRecord {
                id: Uuid::new_v4(),
                value,
                timestamp,
                meal_context: None,
                notes: None,
            },
            &GlucoseThresholds::default(),
        )
    }

    fn hourly(values: &[f64]) -> Vec<GlucoseReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| reading_at(*value, base_time() + Duration::hours(i as i64)))
            .collect()
    }

    fn week() -> Period {
        Period::new(base_time() - Duration::days(7), base_time() + Duration::days(1))
    }

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be available");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_input_reports_everything_unavailable() {
        let summary = summarize(&[], week(), &GlucoseThresholds::default());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.min, None);
        assert_eq!(summary.max, None);
        assert_eq!(summary.std_dev, None);
        assert_eq!(summary.cv, None);
        assert_eq!(summary.band_counts, BandCounts::default());
        assert_eq!(summary.time_in_range, TimeInRange::default());
        assert_eq!(summary.trend, None);
        assert!(summary.daily.is_empty());
    }

    #[test]
    fn three_normal_readings() {
        let readings = hourly(&[70.0, 90.0, 110.0]);
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());

        approx(summary.mean, 90.0);
        approx(summary.std_dev, 20.0);
        approx(summary.cv, 20.0 / 90.0 * 100.0);
        assert_eq!(summary.band_counts.normal, 3);
        approx(summary.time_in_range.in_range, 100.0);
        approx(summary.time_in_range.below, 0.0);
        approx(summary.time_in_range.above, 0.0);
        assert_eq!(summary.min.unwrap().value, 70.0);
        assert_eq!(summary.max.unwrap().value, 110.0);
    }

    #[test]
    fn single_reading_has_no_variability() {
        let readings = hourly(&[120.0]);
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());
        approx(summary.mean, 120.0);
        assert_eq!(summary.std_dev, None);
        assert_eq!(summary.cv, None);
    }

    #[test]
    fn zero_mean_leaves_cv_unavailable() {
        let readings = hourly(&[-10.0, 10.0]);
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());
        approx(summary.mean, 0.0);
        assert!(summary.std_dev.is_some());
        assert_eq!(summary.cv, None);
        assert_eq!(coefficient_of_variation(Some(5.0), None), None);
    }

    #[test]
    fn extremes_keep_input_order_on_ties() {
        let later = base_time() + Duration::hours(5);
        let earlier = base_time();
        // Input order deliberately differs from chronological order.
        let readings = vec![
            reading_at(200.0, later),
            reading_at(100.0, later + Duration::hours(1)),
            reading_at(200.0, earlier),
            reading_at(100.0, earlier + Duration::hours(1)),
        ];
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());
        assert_eq!(summary.max.unwrap().timestamp, later);
        assert_eq!(summary.min.unwrap().timestamp, later + Duration::hours(1));
    }

    #[test]
    fn time_in_range_groups_high_and_very_high() {
        let readings = hourly(&[60.0, 100.0, 150.0, 250.0]);
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());
        assert_eq!(summary.band_counts.low, 1);
        assert_eq!(summary.band_counts.normal, 1);
        assert_eq!(summary.band_counts.high, 1);
        assert_eq!(summary.band_counts.very_high, 1);
        approx(summary.time_in_range.below, 25.0);
        approx(summary.time_in_range.in_range, 25.0);
        approx(summary.time_in_range.above, 50.0);
    }

    #[test]
    fn band_counts_trust_stored_levels() {
        let mut readings = hourly(&[100.0, 100.0]);
        readings[1].level = ClassifiedLevel::VeryHigh;
        let counts = count_bands(&readings);
        assert_eq!(counts.normal, 1);
        assert_eq!(counts.very_high, 1);
    }

    #[test]
    fn summarize_is_repeatable() {
        let readings = hourly(&[95.0, 130.0, 185.0, 66.0]);
        let thresholds = GlucoseThresholds::default();
        let first = summarize(&readings, week(), &thresholds);
        let second = summarize(&readings, week(), &thresholds);
        assert_eq!(first, second);
    }

    #[test]
    fn trend_threshold_is_strict() {
        assert_eq!(classify_trend(100.0, 115.0), TrendDirection::Increasing);
        assert_eq!(classify_trend(100.0, 95.0), TrendDirection::Stable);
        assert_eq!(classify_trend(100.0, 110.0), TrendDirection::Stable);
        assert_eq!(classify_trend(100.0, 110.01), TrendDirection::Increasing);
        assert_eq!(classify_trend(100.0, 90.0), TrendDirection::Stable);
        assert_eq!(classify_trend(100.0, 89.99), TrendDirection::Decreasing);
    }

    #[test]
    fn trend_needs_both_windows() {
        let current = hourly(&[120.0]);
        assert_eq!(trend(&[], &current), None);
        assert_eq!(trend(&current, &[]), None);
    }

    #[test]
    fn split_puts_boundary_reading_in_later_window_only() {
        let period = Period::last_days(base_time(), 7);
        let readings = vec![
            reading_at(90.0, period.start - Duration::hours(3)),
            reading_at(140.0, period.start),
            reading_at(120.0, period.start + Duration::hours(3)),
        ];
        let (previous, current) = split_at(&readings, period.start);

        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].value, 90.0);
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].timestamp, period.start);
        assert!(!previous.iter().any(|reading| reading.timestamp == period.start));
    }

    #[test]
    fn summarize_reports_trend_across_period_halves() {
        let period = Period::new(base_time(), base_time() + Duration::days(4));
        let rising = vec![
            reading_at(100.0, base_time() + Duration::hours(6)),
            reading_at(104.0, base_time() + Duration::days(1)),
            reading_at(125.0, base_time() + Duration::days(3)),
            reading_at(131.0, base_time() + Duration::days(3) + Duration::hours(6)),
        ];
        let summary = summarize(&rising, period, &GlucoseThresholds::default());
        assert_eq!(summary.trend, Some(TrendDirection::Increasing));

        let steady = vec![
            reading_at(100.0, base_time() + Duration::hours(6)),
            reading_at(105.0, base_time() + Duration::days(3)),
        ];
        let summary = summarize(&steady, period, &GlucoseThresholds::default());
        assert_eq!(summary.trend, Some(TrendDirection::Stable));

        let late_only = vec![reading_at(150.0, base_time() + Duration::days(3))];
        let summary = summarize(&late_only, period, &GlucoseThresholds::default());
        assert_eq!(summary.trend, None);
    }

    #[test]
    fn window_trend_splits_at_midpoint() {
        let window = Period::new(base_time(), base_time() + Duration::days(2));
        let midpoint = window.midpoint();
        let readings = vec![
            reading_at(100.0, base_time() + Duration::hours(2)),
            reading_at(100.0, base_time() + Duration::hours(20)),
            reading_at(130.0, midpoint),
            reading_at(120.0, midpoint + Duration::hours(6)),
        ];
        assert_eq!(window_trend(&readings, window), Some(TrendDirection::Increasing));

        let early_only = &readings[..2];
        assert_eq!(window_trend(early_only, window), None);
    }

    #[test]
    fn daily_means_skip_empty_days() {
        let day_one = base_time();
        let day_three = base_time() + Duration::days(2);
        let readings = vec![
            reading_at(150.0, day_three),
            reading_at(100.0, day_one),
            reading_at(120.0, day_one + Duration::hours(3)),
        ];
        let daily = daily_means(&readings);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].day, day_one.date_naive());
        assert_eq!(daily[0].count, 2);
        assert!((daily[0].mean - 110.0).abs() < 1e-9);
        assert_eq!(daily[1].day, day_three.date_naive());
        assert!((daily[1].mean - 150.0).abs() < 1e-9);
    }

    #[test]
    fn nan_input_propagates_into_mean() {
        let readings = hourly(&[f64::NAN, 100.0]);
        let summary = summarize(&readings, week(), &GlucoseThresholds::default());
        assert!(summary.mean.unwrap().is_nan());
    }
}
