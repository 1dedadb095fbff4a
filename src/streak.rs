use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

/// Consecutive logged days counted back from `today`. A today without
/// readings yet does not break a run that reached yesterday.
pub fn streak<I>(logged_days: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: BTreeSet<NaiveDate> = logged_days.into_iter().collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut count = 0;
    while days.contains(&cursor) {
        count += 1;
        cursor -= Duration::days(1);
    }
    count
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakBadge {
    ThreeDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
}

impl StreakBadge {
    pub const ALL: [StreakBadge; 4] = [
        StreakBadge::ThreeDays,
        StreakBadge::OneWeek,
        StreakBadge::TwoWeeks,
        StreakBadge::OneMonth,
    ];

    pub fn required_days(self) -> u32 {
        match self {
            StreakBadge::ThreeDays => 3,
            StreakBadge::OneWeek => 7,
            StreakBadge::TwoWeeks => 14,
            StreakBadge::OneMonth => 30,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StreakBadge::ThreeDays => "Getting Started",
            StreakBadge::OneWeek => "Week Warrior",
            StreakBadge::TwoWeeks => "Consistency Champion",
            StreakBadge::OneMonth => "Monthly Master",
        }
    }
}

pub fn earned_badges(streak_days: u32) -> Vec<StreakBadge> {
    StreakBadge::ALL
        .into_iter()
        .filter(|badge| streak_days >= badge.required_days())
        .collect()
}
