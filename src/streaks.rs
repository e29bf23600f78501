use crate::models::{DayProgress, MonthProgress, WeekBucket};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_BUCKETS: usize = 4;

/// Metrics derived from one habit's completion history.
///
/// All day boundaries are UTC calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitMetrics {
    pub completed_days: BTreeSet<NaiveDate>,
    pub completion_rate_percent: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

pub fn compute_metrics(
    events: &[DateTime<Utc>],
    window_days: u32,
    reference_now: DateTime<Utc>,
) -> HabitMetrics {
    let today = reference_now.date_naive();
    let days = completed_days(events);

    HabitMetrics {
        completion_rate_percent: completion_rate(&days, today, window_days),
        current_streak: current_streak(&days, today),
        longest_streak: longest_streak(&days),
        completed_days: days,
    }
}

/// Projects completion instants onto distinct UTC calendar days.
pub fn completed_days(events: &[DateTime<Utc>]) -> BTreeSet<NaiveDate> {
    events.iter().map(|at| at.date_naive()).collect()
}

/// Share of the `window_days` days ending at `today` (inclusive) that were
/// completed, as a rounded percentage.
pub fn completion_rate(days: &BTreeSet<NaiveDate>, today: NaiveDate, window_days: u32) -> u32 {
    let window_days = window_days.max(1);
    // Windows reaching past the calendar's first day are cut off there.
    let start = today
        .checked_sub_days(Days::new(u64::from(window_days - 1)))
        .unwrap_or(NaiveDate::MIN);
    let in_window = days.range(start..=today).count() as u32;
    percent(in_window, window_days)
}

/// Consecutive completed days ending today, or ending yesterday when today
/// has not been marked yet.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt().filter(|yesterday| days.contains(yesterday)) {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor.filter(|day| days.contains(day)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}

/// Monday-to-Sunday checkmarks for the week containing `reference_now`.
pub fn weekly_progress(
    events: &[DateTime<Utc>],
    reference_now: DateTime<Utc>,
) -> Vec<DayProgress> {
    let days = completed_days(events);
    let start = week_start(reference_now.date_naive());

    WEEKDAY_LABELS
        .iter()
        .zip(start.iter_days())
        .map(|(label, date)| DayProgress {
            day: (*label).to_string(),
            date,
            completed: days.contains(&date),
        })
        .collect()
}

/// Completion overview for the calendar month containing `reference_now`.
///
/// Days 29 and later fall outside the four weekly buckets.
pub fn monthly_progress(events: &[DateTime<Utc>], reference_now: DateTime<Utc>) -> MonthProgress {
    let today = reference_now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    let days_in_month = last.day();

    let days = completed_days(events);
    let mut weeks: Vec<WeekBucket> = (1..=MONTH_BUCKETS)
        .map(|index| WeekBucket {
            name: format!("Week {index}"),
            completions: 0,
        })
        .collect();

    let mut completed = 0;
    for day in days.range(first..=last) {
        completed += 1;
        if let Some(bucket) = weeks.get_mut(day.day0() as usize / 7) {
            bucket.completions += 1;
        }
    }

    MonthProgress {
        month: first.format("%B").to_string(),
        days_in_month,
        completed_days: completed,
        completion_rate_percent: percent(completed, days_in_month),
        weeks,
    }
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset))
        .unwrap_or(NaiveDate::MIN)
}

fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) * 100.0 / f64::from(whole)).round() as u32
}
