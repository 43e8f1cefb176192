use crate::models::{parse_date, Checkin, Habit, StreakInfo};
use chrono::{Local, NaiveDate};
use std::collections::BTreeSet;
use tracing::warn;

/// Denominator of `completionRate`. A fixed window, not a trailing-30-day ratio.
pub const COMPLETION_RATE_WINDOW_DAYS: f64 = 30.0;

pub fn calculate_streak(habit: &Habit, all_checkins: &[Checkin]) -> StreakInfo {
    calculate_streak_at(Local::now().date_naive(), habit, all_checkins)
}

/// Streaks count consecutive calendar days; the habit's schedule is not consulted.
pub fn calculate_streak_at(today: NaiveDate, habit: &Habit, all_checkins: &[Checkin]) -> StreakInfo {
    let dates = completed_dates(habit, all_checkins);
    if dates.is_empty() {
        return StreakInfo::default();
    }

    let total_completions = dates.len() as u32;

    StreakInfo {
        current_streak: current_streak(today, &dates),
        best_streak: best_streak(&dates),
        total_completions,
        completion_rate: f64::from(total_completions) / COMPLETION_RATE_WINDOW_DAYS,
    }
}

fn completed_dates(habit: &Habit, all_checkins: &[Checkin]) -> BTreeSet<NaiveDate> {
    all_checkins
        .iter()
        .filter(|checkin| checkin.habit_id == habit.id && checkin.completed)
        .filter_map(|checkin| {
            let date = parse_date(&checkin.date_iso);
            if date.is_none() {
                warn!(
                    habit_id = %habit.id,
                    value = %checkin.date_iso,
                    "skipping check-in with invalid date"
                );
            }
            date
        })
        .collect()
}

fn current_streak(today: NaiveDate, dates: &BTreeSet<NaiveDate>) -> u32 {
    // Yesterday still counts so the streak survives until today's check-in.
    let start = if dates.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if dates.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut count = 0;
    let mut cursor = Some(start);
    while let Some(day) = cursor.filter(|day| dates.contains(day)) {
        count += 1;
        cursor = day.pred_opt();
    }
    count
}

fn best_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        run = match previous.and_then(|prev| prev.succ_opt()) {
            Some(next) if next == date => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(date);
    }
    best
}
