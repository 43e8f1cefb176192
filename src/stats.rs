use crate::models::{
    date_key, month_key, CalendarDay, Checkin, DayCompletion, Habit, HabitProgress, MonthCalendar,
    Overview, WeekStart,
};
use crate::streak::calculate_streak_at;
use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use std::collections::HashSet;

pub fn build_overview(week_start: WeekStart, habits: &[Habit], checkins: &[Checkin]) -> Overview {
    build_overview_at(Local::now().date_naive(), week_start, habits, checkins)
}

pub fn build_overview_at(
    today: NaiveDate,
    week_start: WeekStart,
    habits: &[Habit],
    checkins: &[Checkin],
) -> Overview {
    let due_today = habits
        .iter()
        .filter(|habit| habit.is_due_on(today))
        .map(|habit| habit_progress_at(today, habit, checkins))
        .collect();

    let start = start_of_week(today, week_start);
    let this_week = (0..7)
        .map(|offset| day_completion(start + Duration::days(offset), habits, checkins))
        .collect();

    Overview {
        date_iso: date_key(today),
        due_today,
        this_week,
    }
}

pub fn habit_progress_at(today: NaiveDate, habit: &Habit, checkins: &[Checkin]) -> HabitProgress {
    let today_key = date_key(today);
    let is_completed_today = checkins
        .iter()
        .any(|c| c.habit_id == habit.id && c.date_iso == today_key && c.completed);

    HabitProgress {
        habit: habit.clone(),
        streak: calculate_streak_at(today, habit, checkins),
        is_completed_today,
    }
}

/// Share of the habits due on `date` that were completed that day.
pub fn day_completion(date: NaiveDate, habits: &[Habit], checkins: &[Checkin]) -> DayCompletion {
    let key = date_key(date);
    let done: HashSet<&str> = checkins
        .iter()
        .filter(|c| c.completed && c.date_iso == key)
        .map(|c| c.habit_id.as_str())
        .collect();

    let due: Vec<&Habit> = habits.iter().filter(|h| h.is_due_on(date)).collect();
    let scheduled = due.len() as u32;
    let completed = due.iter().filter(|h| done.contains(h.id.as_str())).count() as u32;
    let ratio = if scheduled == 0 {
        0.0
    } else {
        f64::from(completed) / f64::from(scheduled)
    };

    DayCompletion {
        date_iso: key,
        scheduled,
        completed,
        ratio,
    }
}

pub fn build_month(
    month: NaiveDate,
    week_start: WeekStart,
    habits: &[Habit],
    checkins: &[Checkin],
) -> MonthCalendar {
    build_month_at(Local::now().date_naive(), month, week_start, habits, checkins)
}

/// Completion grid for the month containing `month`, padded to whole weeks,
/// plus the all-habit day streak ending at `today`.
pub fn build_month_at(
    today: NaiveDate,
    month: NaiveDate,
    week_start: WeekStart,
    habits: &[Habit],
    checkins: &[Checkin],
) -> MonthCalendar {
    let first = month.with_day(1).unwrap_or(month);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);

    let start = start_of_week(first, week_start);
    let end = start_of_week(last, week_start) + Duration::days(6);
    let days = start
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| CalendarDay {
            day: day_completion(date, habits, checkins),
            in_month: date.month() == first.month() && date.year() == first.year(),
        })
        .collect();

    MonthCalendar {
        month: month_key(first),
        days,
        day_streak: day_streak_at(today, checkins),
    }
}

/// Days in a row, ending at `today`, with a completed check-in for any habit.
/// Unlike a habit streak there is no grace day.
pub fn day_streak_at(today: NaiveDate, checkins: &[Checkin]) -> u32 {
    let active: HashSet<&str> = checkins
        .iter()
        .filter(|c| c.completed)
        .map(|c| c.date_iso.as_str())
        .collect();

    let mut streak = 0;
    let mut day = today;
    while active.contains(date_key(day).as_str()) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

fn start_of_week(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = match week_start {
        WeekStart::Monday => date.weekday().num_days_from_monday(),
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
    };
    date - Duration::days(offset as i64)
}
