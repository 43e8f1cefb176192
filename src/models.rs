use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Date format used for every `dateISO` value.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HabitType {
    #[default]
    Habit,
    Task,
}

/// Weekday tokens a habit can be scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScheduleDay {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl ScheduleDay {
    pub const ALL: [ScheduleDay; 7] = [
        ScheduleDay::Mon,
        ScheduleDay::Tue,
        ScheduleDay::Wed,
        ScheduleDay::Thu,
        ScheduleDay::Fri,
        ScheduleDay::Sat,
        ScheduleDay::Sun,
    ];

    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => ScheduleDay::Mon,
            Weekday::Tue => ScheduleDay::Tue,
            Weekday::Wed => ScheduleDay::Wed,
            Weekday::Thu => ScheduleDay::Thu,
            Weekday::Fri => ScheduleDay::Fri,
            Weekday::Sat => ScheduleDay::Sat,
            Weekday::Sun => ScheduleDay::Sun,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "type", default)]
    pub kind: HabitType,
    #[serde(default)]
    pub schedule: BTreeSet<ScheduleDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<String>,
    pub created_at: i64,
}

impl Habit {
    /// Builds a habit with a fresh id and the current time as `createdAt`.
    pub fn create(draft: NewHabit) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            icon: draft.icon,
            color: draft.color,
            kind: draft.kind,
            schedule: draft.schedule,
            reminder_time: draft.reminder_time,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.schedule.contains(&ScheduleDay::of(date))
    }
}

/// Body of a create request; the server assigns `id` and `createdAt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "type", default)]
    pub kind: HabitType,
    #[serde(default)]
    pub schedule: BTreeSet<ScheduleDay>,
    #[serde(default)]
    pub reminder_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkin {
    pub habit_id: String,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub habit_id: String,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckinQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// `YYYY-MM`; the current month when absent.
    pub month: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccentColor {
    Pink,
    #[default]
    Purple,
    Blue,
    Mint,
    Orange,
}

/// First day of the week, serialized as `0` (Sunday) or `1` (Monday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

impl TryFrom<u8> for WeekStart {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WeekStart::Sunday),
            1 => Ok(WeekStart::Monday),
            other => Err(format!("weekStartsOn must be 0 or 1, got {other}")),
        }
    }
}

impl From<WeekStart> for u8 {
    fn from(value: WeekStart) -> Self {
        match value {
            WeekStart::Sunday => 0,
            WeekStart::Monday => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub accent_color: AccentColor,
    pub week_starts_on: WeekStart,
    pub notifications_enabled: bool,
}

impl Settings {
    /// Fills every field missing from `partial` with its default.
    pub fn merged(partial: &PartialSettings) -> Self {
        let defaults = Settings::default();
        Self {
            theme: partial.theme.unwrap_or(defaults.theme),
            accent_color: partial.accent_color.unwrap_or(defaults.accent_color),
            week_starts_on: partial.week_starts_on.unwrap_or(defaults.week_starts_on),
            notifications_enabled: partial
                .notifications_enabled
                .unwrap_or(defaults.notifications_enabled),
        }
    }
}

/// Settings as persisted; older files may lack fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<AccentColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_starts_on: Option<WeekStart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

impl From<Settings> for PartialSettings {
    fn from(settings: Settings) -> Self {
        Self {
            theme: Some(settings.theme),
            accent_color: Some(settings.accent_color),
            week_starts_on: Some(settings.week_starts_on),
            notifications_enabled: Some(settings.notifications_enabled),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreakInfo {
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_completions: u32,
    /// `totalCompletions / 30`; an approximation, not a trailing-window ratio.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitProgress {
    #[serde(flatten)]
    pub habit: Habit,
    pub streak: StreakInfo,
    pub is_completed_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCompletion {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub scheduled: u32,
    pub completed: u32,
    pub ratio: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub due_today: Vec<HabitProgress>,
    pub this_week: Vec<DayCompletion>,
}

/// One cell of the month grid. Cells outside the month pad the grid to
/// whole weeks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    #[serde(flatten)]
    pub day: DayCompletion,
    pub in_month: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCalendar {
    pub month: String,
    pub days: Vec<CalendarDay>,
    /// Consecutive days, ending today, with at least one completed check-in.
    pub day_streak: u32,
}

/// Full copy of the user's data; also the export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub habits: Vec<Habit>,
    pub checkins: Vec<Checkin>,
    pub settings: Settings,
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a canonical `YYYY-MM` into the first day of that month.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    let first = parse_date(&format!("{value}-01"))?;
    (month_key(first) == value).then_some(first)
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
