use crate::errors::StorageError;
use crate::models::{Habit, HabitType, NewHabit, ScheduleDay};
use crate::storage::StorageProvider;
use tracing::info;

fn starter(
    name: &str,
    icon: &str,
    color: &str,
    kind: HabitType,
    schedule: &[ScheduleDay],
    reminder: Option<&str>,
) -> Habit {
    Habit::create(NewHabit {
        name: name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        kind,
        schedule: schedule.iter().copied().collect(),
        reminder_time: reminder.map(str::to_string),
    })
}

pub fn starter_habits() -> Vec<Habit> {
    use ScheduleDay::*;

    vec![
        starter("Do not drink alcohol", "🚫", "#FF385C", HabitType::Habit, &ScheduleDay::ALL, None),
        starter("Work meeting", "⏰", "#BD1E59", HabitType::Task, &[Mon, Wed, Fri], Some("10:00 AM")),
        starter("Meditate", "🧘", "#9C38FF", HabitType::Habit, &ScheduleDay::ALL, Some("01:00 PM")),
        starter("Read a book", "🎓", "#5C38FF", HabitType::Habit, &[Sun, Mon, Wed, Thu], None),
        starter("Go jogging", "🏃", "#38A1FF", HabitType::Habit, &[Sun, Tue, Wed, Sat], Some("10:30 PM")),
    ]
}

/// Saves the starter habits when the habit collection is empty.
pub async fn seed_if_empty(storage: &dyn StorageProvider) -> Result<usize, StorageError> {
    if !storage.habits().get_all().await?.is_empty() {
        return Ok(0);
    }

    let habits = starter_habits();
    for habit in &habits {
        storage.habits().save(habit).await?;
    }
    info!(count = habits.len(), "seeded starter habits");
    Ok(habits.len())
}
