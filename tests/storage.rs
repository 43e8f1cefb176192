use aura_habits::errors::StorageError;
use aura_habits::models::{AccentColor, Habit, HabitType, ScheduleDay, Settings, Theme};
use aura_habits::storage::{JsonFile, JsonFileStore, StorageProvider};

fn habit(id: &str) -> Habit {
    Habit {
        id: id.to_string(),
        name: "Meditate".to_string(),
        icon: "🧘".to_string(),
        color: "#9C38FF".to_string(),
        kind: HabitType::Habit,
        schedule: ScheduleDay::ALL.into_iter().collect(),
        reminder_time: Some("01:00 PM".to_string()),
        created_at: 1_700_000_000_000,
    }
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");

    let store = JsonFileStore::open(JsonFile::new(&path)).await.unwrap();
    store.habits().save(&habit("h1")).await.unwrap();
    store.checkins().toggle("h1", "2024-01-01", true).await.unwrap();
    store.checkins().toggle("h1", "2024-01-02", true).await.unwrap();
    store.checkins().toggle("h1", "2024-01-02", false).await.unwrap();
    let settings = Settings {
        theme: Theme::Light,
        accent_color: AccentColor::Blue,
        ..Settings::default()
    };
    store.settings().save(&settings).await.unwrap();
    store.close().await;

    let reopened = JsonFileStore::open(JsonFile::new(&path)).await.unwrap();
    assert_eq!(reopened.habits().get_by_id("h1").await.unwrap(), Some(habit("h1")));
    let checkins = reopened.checkins().get_all().await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert_eq!(checkins[0].date_iso, "2024-01-01");
    assert_eq!(reopened.checkins().get_by_date("2024-01-01").await.unwrap().len(), 1);
    assert_eq!(reopened.settings().get().await.unwrap(), settings);
}

#[tokio::test]
async fn rejected_write_leaves_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = JsonFileStore::open(JsonFile::new(&path)).await.unwrap();
    store.checkins().toggle("h1", "2024-01-01", true).await.unwrap();

    // A directory where the staging file goes makes every flush fail.
    std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();

    let err = store
        .checkins()
        .toggle("h1", "2024-01-02", true)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::TransactionFailed(_)));
    let err = store.habits().save(&habit("h2")).await.unwrap_err();
    assert!(matches!(err, StorageError::TransactionFailed(_)));

    let checkins = store.checkins().get_all().await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert!(store.habits().get_all().await.unwrap().is_empty());

    // Un-toggling an absent record is still a no-op, not an error.
    store.checkins().toggle("h9", "2024-01-01", false).await.unwrap();
}

#[tokio::test]
async fn missing_file_reads_as_empty_with_default_settings() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(JsonFile::new(dir.path().join("fresh.json")))
        .await
        .unwrap();

    assert!(store.habits().get_all().await.unwrap().is_empty());
    assert_eq!(store.settings().get().await.unwrap(), Settings::default());
}

#[tokio::test]
async fn partial_settings_record_is_merged_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{"name":"AuraHabitDB","version":1,"settings":{"id":"main","accentColor":"orange"}}"#,
    )
    .unwrap();

    let store = JsonFileStore::open(JsonFile::new(&path)).await.unwrap();
    let settings = store.settings().get().await.unwrap();
    assert_eq!(settings.accent_color, AccentColor::Orange);
    assert_eq!(settings.theme, Theme::System);
}

#[tokio::test]
async fn corrupt_or_newer_files_are_unavailable() {
    let dir = tempfile::tempdir().unwrap();

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, b"{ not json").unwrap();
    let result = JsonFileStore::open(JsonFile::new(&corrupt)).await;
    assert!(matches!(result, Err(StorageError::Unavailable(_))));

    let newer = dir.path().join("newer.json");
    std::fs::write(&newer, r#"{"name":"AuraHabitDB","version":99}"#).unwrap();
    let result = JsonFileStore::open(JsonFile::new(&newer)).await;
    assert!(matches!(result, Err(StorageError::Unavailable(_))));
}

#[tokio::test]
async fn stored_incomplete_checkins_are_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{"name":"AuraHabitDB","version":1,"checkins":[
            {"habitId":"h1","dateISO":"2024-01-01","completed":true},
            {"habitId":"h1","dateISO":"2024-01-02","completed":false}
        ]}"#,
    )
    .unwrap();

    let store = JsonFileStore::open(JsonFile::new(&path)).await.unwrap();
    let checkins = store.checkins().get_all().await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert!(checkins.iter().all(|c| c.completed));
}
