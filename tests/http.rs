use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Habit {
    id: String,
    name: String,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checkin {
    habit_id: String,
    #[serde(rename = "dateISO")]
    date_iso: String,
    completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreakInfo {
    current_streak: u32,
    best_streak: u32,
    total_completions: u32,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    habits: Vec<Habit>,
    checkins: Vec<Checkin>,
    settings: serde_json::Value,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("aura_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/settings")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_aura_habits"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_data_path())
        .env("STORAGE_BACKEND", "file")
        .env("SEED_DEFAULTS", "false")
        .env_remove("SHELL_ORIGIN")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn create_habit(client: &Client, base_url: &str, name: &str) -> Habit {
    let response = client
        .post(format!("{base_url}/api/habits"))
        .json(&json!({ "name": name, "schedule": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn toggle(client: &Client, base_url: &str, habit_id: &str, date: &str, completed: bool) {
    let response = client
        .post(format!("{base_url}/api/checkins/toggle"))
        .json(&json!({ "habitId": habit_id, "dateISO": date, "completed": completed }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "toggle failed: {}", response.status());
}

async fn checkins_for(client: &Client, base_url: &str, habit_id: &str) -> Vec<Checkin> {
    let all: Vec<Checkin> = client
        .get(format!("{base_url}/api/checkins"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    all.into_iter().filter(|c| c.habit_id == habit_id).collect()
}

#[tokio::test]
async fn http_toggle_is_idempotent() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let habit = create_habit(&client, &server.base_url, "Stretch").await;

    toggle(&client, &server.base_url, &habit.id, "2024-01-01", true).await;
    toggle(&client, &server.base_url, &habit.id, "2024-01-01", true).await;
    let checkins = checkins_for(&client, &server.base_url, &habit.id).await;
    assert_eq!(checkins.len(), 1);
    assert!(checkins[0].completed);
    assert_eq!(checkins[0].date_iso, "2024-01-01");

    toggle(&client, &server.base_url, &habit.id, "2024-01-01", false).await;
    toggle(&client, &server.base_url, &habit.id, "2024-01-01", false).await;
    assert!(checkins_for(&client, &server.base_url, &habit.id).await.is_empty());
}

#[tokio::test]
async fn http_streak_and_cascade_delete() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let habit = create_habit(&client, &server.base_url, "Journal").await;

    for date in ["2024-01-01", "2024-01-02", "2024-01-04", "2024-01-05"] {
        toggle(&client, &server.base_url, &habit.id, date, true).await;
    }

    let streak: StreakInfo = client
        .get(format!("{}/api/habits/{}/streak", server.base_url, habit.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(streak.best_streak, 2);
    assert_eq!(streak.total_completions, 4);
    // The dates are long past, so no current streak.
    assert_eq!(streak.current_streak, 0);

    let response = client
        .delete(format!("{}/api/habits/{}", server.base_url, habit.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(checkins_for(&client, &server.base_url, &habit.id).await.is_empty());

    let missing = client
        .get(format!("{}/api/habits/{}", server.base_url, habit.id))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_update_keeps_created_at() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let habit = create_habit(&client, &server.base_url, "Walk").await;

    let updated: Habit = client
        .put(format!("{}/api/habits/{}", server.base_url, habit.id))
        .json(&json!({
            "id": habit.id,
            "name": "Walk the dog",
            "icon": "🐕",
            "color": "#10B981",
            "type": "Task",
            "schedule": ["Sat"],
            "createdAt": 1
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated.name, "Walk the dog");
    assert_eq!(updated.created_at, habit.created_at);
}

#[tokio::test]
async fn http_settings_default_then_saved() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let settings: serde_json::Value = client
        .get(format!("{}/api/settings", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        settings,
        json!({
            "theme": "system",
            "accentColor": "purple",
            "weekStartsOn": 1,
            "notificationsEnabled": false
        })
    );

    let next = json!({
        "theme": "dark",
        "accentColor": "mint",
        "weekStartsOn": 0,
        "notificationsEnabled": true
    });
    let response = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&next)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let snapshot: Snapshot = client
        .get(format!("{}/api/snapshot", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot.settings, next);
}

#[tokio::test]
async fn http_export_is_an_attachment() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let habit = create_habit(&client, &server.base_url, "Floss").await;
    toggle(&client, &server.base_url, &habit.id, "2024-03-01", true).await;

    let response = client
        .get(format!("{}/api/export", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"aura-backup-"));

    let export: Snapshot = response.json().await.unwrap();
    assert!(export.habits.iter().any(|h| h.id == habit.id));
    assert!(export
        .checkins
        .iter()
        .any(|c| c.habit_id == habit.id && c.date_iso == "2024-03-01"));
    assert!(export.settings.is_object());
}

#[tokio::test]
async fn http_rejects_bad_input() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let bad_date = client
        .post(format!("{}/api/checkins/toggle", server.base_url))
        .json(&json!({ "habitId": "h1", "dateISO": "2024-02-30", "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);

    let blank_name = client
        .post(format!("{}/api/habits", server.base_url))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank_name.status(), StatusCode::BAD_REQUEST);

    let no_shell = client
        .get(format!("{}/index.html", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(no_shell.status(), StatusCode::NOT_FOUND);
}
