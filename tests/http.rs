use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

#[derive(Debug, Deserialize)]
struct Habit {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ToggleResponse {
    habit_id: String,
    date: String,
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct HabitStats {
    habit_id: String,
    current_streak: u32,
    longest_streak: u32,
    completion_rate: u32,
    weekly: Vec<Value>,
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
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

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

fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}_{}", std::process::id(), nanos)
}

fn unique_data_path() -> String {
    let mut path = std::env::temp_dir();
    path.push(format!("habit_tracker_http_{}.json", unique_suffix()));
    path.to_string_lossy().to_string()
}

fn unique_owner(prefix: &str) -> String {
    format!("{prefix}-{}", unique_suffix())
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
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
    spawn_server_with(&[]).await
}

async fn spawn_server_with(envs: &[(&str, String)]) -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_habit_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_BASE_URL")
        .env_remove("GEMINI_MODEL")
        .envs(envs.iter().map(|(key, value)| (*key, value.as_str())))
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

async fn create_habit(client: &Client, base_url: &str, owner: &str, name: &str) -> Habit {
    let response = client
        .post(format!("{base_url}/api/habits"))
        .header("x-user-id", owner)
        .json(&json!({ "name": name, "category": "Health", "description": "daily" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn toggle(
    client: &Client,
    base_url: &str,
    owner: &str,
    habit_id: &str,
    date: &str,
) -> ToggleResponse {
    let response = client
        .post(format!("{base_url}/api/habits/{habit_id}/toggle"))
        .header("x-user-id", owner)
        .json(&json!({ "date": date }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

fn utc_today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Reads server-sent events off a streaming response.
struct EventReader {
    response: reqwest::Response,
    buffer: String,
}

impl EventReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Skips keep-alives and other events until one called `name` arrives.
    async fn next(&mut self, name: &str) -> Value {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let mut event = None;
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        event = Some(value.trim().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                if event.as_deref() == Some(name) {
                    return serde_json::from_str(&data).unwrap();
                }
            }
            let chunk = timeout(Duration::from_secs(5), self.response.chunk())
                .await
                .expect("timed out waiting for event")
                .unwrap()
                .expect("event stream ended");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

static GEMINI_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Minimal stand-in for the Gemini `generateContent` endpoint.
async fn spawn_fake_gemini() -> String {
    use axum::extract::{Json, Path, Query};
    use axum::{Router, routing::post};
    use std::collections::HashMap;

    async fn generate_content(
        Path(call): Path<String>,
        Query(params): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        GEMINI_CALLS.fetch_add(1, Ordering::SeqCst);
        assert_eq!(call, "gemini-pro:generateContent");
        assert_eq!(params.get("key").map(String::as_str), Some("test-key"));
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
        let text = if prompt.contains("Run a marathon") {
            "One step at a time, Sam."
        } else {
            "Keep going."
        };
        Json(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }))
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/v1beta/models/:call", post(generate_content));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_requests_without_owner_are_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/habits", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_toggle_drives_streak_stats() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("streak");
    let habit = create_habit(&client, &server.base_url, &owner, "Stretch").await;
    assert_eq!(habit.name, "Stretch");

    let today = utc_today();
    let yesterday = today.pred_opt().unwrap();
    for day in [yesterday, today] {
        let toggled = toggle(&client, &server.base_url, &owner, &habit.id, &day.to_string()).await;
        assert!(toggled.completed);
        assert_eq!(toggled.habit_id, habit.id);
        assert_eq!(toggled.date, day.to_string());
    }

    let stats: HabitStats = client
        .get(format!("{}/api/habits/{}/stats", server.base_url, habit.id))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats.habit_id, habit.id);
    assert_eq!(stats.current_streak, 2);
    assert_eq!(stats.longest_streak, 2);
    assert_eq!(stats.completion_rate, 7);
    assert_eq!(stats.weekly.len(), 7);

    let untoggled = toggle(&client, &server.base_url, &owner, &habit.id, &today.to_string()).await;
    assert!(!untoggled.completed);

    let all: Vec<HabitStats> = client
        .get(format!("{}/api/stats", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].current_streak, 1);
}

#[tokio::test]
async fn http_invalid_input_reports_fields() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("invalid");

    let response = client
        .post(format!("{}/api/habits", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({ "name": " ", "category": "Health", "description": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["fields"]["name"], "Habit name is required");
    assert!(body["fields"]["description"].is_string());

    let habit = create_habit(&client, &server.base_url, &owner, "Journal").await;
    let response = client
        .post(format!("{}/api/habits/{}/toggle", server.base_url, habit.id))
        .header("x-user-id", &owner)
        .json(&json!({ "date": "yesterday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn http_rows_are_private_to_their_owner() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("alice");
    let intruder = unique_owner("mallory");

    let response = client
        .post(format!("{}/api/goals", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({
            "name": "Run a 10k",
            "importance": "to feel strong",
            "expiry_date": "2027-01-01"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let goal: Value = response.json().await.unwrap();
    let goal_id = goal["id"].as_str().unwrap().to_string();

    let response = client
        .get(format!("{}/api/goals/{goal_id}", server.base_url))
        .header("x-user-id", &intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .delete(format!("{}/api/goals/{goal_id}", server.base_url))
        .header("x-user-id", &intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let goals: Vec<Value> = client
        .get(format!("{}/api/goals", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["expiry_date"], "2027-01-01");
}

#[tokio::test]
async fn http_flexbook_posts_round_trip() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("flex");

    let created: Value = client
        .post(format!("{}/api/posts", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({
            "title": "Week one",
            "caption": "Seven for seven",
            "image_url": "https://img.example/1.jpg"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let updated: Value = client
        .put(format!("{}/api/posts/{id}", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({ "title": "Week one!", "caption": "Seven for seven" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["title"], "Week one!");
    assert!(updated["image_url"].is_null());

    let response = client
        .delete(format!("{}/api/posts/{id}", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn http_onboarding_goal_creates_habit() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("onboard");

    let response = client
        .put(format!("{}/api/onboarding/survey", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({ "age_category": "26-35" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/api/onboarding/goal", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({
            "goal": { "name": "Read more", "importance": "curiosity" },
            "habit": {
                "name": "Read 10 pages",
                "category": "Learning",
                "description": "before bed"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let habits: Vec<Habit> = client
        .get(format!("{}/api/habits", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0].name, "Read 10 pages");
}

#[tokio::test]
async fn http_coach_requires_configuration() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/coach", server.base_url))
        .header("x-user-id", unique_owner("coach"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn http_board_page_lists_habits() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("board");
    create_habit(&client, &server.base_url, &owner, "Drink water").await;

    let response = client
        .get(format!("{}/u/{owner}", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let html = response.text().await.unwrap();
    assert!(html.contains("Drink water"));
    assert!(html.contains("Current streak"));
}

#[tokio::test]
async fn http_stats_stream_follows_toggles() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("stream");
    let habit = create_habit(&client, &server.base_url, &owner, "Floss").await;

    let response = client
        .get(format!("{}/api/stats/stream", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let mut events = EventReader::new(response);

    let first = events.next("stats").await;
    assert_eq!(first[0]["habit_id"], habit.id.as_str());
    assert_eq!(first[0]["current_streak"], 0);

    toggle(&client, &server.base_url, &owner, &habit.id, &utc_today().to_string()).await;
    let second = events.next("stats").await;
    assert_eq!(second[0]["current_streak"], 1);
    assert_eq!(second[0]["completion_rate"], 3);
}

#[tokio::test]
async fn http_stats_stream_can_follow_one_habit() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = unique_owner("stream-one");
    let followed = create_habit(&client, &server.base_url, &owner, "Walk").await;
    let other = create_habit(&client, &server.base_url, &owner, "Read").await;

    let response = client
        .get(format!("{}/api/stats/stream", server.base_url))
        .query(&[("habit_id", uuid::Uuid::new_v4().to_string())])
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/api/stats/stream", server.base_url))
        .query(&[("habit_id", followed.id.as_str())])
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap();
    let mut events = EventReader::new(response);
    let first = events.next("stats").await;
    assert_eq!(first.as_array().map(Vec::len), Some(1));
    assert_eq!(first[0]["habit_id"], followed.id.as_str());

    let today = utc_today().to_string();
    toggle(&client, &server.base_url, &owner, &other.id, &today).await;
    toggle(&client, &server.base_url, &owner, &followed.id, &today).await;
    let next = events.next("stats").await;
    assert_eq!(next.as_array().map(Vec::len), Some(1));
    assert_eq!(next[0]["current_streak"], 1);
}

#[tokio::test]
async fn http_coach_needs_profile_then_caches_message() {
    let _guard = TEST_LOCK.lock().await;
    let gemini_url = spawn_fake_gemini().await;
    let server = spawn_server_with(&[
        ("GEMINI_API_KEY", "test-key".to_string()),
        ("GEMINI_BASE_URL", gemini_url),
    ])
    .await;
    let client = Client::new();
    let owner = unique_owner("coached");

    let response = client
        .get(format!("{}/api/coach", server.base_url))
        .header("x-user-id", &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .put(format!("{}/api/profile", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({ "first_name": "Sam", "last_name": "Lee", "email": "sam@example.com" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let response = client
        .post(format!("{}/api/goals", server.base_url))
        .header("x-user-id", &owner)
        .json(&json!({ "name": "Run a marathon", "importance": "health" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let calls_before = GEMINI_CALLS.load(Ordering::SeqCst);
    for _ in 0..2 {
        let message: Value = client
            .get(format!("{}/api/coach", server.base_url))
            .header("x-user-id", &owner)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(message["text"], "One step at a time, Sam.");
        assert_eq!(message["date"], utc_today().to_string());
    }
    assert_eq!(GEMINI_CALLS.load(Ordering::SeqCst), calls_before + 1);
}
