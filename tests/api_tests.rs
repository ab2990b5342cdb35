// tests/api_tests.rs

use std::str::FromStr;

use engauge::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

struct TestApp {
    address: String,
    pool: SqlitePool,
    // Held so the database and upload files outlive the test.
    _db_dir: tempfile::TempDir,
    _upload_dir: tempfile::TempDir,
}

/// Helper function to spawn the app on a random port for testing.
/// Each call gets its own throwaway SQLite database and upload dir.
async fn spawn_app() -> TestApp {
    let db_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = db_dir.path().join("engauge_test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let connect_options = SqliteConnectOptions::from_str(&database_url)
        .expect("Invalid sqlite URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("Failed to open test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");

    // No GROQ_API_KEY: question generation uses the mock set.
    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        upload_dir: upload_dir.path().display().to_string(),
        groq_api_key: None,
        groq_model: "llama-3.1-70b-versatile".to_string(),
        professor_username: None,
        professor_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        _db_dir: db_dir,
        _upload_dir: upload_dir,
    }
}

async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> String {
    let username = format!("{}_{}", role, &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password,
            "role": role
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    assert_eq!(login["role"], role);
    login["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_rejects_duplicates() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let body = serde_json::json!({
        "username": unique_name,
        "password": "password123"
    });

    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    // Role defaults to student.
    assert_eq!(created["role"], "student");

    let duplicate = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(duplicate.status().as_u16(), 409);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);

    // Unknown role
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": "valid_name",
            "password": "password123",
            "role": "superuser"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let _token = register_and_login(&client, &app.address, "student").await;

    let response = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({
            "username": "no_such_user",
            "password": "whatever1"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn instructor_routes_require_auth_and_role() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // No token at all
    let response = client
        .get(format!("{}/api/polls", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    // Student token on an instructor route
    let student_token = register_and_login(&client, &app.address, "student").await;
    let response = client
        .get(format!("{}/api/polls", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn course_create_join_and_list_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let professor_token = register_and_login(&client, &app.address, "professor").await;
    let student_token = register_and_login(&client, &app.address, "student").await;

    // Student cannot create a course
    let response = client
        .post(format!("{}/api/courses", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({"name": "Biology 101"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 403);

    // Professor creates one
    let course: serde_json::Value = client
        .post(format!("{}/api/courses", app.address))
        .header("Authorization", format!("Bearer {}", professor_token))
        .json(&serde_json::json!({"name": "Biology 101"}))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    let join_code = course["join_code"].as_str().expect("join_code missing");
    assert_eq!(join_code.len(), 8);

    // Student joins with the code
    let response = client
        .post(format!("{}/api/courses/join", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({"join_code": join_code}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    // Joining twice conflicts
    let response = client
        .post(format!("{}/api/courses/join", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({"join_code": join_code}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);

    // A bad code is a 404
    let response = client
        .post(format!("{}/api/courses/join", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({"join_code": "WRONGCODE"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);

    // The course shows up in the student's list
    let courses: Vec<serde_json::Value> = client
        .get(format!("{}/api/courses", app.address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["name"], "Biology 101");
}

#[tokio::test]
async fn upload_generates_questions_and_review_creates_a_poll() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.address, "professor").await;

    // Upload a plain-text document. With no API key the mock generator
    // produces two pending questions and says so in the diagnostic.
    let form = reqwest::multipart::Form::new()
        .text("title", "Lecture 3")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"Formative assessment happens during instruction.".to_vec())
                .file_name("lecture3.txt"),
        );

    let upload: serde_json::Value = client
        .post(format!("{}/api/documents", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .expect("Upload failed")
        .json()
        .await
        .unwrap();

    assert_eq!(upload["question_count"], 2);
    assert_eq!(upload["generation"]["source"], "mock");
    assert_eq!(upload["generation"]["error"], "Missing GROQ_API_KEY");
    let doc_id = upload["id"].as_str().unwrap();

    // Both items are pending review
    let questions: Vec<serde_json::Value> = client
        .get(format!("{}/api/documents/{}/questions", app.address, doc_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to list questions")
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 2);

    // Accept the first with an inline text edit; it becomes a poll.
    let first_id = questions[0]["id"].as_str().unwrap();
    let review: serde_json::Value = client
        .post(format!("{}/api/documents/{}/review", app.address, doc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question_id": first_id,
            "action": "accept",
            "text": "Edited question text?"
        }))
        .send()
        .await
        .expect("Review failed")
        .json()
        .await
        .unwrap();
    assert_eq!(review["status"], "accepted");
    let poll_id = review["poll_id"].as_str().expect("poll_id missing");

    let poll: serde_json::Value = client
        .get(format!("{}/api/polls/{}", app.address, poll_id))
        .send()
        .await
        .expect("Failed to fetch poll")
        .json()
        .await
        .unwrap();
    assert_eq!(poll["question_text"], "Edited question text?");
    assert_eq!(poll["question_format"], "single_choice");

    // Reject the second; it disappears from the pending list.
    let second_id = questions[1]["id"].as_str().unwrap();
    let response = client
        .post(format!("{}/api/documents/{}/review", app.address, doc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question_id": second_id,
            "action": "reject"
        }))
        .send()
        .await
        .expect("Review failed");
    assert_eq!(response.status().as_u16(), 200);

    let pending: Vec<serde_json::Value> = client
        .get(format!("{}/api/documents/{}/questions", app.address, doc_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to list questions")
        .json()
        .await
        .unwrap();
    assert!(pending.is_empty());

    // Reviewing the same question again conflicts.
    let response = client
        .post(format!("{}/api/documents/{}/review", app.address, doc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question_id": first_id,
            "action": "accept"
        }))
        .send()
        .await
        .expect("Review failed");
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn exit_ticket_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.address, "professor").await;

    // No active ticket yet
    let response = client
        .get(format!("{}/api/tickets/active", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);

    // Create and activate a ticket
    let created: serde_json::Value = client
        .post(format!("{}/api/tickets", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"prompt_text": "What was the muddiest point today?"}))
        .send()
        .await
        .expect("Create failed")
        .json()
        .await
        .unwrap();
    let ticket_id = created["id"].as_str().unwrap();

    let toggled: serde_json::Value = client
        .post(format!("{}/api/tickets/{}/toggle", app.address, ticket_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Toggle failed")
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["active"], true);

    // Students see it and answer
    let active: serde_json::Value = client
        .get(format!("{}/api/tickets/active", app.address))
        .send()
        .await
        .expect("Failed to fetch active ticket")
        .json()
        .await
        .unwrap();
    assert_eq!(active["id"], ticket_id);

    for answer in ["The aggregation part", "Nothing, all clear"] {
        let response = client
            .post(format!("{}/api/tickets/{}/submit", app.address, ticket_id))
            .json(&serde_json::json!({"answer": answer}))
            .send()
            .await
            .expect("Submit failed");
        assert_eq!(response.status().as_u16(), 201);
    }

    // Blank answers are refused
    let response = client
        .post(format!("{}/api/tickets/{}/submit", app.address, ticket_id))
        .json(&serde_json::json!({"answer": "   "}))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 400);

    let results: serde_json::Value = client
        .get(format!("{}/api/tickets/{}/results", app.address, ticket_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Results failed")
        .json()
        .await
        .unwrap();
    assert_eq!(results["total"], 2);

    // Delete cascades the responses
    let response = client
        .delete(format!("{}/api/tickets/{}/delete", app.address, ticket_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Delete failed");
    assert_eq!(response.status().as_u16(), 204);

    let orphaned: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM exit_ticket_responses WHERE ticket_id = ?1")
            .bind(ticket_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(orphaned, 0);
}
