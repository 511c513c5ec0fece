// tests/api_tests.rs

use schoolquiz::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;

/// Helper to spawn the app on a random port for testing.
/// Returns the base URL and a pool for seeding, or `None` when no
/// DATABASE_URL is configured (the suite then skips).
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
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

    Some((address, pool))
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Seeds an admin directly and logs in, returning a bearer token.
async fn admin_token(address: &str, pool: &PgPool) -> String {
    let username = unique_name("adm");
    let hashed = hash_password("adminpass").expect("hash");

    sqlx::query("INSERT INTO users (username, password, role) VALUES ($1, $2, 'admin')")
        .bind(&username)
        .bind(&hashed)
        .execute(pool)
        .await
        .expect("seed admin");

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": &username, "password": "adminpass"}))
        .send()
        .await
        .expect("admin login")
        .json::<serde_json::Value>()
        .await
        .expect("login json");

    resp["token"].as_str().expect("token").to_string()
}

const IMPORT_TEXT: &str = "#1.What is 2+2?\n#ball:2\nA) 3\n+B) 4\nC) 5\n#2.Capital of France?\n#ball:1\n+A) Paris\nB) London\n";

#[tokio::test]
async fn unknown_route_is_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_validates() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name("stu"),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn dashboard_without_class_is_informational() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let username = unique_name("stu");

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": &username, "password": "password123"}))
        .send()
        .await
        .expect("register");

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": &username, "password": "password123"}))
        .send()
        .await
        .expect("login")
        .json::<serde_json::Value>()
        .await
        .expect("login json");
    let token = login["token"].as_str().expect("token");
    assert_eq!(login["role"], "student");

    let dashboard = client
        .get(format!("{}/api/student/dashboard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("dashboard")
        .json::<serde_json::Value>()
        .await
        .expect("dashboard json");

    assert!(dashboard["class_name"].is_null());
    assert!(dashboard["message"].as_str().is_some());
    assert_eq!(dashboard["rank"], 0);

    // Listing tests without a class is a user-facing 400, not a crash.
    let tests = client
        .get(format!("{}/api/student/tests", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("tests");
    assert_eq!(tests.status().as_u16(), 400);
}

#[tokio::test]
async fn full_import_and_submission_flow() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool).await;

    // 1. Admin sets up class and test, then bulk-imports questions.
    let class_name = unique_name("c");
    let class_id = client
        .post(format!("{}/api/admin/class-groups", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"name": class_name}))
        .send()
        .await
        .expect("create class")
        .json::<serde_json::Value>()
        .await
        .expect("class json")["id"]
        .as_i64()
        .expect("class id");

    let test_id = client
        .post(format!("{}/api/admin/tests", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"name": "Math midterm", "class_group_id": class_id}))
        .send()
        .await
        .expect("create test")
        .json::<serde_json::Value>()
        .await
        .expect("test json")["id"]
        .as_i64()
        .expect("test id");

    let import = client
        .post(format!("{}/api/admin/tests/{}/import", address, test_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"text": IMPORT_TEXT}))
        .send()
        .await
        .expect("import");
    assert_eq!(import.status().as_u16(), 201);
    let import = import.json::<serde_json::Value>().await.expect("import json");
    assert_eq!(import["imported"], 2);

    // 2. Student registers and is assigned to the class by the admin.
    let username = unique_name("stu");
    let student = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": &username, "password": "password123"}))
        .send()
        .await
        .expect("register")
        .json::<serde_json::Value>()
        .await
        .expect("register json");
    let student_id = student["id"].as_i64().expect("student id");

    let assign = client
        .put(format!("{}/api/admin/users/{}", address, student_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"class_group_id": class_id}))
        .send()
        .await
        .expect("assign class");
    assert_eq!(assign.status().as_u16(), 200);

    let token = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": &username, "password": "password123"}))
        .send()
        .await
        .expect("login")
        .json::<serde_json::Value>()
        .await
        .expect("login json")["token"]
        .as_str()
        .expect("token")
        .to_string();

    // 3. The test shows up as unsolved with two questions.
    let tests = client
        .get(format!("{}/api/student/tests", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("list tests")
        .json::<serde_json::Value>()
        .await
        .expect("tests json");
    let entry = tests
        .as_array()
        .expect("array")
        .iter()
        .find(|t| t["id"].as_i64() == Some(test_id))
        .expect("test listed");
    assert_eq!(entry["solved"], false);
    assert_eq!(entry["total_questions"], 2);

    // 4. Fetch the paper; correctness flags must not be exposed.
    let paper = client
        .get(format!("{}/api/student/tests/{}", address, test_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("get test")
        .json::<serde_json::Value>()
        .await
        .expect("paper json");
    assert_eq!(paper["already_solved"], false);
    let questions = paper["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    for q in questions {
        for o in q["options"].as_array().expect("options") {
            assert!(o.get("is_correct").is_none());
        }
    }

    // 5. Look up the correct options directly and submit them.
    #[derive(sqlx::FromRow)]
    struct Correct {
        question_id: i64,
        id: i64,
    }
    let correct = sqlx::query_as::<_, Correct>(
        "SELECT o.question_id, o.id FROM options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.test_id = $1 AND o.is_correct",
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await
    .expect("correct options");

    let answers: HashMap<String, i64> = correct
        .iter()
        .map(|c| (c.question_id.to_string(), c.id))
        .collect();
    let submission_body = serde_json::json!({ "answers": answers });

    let submit = client
        .post(format!("{}/api/student/tests/{}/submit", address, test_id))
        .bearer_auth(&token)
        .json(&submission_body)
        .send()
        .await
        .expect("submit")
        .json::<serde_json::Value>()
        .await
        .expect("submit json");

    assert_eq!(submit["score"], 3);
    assert_eq!(submit["correct_count"], 2);
    assert_eq!(submit["total_questions"], 2);
    assert_eq!(submit["already_submitted"], false);
    let result_id = submit["result_id"].as_i64().expect("result id");

    // 6. Cumulative points land on the dashboard.
    let dashboard = client
        .get(format!("{}/api/student/dashboard", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("dashboard")
        .json::<serde_json::Value>()
        .await
        .expect("dashboard json");
    assert_eq!(dashboard["total_points"], 3);
    assert_eq!(dashboard["tests_solved"], 1);

    // 7. A second submission does not create a second result.
    let resubmit = client
        .post(format!("{}/api/student/tests/{}/submit", address, test_id))
        .bearer_auth(&token)
        .json(&submission_body)
        .send()
        .await
        .expect("resubmit")
        .json::<serde_json::Value>()
        .await
        .expect("resubmit json");
    assert_eq!(resubmit["already_submitted"], true);
    assert_eq!(resubmit["result_id"], result_id);

    // 8. Review is idempotent: two renders, identical annotations.
    let review_url = format!("{}/api/student/results/{}", address, result_id);
    let first = client
        .get(&review_url)
        .bearer_auth(&token)
        .send()
        .await
        .expect("review")
        .json::<serde_json::Value>()
        .await
        .expect("review json");
    let second = client
        .get(&review_url)
        .bearer_auth(&token)
        .send()
        .await
        .expect("review again")
        .json::<serde_json::Value>()
        .await
        .expect("review json again");
    assert_eq!(first, second);
    assert_eq!(first["result"]["score"], 3);
    for q in first["questions"].as_array().expect("review questions") {
        assert_eq!(q["answered_correctly"], true);
    }

    // 9. The admin sees the outcome in the per-test results listing.
    let results = client
        .get(format!("{}/api/admin/tests/{}/results", address, test_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("admin results")
        .json::<serde_json::Value>()
        .await
        .expect("results json");
    let row = results
        .as_array()
        .expect("rows")
        .iter()
        .find(|r| r["username"] == serde_json::json!(username))
        .expect("student row");
    assert_eq!(row["score"], 3);
}

#[tokio::test]
async fn student_routes_reject_admins_and_anonymous() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let anonymous = client
        .get(format!("{}/api/student/dashboard", address))
        .send()
        .await
        .expect("anonymous");
    assert_eq!(anonymous.status().as_u16(), 401);

    let admin = admin_token(&address, &pool).await;
    let as_admin = client
        .get(format!("{}/api/student/dashboard", address))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("as admin");
    assert_eq!(as_admin.status().as_u16(), 403);
}
