//! End-to-end authentication scenarios against a real server and
//! database. Requires a running Postgres instance, so the suite is
//! ignored by default: `cargo test -- --ignored` with Postgres up.

use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use taskboard::configuration::{get_configuration, DatabaseSettings};
use taskboard::startup::run;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let server = run(listener, connection_pool.clone(), configuration).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

async fn register_user(app: &TestApp, client: &reqwest::Client) -> Value {
    let body = json!({
        "name": "John Doe",
        "email": "a@b.com",
        "password": "CorrectPass123"
    });

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    response.json().await.expect("Failed to parse response")
}

// --- Registration ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_returns_201_and_opens_a_session() {
    let app = spawn_app().await;
    let client = cookie_client();

    let body = json!({
        "name": "John Doe",
        "email": "john@example.com",
        "password": "SecurePass123"
    });

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|h| h.to_str().ok())
        .expect("No refresh cookie set");
    assert!(set_cookie.contains("refreshToken="));
    assert!(set_cookie.contains("HttpOnly"));

    let response_body: Value = response.json().await.expect("Failed to parse response");
    assert!(response_body.get("accessToken").is_some());
    assert_eq!(response_body["user"]["email"], "john@example.com");
    assert!(response_body["user"].get("password").is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'john@example.com'")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to count users");
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app().await;
    let client = cookie_client();

    let test_cases = vec![
        (json!({"name": "Test", "email": "notanemail", "password": "SecurePass123"}), "invalid email"),
        (json!({"name": "", "email": "test@example.com", "password": "SecurePass123"}), "empty name"),
        (json!({"name": "Test", "email": "test@example.com", "password": "weak"}), "weak password"),
        (json!({"email": "test@example.com", "password": "SecurePass123"}), "missing name"),
    ];

    for (body, reason) in test_cases {
        let response = client
            .post(&format!("{}/auth/register", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app().await;
    let client = cookie_client();

    register_user(&app, &client).await;

    let body = json!({
        "name": "Someone Else",
        "email": "a@b.com",
        "password": "OtherPass123"
    });
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
}

// --- Login ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_returns_200_with_token_and_cookie() {
    let app = spawn_app().await;
    register_user(&app, &cookie_client()).await;

    let client = cookie_client();
    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "a@b.com", "password": "CorrectPass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|h| h.to_str().ok())
        .expect("No refresh cookie set");
    assert!(set_cookie.contains("refreshToken="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let response_body: Value = response.json().await.expect("Failed to parse response");
    assert!(response_body.get("accessToken").is_some());
    assert_eq!(response_body["user"]["email"], "a@b.com");
    assert!(response_body["user"].get("password").is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_returns_identical_401_for_wrong_password_and_unknown_email() {
    let app = spawn_app().await;
    register_user(&app, &cookie_client()).await;
    let client = cookie_client();

    let attempts = vec![
        json!({ "email": "a@b.com", "password": "wrong" }),
        json!({ "email": "nobody@example.com", "password": "CorrectPass123" }),
    ];

    for body in attempts {
        let response = client
            .post(&format!("{}/auth/login", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16());
        let response_body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(response_body["message"], "Invalid credentials");
    }
}

// --- Refresh ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_returns_new_access_token_without_rotating_the_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();
    register_user(&app, &client).await;

    // The cookie from registration rides along automatically.
    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    assert!(
        response.headers().get("set-cookie").is_none(),
        "Refresh must not rotate the cookie"
    );

    let response_body: Value = response.json().await.expect("Failed to parse response");
    let access_token = response_body["accessToken"]
        .as_str()
        .expect("No access token in refresh response");

    // The refreshed token works against a protected endpoint.
    let me = client
        .get(&format!("{}/auth/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, me.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_returns_401_without_a_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let response_body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(response_body["message"], "Invalid refresh token");
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_returns_401_for_a_garbage_cookie() {
    let app = spawn_app().await;
    let client = cookie_client();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Cookie", "refreshToken=definitely.not.valid")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Logout ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn logout_clears_the_cookie_and_is_idempotent() {
    let app = spawn_app().await;
    let client = cookie_client();
    register_user(&app, &client).await;

    for _ in 0..2 {
        let response = client
            .post(&format!("{}/auth/logout", &app.address))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(200, response.status().as_u16());
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|h| h.to_str().ok())
            .expect("Logout must clear the cookie");
        assert!(set_cookie.contains("refreshToken="));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    // With the cookie cleared, refresh is rejected.
    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
}

// --- Current user ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn me_returns_the_user_for_a_valid_token() {
    let app = spawn_app().await;
    let client = cookie_client();
    let session = register_user(&app, &client).await;
    let access_token = session["accessToken"].as_str().unwrap();

    let response = client
        .get(&format!("{}/auth/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["name"], "John Doe");
    assert!(body.get("password").is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn me_returns_401_for_missing_or_invalid_tokens() {
    let app = spawn_app().await;
    let client = cookie_client();

    let no_token = client
        .get(&format!("{}/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, no_token.status().as_u16());

    let bad_token = client
        .get(&format!("{}/auth/me", &app.address))
        .header("Authorization", "Bearer invalid.token.here")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, bad_token.status().as_u16());
}
