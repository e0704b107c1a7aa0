use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, DatabaseConfig};
use shared_database::{connect_in_memory, AppState, Migrator};
use shared_models::auth::{Role, User};

use crate::password::hash_password;

pub const TEST_PASSWORD: &str = "Clinic-Test-Pass-1";

pub struct TestConfig {
    pub jwt_secret: String,
    pub environment: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            environment: "test".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            environment: self.environment.clone(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                ..DatabaseConfig::default()
            },
            jwt_secret: self.jwt_secret.clone(),
            jwt_expiry_hours: 24,
            basic_auth: None,
        }
    }
}

/// Fully migrated in-memory database behind an `AppState`.
pub async fn test_state() -> Arc<AppState> {
    test_state_with(TestConfig::default().to_app_config()).await
}

pub async fn test_state_with(config: AppConfig) -> Arc<AppState> {
    let pool = connect_in_memory().await.expect("in-memory database");
    Migrator::embedded()
        .expect("embedded migrations are valid")
        .run(&pool)
        .await
        .expect("migrations apply");
    AppState::new(config, pool)
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Staff)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: format!("Test {}", role),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, Role::Staff)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Persists the user with `TEST_PASSWORD` as password.
    pub async fn insert(&self, state: &AppState) -> &Self {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(self.id.to_string())
        .bind(&self.email)
        .bind(hash_password(TEST_PASSWORD).expect("hash test password"))
        .bind(&self.name)
        .bind(self.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&state.db)
        .await
        .expect("insert test user");
        self
    }

    pub fn token(&self, state: &AppState) -> String {
        JwtTestUtils::create_test_token(self, &state.config.jwt_secret, Some(24))
    }
}

/// Inserts a bare active patient and returns its id.
pub async fn insert_test_patient(state: &AppState, name: &str, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO patients (id, name, email, status, created_at, updated_at) VALUES (?, ?, ?, 'active', ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(email)
    .bind(now)
    .bind(now)
    .execute(&state.db)
    .await
    .expect("insert test patient");
    id
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("sign test token")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json body")
}
