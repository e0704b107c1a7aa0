use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::DbPool;
use shared_models::auth::Role;
use shared_models::error::DbError;
use shared_models::pagination::Pagination;
use shared_utils::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use shared_utils::validation::{normalize_email, require_non_blank};

use crate::models::{CreateUserRequest, UpdateUserRequest, UserError, UserRecord, UserSearchQuery};

const USER_COLUMNS: &str =
    "id, email, name, role, is_active, mfa_enabled, created_at, updated_at";

pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord, UserError> {
        let email = normalize_email(&request.email).map_err(UserError::ValidationError)?;
        require_non_blank("name", &request.name).map_err(UserError::ValidationError)?;
        validate_password(&request.password)?;

        debug!("Creating user {} with role {}", email, request.role);

        let password_hash =
            hash_password(&request.password).map_err(|e| UserError::PasswordHash(e.to_string()))?;
        let now = Utc::now();
        let id = Uuid::new_v4();

        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&email)
        .bind(password_hash)
        .bind(request.name.trim())
        .bind(request.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation(_)) => return Err(UserError::EmailAlreadyExists { email }),
            Err(e) => return Err(e.into()),
        }

        info!("User {} created", id);
        self.get_user(id).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserRecord, UserError> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(UserError::NotFound)
    }

    pub async fn list_users(&self, query: UserSearchQuery) -> Result<Vec<UserRecord>, UserError> {
        let (limit, offset) = Pagination {
            limit: query.limit,
            offset: query.offset,
        }
        .resolve();

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE 1 = 1", USER_COLUMNS));
        if let Some(role) = query.role {
            builder.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(active) = query.is_active {
            builder.push(" AND is_active = ").push_bind(active);
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let users = builder.build_query_as::<UserRecord>().fetch_all(&self.pool).await?;
        Ok(users)
    }

    pub async fn update_user(&self, user_id: Uuid, request: UpdateUserRequest) -> Result<UserRecord, UserError> {
        debug!("Updating user {}", user_id);
        let current = self.get_user(user_id).await?;

        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(name) = request.name {
            require_non_blank("name", &name).map_err(UserError::ValidationError)?;
            builder.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(role) = request.role {
            if current.role == Role::Doctor && role != Role::Doctor {
                let assignments: i64 = sqlx::query_scalar(
                    "SELECT (SELECT COUNT(*) FROM patients WHERE assigned_doctor_id = ?1) \
                          + (SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1)",
                )
                .bind(user_id.to_string())
                .fetch_one(&mut *tx)
                .await?;
                if assignments > 0 {
                    return Err(UserError::DoctorInUse { assignments });
                }
            }
            builder.push(", role = ").push_bind(role.as_str());
        }
        if let Some(active) = request.is_active {
            builder.push(", is_active = ").push_bind(active);
        }
        if let Some(password) = request.password {
            validate_password(&password)?;
            let hash = hash_password(&password).map_err(|e| UserError::PasswordHash(e.to_string()))?;
            builder.push(", password_hash = ").push_bind(hash);
        }

        builder.push(" WHERE id = ").push_bind(user_id.to_string());
        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        self.get_user(user_id).await
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        info!("User {} deleted", user_id);
        Ok(())
    }

    /// Checks credentials and returns the active account they belong to.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, UserError> {
        let email = email.trim().to_lowercase();

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, password_hash)) = row else {
            debug!("Login attempt for unknown email");
            return Err(UserError::InvalidCredentials);
        };

        let valid = verify_password(password, &password_hash).map_err(|e| {
            warn!("Stored password hash for {} is unreadable: {}", id, e);
            UserError::InvalidCredentials
        })?;
        if !valid {
            return Err(UserError::InvalidCredentials);
        }

        let user_id = Uuid::parse_str(&id).map_err(|e| DbError::Query(e.to_string()))?;
        let user = self.get_user(user_id).await?;
        if !user.is_active {
            return Err(UserError::Inactive);
        }
        Ok(user)
    }

    /// Ensures `user_id` names an existing user holding the doctor role.
    pub async fn require_doctor(&self, user_id: Uuid) -> Result<UserRecord, UserError> {
        let user = self.get_user(user_id).await.map_err(|e| match e {
            UserError::NotFound => UserError::ValidationError(format!("Doctor {} does not exist", user_id)),
            other => other,
        })?;
        if user.role != Role::Doctor {
            return Err(UserError::ValidationError(format!("User {} is not a doctor", user_id)));
        }
        Ok(user)
    }
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserError::ValidationError(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
