//! Versioned schema migrations.
//!
//! Every migration carries an `up` and a `down` script. Applied versions are
//! recorded in `migrations_history`; each script runs together with its
//! history write inside one transaction, so a failing migration leaves no
//! trace behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared_models::error::DbError;
use tracing::{debug, info, warn};

use crate::pool::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct AppliedMigration {
    version: i64,
    name: String,
    applied_at: DateTime<Utc>,
}

const HISTORY_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS migrations_history (
        version INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        applied_at TEXT NOT NULL
    )
"#;

pub fn embedded_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 20240101000000,
            name: "create_users",
            up: include_str!("../migrations/20240101000000_create_users.up.sql"),
            down: include_str!("../migrations/20240101000000_create_users.down.sql"),
        },
        Migration {
            version: 20240101000100,
            name: "create_patients",
            up: include_str!("../migrations/20240101000100_create_patients.up.sql"),
            down: include_str!("../migrations/20240101000100_create_patients.down.sql"),
        },
        Migration {
            version: 20240101000200,
            name: "create_appointments",
            up: include_str!("../migrations/20240101000200_create_appointments.up.sql"),
            down: include_str!("../migrations/20240101000200_create_appointments.down.sql"),
        },
        Migration {
            version: 20240115000000,
            name: "create_photo_analyses",
            up: include_str!("../migrations/20240115000000_create_photo_analyses.up.sql"),
            down: include_str!("../migrations/20240115000000_create_photo_analyses.down.sql"),
        },
        Migration {
            version: 20240201000000,
            name: "create_payments",
            up: include_str!("../migrations/20240201000000_create_payments.up.sql"),
            down: include_str!("../migrations/20240201000000_create_payments.down.sql"),
        },
        Migration {
            version: 20240215000000,
            name: "create_catalog_tables",
            up: include_str!("../migrations/20240215000000_create_catalog_tables.up.sql"),
            down: include_str!("../migrations/20240215000000_create_catalog_tables.down.sql"),
        },
        Migration {
            version: 20240301000000,
            name: "photo_analyses_patient_id_to_text",
            up: include_str!("../migrations/20240301000000_photo_analyses_patient_id_to_text.up.sql"),
            down: include_str!("../migrations/20240301000000_photo_analyses_patient_id_to_text.down.sql"),
        },
        Migration {
            version: 20240310000000,
            name: "add_user_mfa",
            up: include_str!("../migrations/20240310000000_add_user_mfa.up.sql"),
            down: include_str!("../migrations/20240310000000_add_user_mfa.down.sql"),
        },
    ]
}

#[derive(Debug)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(migrations: Vec<Migration>) -> Result<Self, DbError> {
        for pair in migrations.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(DbError::Migration {
                    version: pair[1].version,
                    reason: format!(
                        "versions must be strictly increasing ({} follows {})",
                        pair[1].version, pair[0].version
                    ),
                });
            }
        }
        if let Some(unnamed) = migrations.iter().find(|m| m.name.trim().is_empty()) {
            return Err(DbError::Migration {
                version: unnamed.version,
                reason: "migration name is empty".to_string(),
            });
        }

        Ok(Self { migrations })
    }

    /// The migration set compiled into this binary.
    pub fn embedded() -> Result<Self, DbError> {
        Self::new(embedded_migrations())
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Applies every pending migration. Returns the versions applied by this call.
    pub async fn run(&self, pool: &DbPool) -> Result<Vec<i64>, DbError> {
        self.apply_pending(pool, i64::MAX).await
    }

    /// Applies pending migrations up to and including `target`.
    pub async fn run_until(&self, pool: &DbPool, target: i64) -> Result<Vec<i64>, DbError> {
        self.apply_pending(pool, target).await
    }

    /// Reverts the `steps` most recently applied migrations, newest first.
    pub async fn revert(&self, pool: &DbPool, steps: usize) -> Result<Vec<i64>, DbError> {
        self.ensure_history_table(pool).await?;
        let applied = self.applied(pool).await?;
        self.check_history(&applied)?;

        let by_version: BTreeMap<i64, &Migration> =
            self.migrations.iter().map(|m| (m.version, m)).collect();

        let mut reverted = Vec::new();
        for record in applied.iter().rev().take(steps) {
            let migration = by_version[&record.version];
            info!("Reverting migration {} ({})", migration.version, migration.name);

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(migration.down)
                .execute(&mut *tx)
                .await
                .map_err(|e| failure(migration.version, e))?;
            sqlx::query("DELETE FROM migrations_history WHERE version = ?")
                .bind(migration.version)
                .execute(&mut *tx)
                .await
                .map_err(|e| failure(migration.version, e))?;
            tx.commit().await.map_err(|e| failure(migration.version, e))?;

            reverted.push(migration.version);
        }

        if reverted.is_empty() {
            info!("No applied migrations to revert");
        }
        Ok(reverted)
    }

    pub async fn status(&self, pool: &DbPool) -> Result<Vec<MigrationStatus>, DbError> {
        self.ensure_history_table(pool).await?;
        let applied: BTreeMap<i64, AppliedMigration> = self
            .applied(pool)
            .await?
            .into_iter()
            .map(|a| (a.version, a))
            .collect();

        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name.to_string(),
                applied_at: applied.get(&m.version).map(|a| a.applied_at),
            })
            .collect())
    }

    async fn apply_pending(&self, pool: &DbPool, target: i64) -> Result<Vec<i64>, DbError> {
        self.ensure_history_table(pool).await?;
        let applied = self.applied(pool).await?;
        self.check_history(&applied)?;

        let latest = applied.last().map(|a| a.version).unwrap_or(0);
        let done: Vec<i64> = applied.iter().map(|a| a.version).collect();
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version <= target && !done.contains(&m.version))
            .collect();

        if let Some(stale) = pending.iter().find(|m| m.version < latest) {
            return Err(DbError::Migration {
                version: stale.version,
                reason: format!("pending migration is older than the latest applied ({})", latest),
            });
        }

        let mut newly_applied = Vec::new();
        for migration in pending {
            info!("Applying migration {} ({})", migration.version, migration.name);

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .map_err(|e| failure(migration.version, e))?;
            sqlx::query("INSERT INTO migrations_history (version, name, applied_at) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(|e| failure(migration.version, e))?;
            tx.commit().await.map_err(|e| failure(migration.version, e))?;

            newly_applied.push(migration.version);
        }

        if newly_applied.is_empty() {
            debug!("Schema is up to date");
        } else {
            info!("Applied {} migration(s)", newly_applied.len());
        }
        Ok(newly_applied)
    }

    async fn ensure_history_table(&self, pool: &DbPool) -> Result<(), DbError> {
        sqlx::query(HISTORY_TABLE_SQL).execute(pool).await?;
        Ok(())
    }

    async fn applied(&self, pool: &DbPool) -> Result<Vec<AppliedMigration>, DbError> {
        let rows: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT version, name, applied_at FROM migrations_history ORDER BY version",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(version, name, applied_at)| AppliedMigration { version, name, applied_at })
            .collect())
    }

    fn check_history(&self, applied: &[AppliedMigration]) -> Result<(), DbError> {
        for record in applied {
            match self.migrations.iter().find(|m| m.version == record.version) {
                None => {
                    warn!("Database has migration {} which this binary does not know", record.version);
                    return Err(DbError::Migration {
                        version: record.version,
                        reason: "applied migration is unknown to this binary".to_string(),
                    });
                }
                Some(m) if m.name != record.name => {
                    return Err(DbError::Migration {
                        version: record.version,
                        reason: format!("recorded as {:?} but embedded as {:?}", record.name, m.name),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn failure(version: i64, error: sqlx::Error) -> DbError {
    DbError::Migration {
        version,
        reason: error.to_string(),
    }
}
