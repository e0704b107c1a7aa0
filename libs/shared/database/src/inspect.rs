//! Read-only schema and content inspection, used by the CLI and by the
//! migration reversibility tests.

use serde::Serialize;
use serde_json::Value;
use shared_models::error::DbError;

use crate::pool::DbPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub references_table: String,
    pub references_column: Option<String>,
    pub on_update: String,
    pub on_delete: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub origin: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub row_count: i64,
}

pub async fn list_tables(pool: &DbPool) -> Result<Vec<String>, DbError> {
    let names = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(names)
}

pub async fn summarize(pool: &DbPool) -> Result<Vec<TableSummary>, DbError> {
    let mut summaries = Vec::new();
    for name in list_tables(pool).await? {
        let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(&name)))
            .fetch_one(pool)
            .await?;
        summaries.push(TableSummary { name, row_count });
    }
    Ok(summaries)
}

pub async fn table_schema(pool: &DbPool, table: &str) -> Result<TableSchema, DbError> {
    ensure_table(pool, table).await?;

    let columns: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let foreign_keys: Vec<(String, String, Option<String>, String, String)> = sqlx::query_as(
        r#"SELECT "from", "table", "to", on_update, on_delete FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let index_rows: Vec<(String, i64, String)> = sqlx::query_as(
        r#"SELECT name, "unique", origin FROM pragma_index_list(?) ORDER BY name"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let mut indexes = Vec::with_capacity(index_rows.len());
    for (name, unique, origin) in index_rows {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&name)
                .fetch_all(pool)
                .await?;
        indexes.push(IndexInfo {
            name,
            unique: unique != 0,
            origin,
            columns,
        });
    }

    Ok(TableSchema {
        name: table.to_string(),
        columns: columns
            .into_iter()
            .map(|(name, declared_type, not_null, default_value, pk)| ColumnInfo {
                name,
                declared_type,
                not_null: not_null != 0,
                default_value,
                primary_key: pk != 0,
            })
            .collect(),
        foreign_keys: foreign_keys
            .into_iter()
            .map(|(column, references_table, references_column, on_update, on_delete)| ForeignKeyInfo {
                column,
                references_table,
                references_column,
                on_update,
                on_delete,
            })
            .collect(),
        indexes,
    })
}

/// Structural snapshot of every user table except `exclude`.
pub async fn schema_snapshot(pool: &DbPool, exclude: &[&str]) -> Result<Vec<TableSchema>, DbError> {
    let mut snapshot = Vec::new();
    for table in list_tables(pool).await? {
        if exclude.contains(&table.as_str()) {
            continue;
        }
        snapshot.push(table_schema(pool, &table).await?);
    }
    Ok(snapshot)
}

/// First `limit` rows of `table` as JSON objects.
pub async fn sample_rows(pool: &DbPool, table: &str, limit: i64) -> Result<Vec<Value>, DbError> {
    let schema = table_schema(pool, table).await?;
    if schema.columns.is_empty() {
        return Ok(Vec::new());
    }

    let pairs = schema
        .columns
        .iter()
        .map(|c| format!("'{}', {}", c.name.replace('\'', "''"), quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT json_object({}) FROM {} LIMIT ?",
        pairs,
        quote_ident(table)
    );

    let raw: Vec<String> = sqlx::query_scalar(&sql).bind(limit).fetch_all(pool).await?;
    raw.iter()
        .map(|row| serde_json::from_str(row).map_err(|e| DbError::Internal(e.to_string())))
        .collect()
}

async fn ensure_table(pool: &DbPool, table: &str) -> Result<(), DbError> {
    if list_tables(pool).await?.iter().any(|t| t == table) {
        Ok(())
    } else {
        Err(DbError::NotFound(format!("Table {} does not exist", table)))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
