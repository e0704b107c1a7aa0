//! Loads the catalog tables from operator-supplied CSV and JSON files.
//!
//! Every target table declares, for each of its columns, the source column
//! names it accepts. A file's header (or the key set of a JSON array) is
//! resolved against that table once, before any record is written; a missing
//! required column or two aliases of the same column abort the file.
//!
//! Records are inserted with `ON CONFLICT DO NOTHING` on the table's natural
//! key, one transaction per file, so re-running an import is a no-op.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use shared_database::DbPool;

use crate::models::{ImportError, ImportReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Json,
    /// Text restricted to the severity scale; stored lowercase.
    Severity,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    const fn new(column: &'static str, aliases: &'static [&'static str], kind: FieldKind, required: bool) -> Self {
        Self {
            column,
            aliases,
            kind,
            required,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
}

pub const PROCEDURES: TableSpec = TableSpec {
    table: "procedures",
    fields: &[
        FieldSpec::new("name", &["name", "procedure", "procedure_name", "procedimento"], FieldKind::Text, true),
        FieldSpec::new("category", &["category", "categoria", "type"], FieldKind::Text, false),
        FieldSpec::new("description", &["description", "descricao", "details"], FieldKind::Text, false),
        FieldSpec::new(
            "recovery_days",
            &["recovery_days", "recovery_time_days", "dias_recuperacao"],
            FieldKind::Integer,
            false,
        ),
    ],
};

pub const EMOTIONAL_MAPPINGS: TableSpec = TableSpec {
    table: "emotional_mappings",
    fields: &[
        FieldSpec::new("procedure_name", &["procedure_name", "procedure", "procedimento"], FieldKind::Text, true),
        FieldSpec::new(
            "emotional_profile",
            &["emotional_profile", "profile", "perfil_emocional"],
            FieldKind::Text,
            true,
        ),
        FieldSpec::new(
            "primary_concern",
            &["primary_concern", "concern", "preocupacao_principal"],
            FieldKind::Text,
            false,
        ),
        FieldSpec::new("messaging_tone", &["messaging_tone", "tone", "tom"], FieldKind::Text, false),
    ],
};

pub const ALERTS: TableSpec = TableSpec {
    table: "alerts",
    fields: &[
        FieldSpec::new("procedure_name", &["procedure_name", "procedure", "procedimento"], FieldKind::Text, true),
        FieldSpec::new("rule_name", &["rule_name", "rule", "alert", "nome_regra"], FieldKind::Text, true),
        FieldSpec::new("day_from", &["day_from", "from_day", "dia_inicio"], FieldKind::Integer, false),
        FieldSpec::new("day_to", &["day_to", "to_day", "dia_fim"], FieldKind::Integer, false),
        FieldSpec::new(
            "trigger_condition",
            &["trigger_condition", "condition", "trigger", "condicao"],
            FieldKind::Text,
            true,
        ),
        FieldSpec::new("severity", &["severity", "level", "severidade"], FieldKind::Severity, false),
        FieldSpec::new("message", &["message", "alert_message", "mensagem"], FieldKind::Text, true),
    ],
};

pub const PROTOCOLS: TableSpec = TableSpec {
    table: "protocols",
    fields: &[
        FieldSpec::new("procedure_name", &["procedure_name", "procedure", "procedimento"], FieldKind::Text, true),
        FieldSpec::new("title", &["title", "titulo", "name"], FieldKind::Text, true),
        FieldSpec::new("version", &["version", "versao"], FieldKind::Text, false),
        FieldSpec::new("steps", &["steps", "etapas", "passos"], FieldKind::Json, true),
    ],
};

const SEVERITIES: [&str; 5] = ["none", "low", "medium", "high", "critical"];

/// Lowercases a source column name and folds spaces and dashes to underscores.
fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Column mapping of one file: for each field of the spec, the source key it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    sources: Vec<Option<String>>,
}

impl ColumnMapping {
    /// Resolves `available` source keys against `spec`.
    pub fn resolve<'a>(spec: &TableSpec, available: impl IntoIterator<Item = &'a str>) -> Result<Self, ImportError> {
        let keys: BTreeSet<String> = available.into_iter().map(normalize_key).collect();
        let mut sources = Vec::with_capacity(spec.fields.len());

        for field in spec.fields {
            let matches: Vec<&str> = field
                .aliases
                .iter()
                .copied()
                .filter(|alias| keys.contains(*alias))
                .collect();

            match matches.as_slice() {
                [] if field.required => {
                    return Err(ImportError::Mapping {
                        table: spec.table,
                        reason: format!(
                            "required column `{}` not found (accepted: {})",
                            field.column,
                            field.aliases.join(", ")
                        ),
                    })
                }
                [] => sources.push(None),
                [single] => sources.push(Some(single.to_string())),
                several => {
                    return Err(ImportError::Mapping {
                        table: spec.table,
                        reason: format!(
                            "column `{}` is ambiguous: {} are all present",
                            field.column,
                            several.join(", ")
                        ),
                    })
                }
            }
        }

        // An alias claimed by two fields would feed both from one column.
        let mut seen = BTreeSet::new();
        for source in sources.iter().flatten() {
            if !seen.insert(source.as_str()) {
                return Err(ImportError::Mapping {
                    table: spec.table,
                    reason: format!("source column `{}` maps to more than one field", source),
                });
            }
        }

        Ok(Self { sources })
    }

    /// Source key feeding field `index`, if mapped.
    pub fn source(&self, index: usize) -> Option<&str> {
        self.sources.get(index).and_then(|s| s.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Integer(i64),
}

fn convert(
    table: &'static str,
    record: usize,
    field: &FieldSpec,
    raw: Option<&Value>,
) -> Result<Option<Cell>, ImportError> {
    let invalid = |reason: String| ImportError::InvalidRecord { table, record, reason };

    let value = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(other) => Some(other),
    };
    let Some(value) = value else {
        if field.required {
            return Err(invalid(format!("`{}` is empty", field.column)));
        }
        return Ok(None);
    };

    let cell = match field.kind {
        FieldKind::Text => match value {
            Value::String(s) => Cell::Text(s.trim().to_string()),
            other => Cell::Text(other.to_string()),
        },
        FieldKind::Integer => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            Cell::Integer(parsed.ok_or_else(|| invalid(format!("`{}` is not an integer: {}", field.column, value)))?)
        }
        FieldKind::Json => match value {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed) => Cell::Text(parsed.to_string()),
                Err(_) => Cell::Text(Value::String(s.trim().to_string()).to_string()),
            },
            other => Cell::Text(other.to_string()),
        },
        FieldKind::Severity => {
            let text = match value {
                Value::String(s) => s.trim().to_lowercase(),
                other => other.to_string(),
            };
            if !SEVERITIES.contains(&text.as_str()) {
                return Err(invalid(format!("`{}` has unknown severity {}", field.column, text)));
            }
            Cell::Text(text)
        }
    };
    Ok(Some(cell))
}

/// Optional source files of a full seed run.
#[derive(Debug, Clone, Default)]
pub struct SeedSources {
    pub procedures: Option<PathBuf>,
    pub emotional_mappings: Option<PathBuf>,
    pub alerts: Option<PathBuf>,
    pub protocols: Option<PathBuf>,
}

pub struct CatalogImporter {
    pool: DbPool,
}

impl CatalogImporter {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Imports every configured source, procedures first.
    pub async fn seed(&self, sources: &SeedSources) -> Result<Vec<ImportReport>, ImportError> {
        let mut reports = Vec::new();
        if let Some(path) = &sources.procedures {
            reports.push(self.import_csv(&PROCEDURES, path).await?);
        }
        if let Some(path) = &sources.emotional_mappings {
            reports.push(self.import_csv(&EMOTIONAL_MAPPINGS, path).await?);
        }
        if let Some(path) = &sources.alerts {
            reports.push(self.import_csv(&ALERTS, path).await?);
        }
        if let Some(path) = &sources.protocols {
            reports.push(self.import_json(&PROTOCOLS, path).await?);
        }
        Ok(reports)
    }

    pub async fn import_csv(&self, spec: &TableSpec, path: &Path) -> Result<ImportReport, ImportError> {
        info!("Importing {} from {}", spec.table, path.display());

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_key).collect();
        let mapping = ColumnMapping::resolve(spec, headers.iter().map(String::as_str))?;

        let positions: Vec<Option<usize>> = (0..spec.fields.len())
            .map(|i| {
                mapping
                    .source(i)
                    .and_then(|source| headers.iter().position(|h| h == source))
            })
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let values: Vec<Option<Value>> = positions
                .iter()
                .map(|pos| pos.and_then(|p| record.get(p)).map(|v| Value::String(v.to_string())))
                .collect();
            rows.push(convert_row(spec, index + 1, &values)?);
        }

        self.write(spec, &mapping, rows).await
    }

    /// Imports a JSON array of objects.
    pub async fn import_json(&self, spec: &TableSpec, path: &Path) -> Result<ImportReport, ImportError> {
        info!("Importing {} from {}", spec.table, path.display());

        let document: Value = serde_json::from_reader(File::open(path)?)?;
        let Value::Array(items) = document else {
            return Err(ImportError::Mapping {
                table: spec.table,
                reason: "expected a JSON array of objects".to_string(),
            });
        };
        // No keys to resolve a mapping from; nothing to write either.
        if items.is_empty() {
            info!("{} is empty, nothing to import into {}", path.display(), spec.table);
            return Ok(ImportReport {
                table: spec.table.to_string(),
                inserted: 0,
                skipped: 0,
            });
        }

        let mut objects = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(map) => objects.push(
                    map.into_iter()
                        .map(|(key, value)| (normalize_key(&key), value))
                        .collect::<serde_json::Map<String, Value>>(),
                ),
                _ => {
                    return Err(ImportError::InvalidRecord {
                        table: spec.table,
                        record: index + 1,
                        reason: "not a JSON object".to_string(),
                    })
                }
            }
        }

        let keys: BTreeSet<&str> = objects.iter().flat_map(|o| o.keys().map(String::as_str)).collect();
        let mapping = ColumnMapping::resolve(spec, keys)?;

        let mut rows = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            let values: Vec<Option<Value>> = (0..spec.fields.len())
                .map(|i| mapping.source(i).and_then(|source| object.get(source)).cloned())
                .collect();
            rows.push(convert_row(spec, index + 1, &values)?);
        }

        self.write(spec, &mapping, rows).await
    }

    async fn write(
        &self,
        spec: &TableSpec,
        mapping: &ColumnMapping,
        rows: Vec<Vec<Option<Cell>>>,
    ) -> Result<ImportReport, ImportError> {
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        let now = Utc::now();
        let mut report = ImportReport {
            table: spec.table.to_string(),
            inserted: 0,
            skipped: 0,
        };

        for row in rows {
            // Empty and unmapped cells are left out so the schema default applies.
            let present: Vec<(usize, &Cell)> = row
                .iter()
                .enumerate()
                .filter(|(i, _)| mapping.source(*i).is_some())
                .filter_map(|(i, cell)| cell.as_ref().map(|c| (i, c)))
                .collect();
            let columns: Vec<&str> = present.iter().map(|(i, _)| spec.fields[*i].column).collect();
            let sql = format!(
                "INSERT INTO {} ({}, created_at) VALUES ({}) ON CONFLICT DO NOTHING",
                spec.table,
                columns.join(", "),
                vec!["?"; columns.len() + 1].join(", ")
            );

            let mut query = sqlx::query(&sql);
            for (_, cell) in &present {
                query = match cell {
                    Cell::Text(text) => query.bind(text.clone()),
                    Cell::Integer(value) => query.bind(*value),
                };
            }
            let result = query.bind(now).execute(&mut *tx).await?;
            if result.rows_affected() == 0 {
                debug!("{}: record already present, skipped", spec.table);
                report.skipped += 1;
            } else {
                report.inserted += 1;
            }
        }

        tx.commit().await?;
        info!(
            "Imported {}: {} inserted, {} skipped",
            report.table, report.inserted, report.skipped
        );
        Ok(report)
    }
}

fn convert_row(spec: &TableSpec, record: usize, values: &[Option<Value>]) -> Result<Vec<Option<Cell>>, ImportError> {
    spec.fields
        .iter()
        .zip(values)
        .map(|(field, value)| convert(spec.table, record, field, value.as_ref()))
        .collect()
}
