use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use shared_database::DbPool;

use crate::models::{
    AlertRule, CatalogError, EmotionalMapping, Procedure, ProcedureDetail, ProcedureDetailQuery, ProcedureQuery,
    Protocol,
};

pub struct CatalogService {
    pool: DbPool,
}

impl CatalogService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn list_procedures(&self, query: ProcedureQuery) -> Result<Vec<Procedure>, CatalogError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM procedures");
        if let Some(category) = query.category.filter(|c| !c.trim().is_empty()) {
            builder.push(" WHERE category = ").push_bind(category.trim().to_string());
        }
        builder.push(" ORDER BY name");

        let procedures = builder.build_query_as::<Procedure>().fetch_all(&self.pool).await?;
        debug!("Found {} procedures", procedures.len());
        Ok(procedures)
    }

    pub async fn procedure_detail(
        &self,
        name: &str,
        query: ProcedureDetailQuery,
    ) -> Result<ProcedureDetail, CatalogError> {
        let procedure = sqlx::query_as::<_, Procedure>("SELECT * FROM procedures WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::ProcedureNotFound(name.to_string()))?;

        let emotional_mapping =
            sqlx::query_as::<_, EmotionalMapping>("SELECT * FROM emotional_mappings WHERE procedure_name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        let mut alerts = self.alerts_for(name).await?;
        if let Some(day) = query.day {
            alerts.retain(|alert| alert.applies_on(day));
        }

        let protocol = sqlx::query_as::<_, Protocol>("SELECT * FROM protocols WHERE procedure_name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ProcedureDetail {
            procedure,
            emotional_mapping,
            alerts,
            protocol,
        })
    }

    /// Alert rules of a procedure, ordered by the start of their day window.
    pub async fn alerts_for(&self, procedure_name: &str) -> Result<Vec<AlertRule>, CatalogError> {
        let alerts = sqlx::query_as::<_, AlertRule>(
            "SELECT * FROM alerts WHERE procedure_name = ? ORDER BY day_from, rule_name",
        )
        .bind(procedure_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }
}
