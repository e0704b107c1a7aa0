use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{Procedure, ProcedureDetail, ProcedureDetailQuery, ProcedureQuery};
use crate::services::CatalogService;

#[axum::debug_handler]
pub async fn list_procedures(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcedureQuery>,
) -> Result<Json<Vec<Procedure>>, AppError> {
    let procedures = CatalogService::new(&state.db).list_procedures(query).await?;
    Ok(Json(procedures))
}

#[axum::debug_handler]
pub async fn get_procedure(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ProcedureDetailQuery>,
) -> Result<Json<ProcedureDetail>, AppError> {
    let detail = CatalogService::new(&state.db).procedure_detail(&name, query).await?;
    Ok(Json(detail))
}
