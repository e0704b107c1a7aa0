use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use patient_cell::services::PatientService;
use shared_database::rows::json_text;
use shared_database::DbPool;
use shared_models::pagination::Pagination;

use crate::models::{
    CreatePhotoAnalysisRequest, PhotoAnalysis, PhotoAnalysisQuery, RecoveryError, ReviewRequest, Severity,
    UpdatePhotoAnalysisRequest,
};

pub struct PhotoAnalysisService {
    pool: DbPool,
}

impl PhotoAnalysisService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create_analysis(&self, request: CreatePhotoAnalysisRequest) -> Result<PhotoAnalysis, RecoveryError> {
        let patient_id = request
            .patient_id
            .ok_or_else(|| RecoveryError::ValidationError("patientId is required".to_string()))?;
        self.ensure_patient(patient_id).await?;

        let now = Utc::now();
        let requires_doctor_review = request
            .requires_doctor_review
            .unwrap_or_else(|| request.overall_severity.needs_review());

        let analysis = PhotoAnalysis {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            photo_url: request.photo_url.trim().to_string(),
            days_post_op: request.days_post_op,
            procedure_type: request.procedure_type,
            recovery_score: request.recovery_score,
            confidence_level: request.confidence_level,
            overall_severity: request.overall_severity,
            has_hematoma: request.has_hematoma,
            hematoma_severity: request.hematoma_severity,
            has_edema: request.has_edema,
            edema_severity: request.edema_severity,
            has_infection: request.has_infection,
            infection_severity: request.infection_severity,
            has_asymmetry: request.has_asymmetry,
            asymmetry_severity: request.asymmetry_severity,
            has_dehiscence: request.has_dehiscence,
            has_necrosis: request.has_necrosis,
            has_seroma: request.has_seroma,
            detected_features: request.detected_features,
            recommendations: request.recommendations,
            requires_doctor_review,
            reviewed_at: None,
            reviewed_by: None,
            doctor_notes: None,
            created_at: now,
            updated_at: now,
        };
        validate_analysis(&analysis)?;

        sqlx::query(
            "INSERT INTO photo_analyses (id, patient_id, photo_url, days_post_op, procedure_type, recovery_score, \
             confidence_level, overall_severity, has_hematoma, hematoma_severity, has_edema, edema_severity, \
             has_infection, infection_severity, has_asymmetry, asymmetry_severity, has_dehiscence, has_necrosis, \
             has_seroma, detected_features, recommendations, requires_doctor_review, reviewed_at, reviewed_by, \
             doctor_notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(analysis.id.to_string())
        .bind(&analysis.patient_id)
        .bind(&analysis.photo_url)
        .bind(analysis.days_post_op)
        .bind(&analysis.procedure_type)
        .bind(analysis.recovery_score)
        .bind(analysis.confidence_level)
        .bind(analysis.overall_severity.as_str())
        .bind(analysis.has_hematoma)
        .bind(analysis.hematoma_severity.map(|s| s.as_str()))
        .bind(analysis.has_edema)
        .bind(analysis.edema_severity.map(|s| s.as_str()))
        .bind(analysis.has_infection)
        .bind(analysis.infection_severity.map(|s| s.as_str()))
        .bind(analysis.has_asymmetry)
        .bind(analysis.asymmetry_severity.map(|s| s.as_str()))
        .bind(analysis.has_dehiscence)
        .bind(analysis.has_necrosis)
        .bind(analysis.has_seroma)
        .bind(json_text(analysis.detected_features.as_ref()))
        .bind(json_text(analysis.recommendations.as_ref()))
        .bind(analysis.requires_doctor_review)
        .bind(analysis.reviewed_at)
        .bind(analysis.reviewed_by.map(|id| id.to_string()))
        .bind(&analysis.doctor_notes)
        .bind(analysis.created_at)
        .bind(analysis.updated_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Photo analysis {} stored for patient {} (severity {}, review: {})",
            analysis.id, analysis.patient_id, analysis.overall_severity, analysis.requires_doctor_review
        );
        Ok(analysis)
    }

    pub async fn get_analysis(&self, analysis_id: Uuid) -> Result<PhotoAnalysis, RecoveryError> {
        sqlx::query_as::<_, PhotoAnalysis>("SELECT * FROM photo_analyses WHERE id = ?")
            .bind(analysis_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RecoveryError::NotFound)
    }

    pub async fn list_analyses(&self, query: PhotoAnalysisQuery) -> Result<Vec<PhotoAnalysis>, RecoveryError> {
        let (limit, offset) = Pagination {
            limit: query.limit,
            offset: query.offset,
        }
        .resolve();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM photo_analyses WHERE 1 = 1");
        if let Some(patient_id) = query.patient_id {
            builder.push(" AND patient_id = ").push_bind(patient_id.to_string());
        }
        if let Some(severity) = query.severity {
            builder.push(" AND overall_severity = ").push_bind(severity.as_str());
        }
        match query.pending_review {
            Some(true) => {
                builder.push(" AND requires_doctor_review = 1 AND reviewed_at IS NULL");
            }
            Some(false) => {
                builder.push(" AND (requires_doctor_review = 0 OR reviewed_at IS NOT NULL)");
            }
            None => {}
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let analyses = builder.build_query_as::<PhotoAnalysis>().fetch_all(&self.pool).await?;
        debug!("Found {} photo analyses", analyses.len());
        Ok(analyses)
    }

    /// Photo history of one patient, newest first.
    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<PhotoAnalysis>, RecoveryError> {
        if !PatientService::new(&self.pool).exists(patient_id).await? {
            return Err(RecoveryError::PatientNotFound(patient_id));
        }

        let analyses = sqlx::query_as::<_, PhotoAnalysis>(
            "SELECT * FROM photo_analyses WHERE patient_id = ? ORDER BY created_at DESC",
        )
        .bind(patient_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(analyses)
    }

    /// Analyses flagged for review that no doctor has signed off yet, oldest first.
    pub async fn pending_reviews(&self, limit: i64) -> Result<Vec<PhotoAnalysis>, RecoveryError> {
        let analyses = sqlx::query_as::<_, PhotoAnalysis>(
            "SELECT * FROM photo_analyses WHERE requires_doctor_review = 1 AND reviewed_at IS NULL \
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(analyses)
    }

    pub async fn update_analysis(
        &self,
        analysis_id: Uuid,
        request: UpdatePhotoAnalysisRequest,
    ) -> Result<PhotoAnalysis, RecoveryError> {
        let mut analysis = self.get_analysis(analysis_id).await?;
        let previous_severity = analysis.overall_severity;
        let previously_flagged = analysis.requires_doctor_review;

        if let Some(patient_id) = request.patient_id {
            self.ensure_patient(patient_id).await?;
            analysis.patient_id = patient_id.to_string();
        }
        if let Some(photo_url) = request.photo_url {
            analysis.photo_url = photo_url.trim().to_string();
        }
        if let Some(days) = request.days_post_op {
            analysis.days_post_op = days;
        }
        if request.procedure_type.is_some() {
            analysis.procedure_type = request.procedure_type;
        }
        if request.recovery_score.is_some() {
            analysis.recovery_score = request.recovery_score;
        }
        if request.confidence_level.is_some() {
            analysis.confidence_level = request.confidence_level;
        }
        if let Some(severity) = request.overall_severity {
            analysis.overall_severity = severity;
        }
        apply_condition(&mut analysis.has_hematoma, &mut analysis.hematoma_severity, request.has_hematoma, request.hematoma_severity);
        apply_condition(&mut analysis.has_edema, &mut analysis.edema_severity, request.has_edema, request.edema_severity);
        apply_condition(&mut analysis.has_infection, &mut analysis.infection_severity, request.has_infection, request.infection_severity);
        apply_condition(&mut analysis.has_asymmetry, &mut analysis.asymmetry_severity, request.has_asymmetry, request.asymmetry_severity);
        if let Some(flag) = request.has_dehiscence {
            analysis.has_dehiscence = flag;
        }
        if let Some(flag) = request.has_necrosis {
            analysis.has_necrosis = flag;
        }
        if let Some(flag) = request.has_seroma {
            analysis.has_seroma = flag;
        }
        if request.detected_features.is_some() {
            analysis.detected_features = request.detected_features;
        }
        if request.recommendations.is_some() {
            analysis.recommendations = request.recommendations;
        }
        match request.requires_doctor_review {
            Some(flag) => analysis.requires_doctor_review = flag,
            None if analysis.overall_severity != previous_severity && analysis.overall_severity.needs_review() => {
                analysis.requires_doctor_review = true;
            }
            None => {}
        }
        // A newly raised flag puts the analysis back in the review queue.
        if analysis.requires_doctor_review && !previously_flagged {
            analysis.reviewed_at = None;
            analysis.reviewed_by = None;
        }
        analysis.updated_at = Utc::now();

        validate_analysis(&analysis)?;

        sqlx::query(
            "UPDATE photo_analyses SET patient_id = ?, photo_url = ?, days_post_op = ?, procedure_type = ?, \
             recovery_score = ?, confidence_level = ?, overall_severity = ?, has_hematoma = ?, hematoma_severity = ?, \
             has_edema = ?, edema_severity = ?, has_infection = ?, infection_severity = ?, has_asymmetry = ?, \
             asymmetry_severity = ?, has_dehiscence = ?, has_necrosis = ?, has_seroma = ?, detected_features = ?, \
             recommendations = ?, requires_doctor_review = ?, reviewed_at = ?, reviewed_by = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&analysis.patient_id)
        .bind(&analysis.photo_url)
        .bind(analysis.days_post_op)
        .bind(&analysis.procedure_type)
        .bind(analysis.recovery_score)
        .bind(analysis.confidence_level)
        .bind(analysis.overall_severity.as_str())
        .bind(analysis.has_hematoma)
        .bind(analysis.hematoma_severity.map(|s| s.as_str()))
        .bind(analysis.has_edema)
        .bind(analysis.edema_severity.map(|s| s.as_str()))
        .bind(analysis.has_infection)
        .bind(analysis.infection_severity.map(|s| s.as_str()))
        .bind(analysis.has_asymmetry)
        .bind(analysis.asymmetry_severity.map(|s| s.as_str()))
        .bind(analysis.has_dehiscence)
        .bind(analysis.has_necrosis)
        .bind(analysis.has_seroma)
        .bind(json_text(analysis.detected_features.as_ref()))
        .bind(json_text(analysis.recommendations.as_ref()))
        .bind(analysis.requires_doctor_review)
        .bind(analysis.reviewed_at)
        .bind(analysis.reviewed_by.map(|id| id.to_string()))
        .bind(analysis.updated_at)
        .bind(analysis_id.to_string())
        .execute(&self.pool)
        .await?;

        info!("Photo analysis {} updated", analysis_id);
        Ok(analysis)
    }

    /// Signs off an analysis: stamps the reviewer and clears the review flag.
    pub async fn review_analysis(
        &self,
        analysis_id: Uuid,
        reviewer_id: Uuid,
        request: ReviewRequest,
    ) -> Result<PhotoAnalysis, RecoveryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE photo_analyses SET requires_doctor_review = 0, reviewed_at = ?, reviewed_by = ?, \
             doctor_notes = COALESCE(?, doctor_notes), updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(reviewer_id.to_string())
        .bind(request.doctor_notes)
        .bind(now)
        .bind(analysis_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecoveryError::NotFound);
        }
        info!("Photo analysis {} reviewed by {}", analysis_id, reviewer_id);
        self.get_analysis(analysis_id).await
    }

    pub async fn delete_analysis(&self, analysis_id: Uuid) -> Result<(), RecoveryError> {
        let result = sqlx::query("DELETE FROM photo_analyses WHERE id = ?")
            .bind(analysis_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecoveryError::NotFound);
        }
        info!("Photo analysis {} deleted", analysis_id);
        Ok(())
    }

    // patient_id is free-form TEXT in the schema; existence is checked here.
    async fn ensure_patient(&self, patient_id: Uuid) -> Result<(), RecoveryError> {
        if PatientService::new(&self.pool).exists(patient_id).await? {
            Ok(())
        } else {
            Err(RecoveryError::UnknownPatient(patient_id))
        }
    }
}

fn apply_condition(
    flag: &mut bool,
    severity: &mut Option<Severity>,
    new_flag: Option<bool>,
    new_severity: Option<Severity>,
) {
    if let Some(value) = new_flag {
        *flag = value;
        if !value {
            *severity = None;
        }
    }
    if new_severity.is_some() {
        *severity = new_severity;
    }
}

pub fn validate_analysis(analysis: &PhotoAnalysis) -> Result<(), RecoveryError> {
    if analysis.photo_url.is_empty() {
        return Err(RecoveryError::ValidationError("photoUrl is required".to_string()));
    }
    if analysis.days_post_op < 0 {
        return Err(RecoveryError::ValidationError("daysPostOp must not be negative".to_string()));
    }
    if let Some(score) = analysis.recovery_score {
        if !(0.0..=100.0).contains(&score) {
            return Err(RecoveryError::ValidationError(
                "recoveryScore must be between 0 and 100".to_string(),
            ));
        }
    }
    if let Some(confidence) = analysis.confidence_level {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RecoveryError::ValidationError(
                "confidenceLevel must be between 0 and 1".to_string(),
            ));
        }
    }
    for (condition, present, severity) in analysis.graded_conditions() {
        if severity.is_some() && !present {
            return Err(RecoveryError::ValidationError(format!(
                "{} severity given but {} is not flagged",
                condition, condition
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> PhotoAnalysis {
        let now = Utc::now();
        PhotoAnalysis {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4().to_string(),
            photo_url: "https://cdn.example.com/p/1.jpg".to_string(),
            days_post_op: 3,
            procedure_type: Some("rhinoplasty".to_string()),
            recovery_score: Some(72.5),
            confidence_level: Some(0.9),
            overall_severity: Severity::Low,
            has_hematoma: false,
            hematoma_severity: None,
            has_edema: true,
            edema_severity: Some(Severity::Low),
            has_infection: false,
            infection_severity: None,
            has_asymmetry: false,
            asymmetry_severity: None,
            has_dehiscence: false,
            has_necrosis: false,
            has_seroma: false,
            detected_features: None,
            recommendations: None,
            requires_doctor_review: false,
            reviewed_at: None,
            reviewed_by: None,
            doctor_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepts_consistent_analysis() {
        assert!(validate_analysis(&sample()).is_ok());
    }

    #[test]
    fn rejects_severity_without_flag() {
        let mut analysis = sample();
        analysis.infection_severity = Some(Severity::High);
        assert_matches!(validate_analysis(&analysis), Err(RecoveryError::ValidationError(msg)) if msg.contains("infection"));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let mut analysis = sample();
        analysis.recovery_score = Some(100.5);
        assert!(validate_analysis(&analysis).is_err());

        let mut analysis = sample();
        analysis.confidence_level = Some(-0.1);
        assert!(validate_analysis(&analysis).is_err());

        let mut analysis = sample();
        analysis.days_post_op = -1;
        assert!(validate_analysis(&analysis).is_err());
    }

    #[test]
    fn clearing_a_flag_drops_its_severity() {
        let mut flag = true;
        let mut severity = Some(Severity::Medium);
        apply_condition(&mut flag, &mut severity, Some(false), None);
        assert!(!flag);
        assert_eq!(severity, None);
    }
}
