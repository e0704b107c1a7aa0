use tracing::debug;
use uuid::Uuid;

use patient_cell::services::PatientService;
use recovery_cell::models::PhotoAnalysis;
use shared_database::DbPool;

use crate::models::{Badge, InsightsError, PatientProgress};

const POINTS_PER_PHOTO: i64 = 10;
const POINTS_PER_COMPLETED_APPOINTMENT: i64 = 25;
const POINTS_PER_STRONG_SCORE: i64 = 5;
const POINTS_PER_LEVEL: i64 = 100;
const STRONG_RECOVERY_SCORE: f64 = 80.0;

pub struct GamificationService {
    pool: DbPool,
}

impl GamificationService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn patient_progress(&self, patient_id: Uuid) -> Result<PatientProgress, InsightsError> {
        if !PatientService::new(&self.pool).exists(patient_id).await? {
            return Err(InsightsError::PatientNotFound(patient_id));
        }

        let analyses = sqlx::query_as::<_, PhotoAnalysis>("SELECT * FROM photo_analyses WHERE patient_id = ?")
            .bind(patient_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let completed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE patient_id = ? AND status = 'completed'")
                .bind(patient_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        let progress = score_progress(patient_id, &analyses, completed);
        debug!(
            "Patient {} has {} points at level {}",
            patient_id, progress.points, progress.level
        );
        Ok(progress)
    }
}

/// Points, level and badges from a patient's submissions and completed visits.
pub fn score_progress(patient_id: Uuid, analyses: &[PhotoAnalysis], appointments_completed: i64) -> PatientProgress {
    let photos = analyses.len() as i64;
    let strong_scores = analyses
        .iter()
        .filter(|a| a.recovery_score.is_some_and(|s| s >= STRONG_RECOVERY_SCORE))
        .count() as i64;
    let furthest_day = analyses.iter().map(|a| a.days_post_op).max().unwrap_or(0);

    let points = photos * POINTS_PER_PHOTO
        + appointments_completed * POINTS_PER_COMPLETED_APPOINTMENT
        + strong_scores * POINTS_PER_STRONG_SCORE;

    let mut badges = Vec::new();
    if photos >= 1 {
        badges.push(Badge::FirstPhoto);
    }
    if photos >= 5 {
        badges.push(Badge::ConsistentTracker);
    }
    if furthest_day >= 7 {
        badges.push(Badge::FirstWeek);
    }
    if furthest_day >= 30 {
        badges.push(Badge::FirstMonth);
    }
    if strong_scores > 0 {
        badges.push(Badge::StrongRecovery);
    }
    if appointments_completed >= 3 {
        badges.push(Badge::CommittedPatient);
    }

    PatientProgress {
        patient_id,
        points,
        level: points / POINTS_PER_LEVEL + 1,
        photos_submitted: photos,
        appointments_completed,
        badges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recovery_cell::models::Severity;

    fn analysis(day: i64, score: Option<f64>) -> PhotoAnalysis {
        let now = Utc::now();
        PhotoAnalysis {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4().to_string(),
            photo_url: "https://cdn.clinic.test/p.jpg".to_string(),
            days_post_op: day,
            procedure_type: None,
            recovery_score: score,
            confidence_level: None,
            overall_severity: Severity::None,
            has_hematoma: false,
            hematoma_severity: None,
            has_edema: false,
            edema_severity: None,
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
    fn new_patient_starts_at_level_one() {
        let progress = score_progress(Uuid::new_v4(), &[], 0);
        assert_eq!(progress.points, 0);
        assert_eq!(progress.level, 1);
        assert!(progress.badges.is_empty());
    }

    #[test]
    fn photos_and_visits_earn_points_and_badges() {
        let analyses: Vec<PhotoAnalysis> = [1, 3, 7, 14, 30]
            .iter()
            .map(|&day| analysis(day, Some(if day >= 14 { 85.0 } else { 60.0 })))
            .collect();

        let progress = score_progress(Uuid::new_v4(), &analyses, 3);

        // 5 photos * 10 + 3 visits * 25 + 2 strong scores * 5
        assert_eq!(progress.points, 135);
        assert_eq!(progress.level, 2);
        assert_eq!(
            progress.badges,
            vec![
                Badge::FirstPhoto,
                Badge::ConsistentTracker,
                Badge::FirstWeek,
                Badge::FirstMonth,
                Badge::StrongRecovery,
                Badge::CommittedPatient,
            ]
        );
    }
}
