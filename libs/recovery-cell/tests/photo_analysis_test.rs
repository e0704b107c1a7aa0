use assert_matches::assert_matches;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use recovery_cell::models::{CreatePhotoAnalysisRequest, RecoveryError, Severity};
use recovery_cell::router::{patient_photo_routes, photo_analysis_routes};
use recovery_cell::services::PhotoAnalysisService;
use shared_models::error::DbError;
use shared_utils::test_utils::{insert_test_patient, json_request, read_json, test_state, TestUser};

fn analysis_body(patient_id: Uuid, severity: &str) -> Value {
    json!({
        "patientId": patient_id,
        "photoUrl": "https://cdn.example.com/photos/day3.jpg",
        "daysPostOp": 3,
        "procedureType": "rhinoplasty",
        "recoveryScore": 64.0,
        "confidenceLevel": 0.82,
        "overallSeverity": severity,
        "hasEdema": true,
        "edemaSeverity": "medium",
        "detectedFeatures": { "swelling": "moderate" },
        "recommendations": ["cold compress", "keep head elevated"]
    })
}

#[tokio::test]
async fn test_create_analysis_defaults_review_flag_from_severity() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    let token = staff.token(&state);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("POST", "/", Some(&token), Some(analysis_body(patient_id, "high"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["patientId"], patient_id.to_string());
    assert_eq!(body["overallSeverity"], "high");
    assert_eq!(body["requiresDoctorReview"], true);
    assert_eq!(body["detectedFeatures"]["swelling"], "moderate");
    assert_eq!(body["recommendations"][1], "keep head elevated");

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("POST", "/", Some(&token), Some(analysis_body(patient_id, "low"))))
        .await
        .unwrap();
    assert_eq!(read_json(response).await["requiresDoctorReview"], false);
}

#[tokio::test]
async fn test_unknown_severity_is_rejected_by_api_and_schema() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&staff.token(&state)),
            Some(analysis_body(patient_id, "catastrophic")),
        ))
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    let result = sqlx::query(
        "INSERT INTO photo_analyses (id, patient_id, photo_url, days_post_op, overall_severity, created_at, updated_at) \
         VALUES (?, ?, 'x.jpg', 1, 'catastrophic', ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(patient_id.to_string())
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(&state.db)
    .await;
    assert_matches!(result.map_err(DbError::from), Err(DbError::CheckViolation(_)));
}

#[tokio::test]
async fn test_condition_severity_requires_flag() {
    let state = test_state().await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;

    let result = PhotoAnalysisService::new(&state.db)
        .create_analysis(CreatePhotoAnalysisRequest {
            patient_id: Some(patient_id),
            photo_url: "a.jpg".to_string(),
            days_post_op: 2,
            hematoma_severity: Some(Severity::Low),
            ..Default::default()
        })
        .await;

    assert_matches!(result, Err(RecoveryError::ValidationError(_)));
}

#[tokio::test]
async fn test_analysis_for_unknown_patient_is_rejected() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&staff.token(&state)),
            Some(analysis_body(Uuid::new_v4(), "low")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_workflow() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;

    let service = PhotoAnalysisService::new(&state.db);
    let request: CreatePhotoAnalysisRequest =
        serde_json::from_value(analysis_body(patient_id, "critical")).unwrap();
    let analysis = service.create_analysis(request).await.unwrap();
    assert!(analysis.is_pending_review());
    let uri = format!("/{}/review", analysis.id);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "POST",
            &uri,
            Some(&staff.token(&state)),
            Some(json!({ "doctorNotes": "looks fine" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "GET",
            "/?pendingReview=true",
            Some(&doctor.token(&state)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 1);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "POST",
            &uri,
            Some(&doctor.token(&state)),
            Some(json!({ "doctorNotes": "Drain placed, follow up in 48h" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["requiresDoctorReview"], false);
    assert_eq!(body["reviewedBy"], doctor.id.to_string());
    assert_eq!(body["doctorNotes"], "Drain placed, follow up in 48h");
    assert!(body["reviewedAt"].is_string());

    assert!(service.pending_reviews(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_revalidates_merged_record() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    let request: CreatePhotoAnalysisRequest = serde_json::from_value(analysis_body(patient_id, "low")).unwrap();
    let analysis = PhotoAnalysisService::new(&state.db).create_analysis(request).await.unwrap();
    let uri = format!("/{}", analysis.id);
    let token = staff.token(&state);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "infectionSeverity": "high" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "hasInfection": true, "infectionSeverity": "high", "recoveryScore": 41.5 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["hasInfection"], true);
    assert_eq!(body["infectionSeverity"], "high");
    assert_eq!(body["recoveryScore"], 41.5);
    assert_eq!(body["edemaSeverity"], "medium");

    let response = photo_analysis_routes(state)
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "patientId": Uuid::new_v4() })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_photo_routes() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    let other_id = insert_test_patient(&state, "Ana", "ana@example.com").await;
    let token = staff.token(&state);
    let uri = format!("/{}/photos", patient_id);

    let mut body = analysis_body(patient_id, "none");
    body.as_object_mut().unwrap().remove("patientId");
    let response = patient_photo_routes(state.clone())
        .oneshot(json_request("POST", &uri, Some(&token), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = patient_photo_routes(state.clone())
        .oneshot(json_request("POST", &uri, Some(&token), Some(analysis_body(other_id, "none"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = patient_photo_routes(state.clone())
        .oneshot(json_request("GET", &uri, Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let photos = read_json(response).await;
    assert_eq!(photos.as_array().unwrap().len(), 1);
    assert_eq!(photos[0]["patientId"], patient_id.to_string());

    let response = patient_photo_routes(state)
        .oneshot(json_request("GET", &format!("/{}/photos", Uuid::new_v4()), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    let request: CreatePhotoAnalysisRequest = serde_json::from_value(analysis_body(patient_id, "low")).unwrap();
    let analysis = PhotoAnalysisService::new(&state.db).create_analysis(request).await.unwrap();
    let uri = format!("/{}", analysis.id);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("DELETE", &uri, Some(&doctor.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("DELETE", &uri, Some(&admin.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("GET", &uri, Some(&admin.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_escalating_severity_requeues_for_review() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    let service = PhotoAnalysisService::new(&state.db);
    let request: CreatePhotoAnalysisRequest = serde_json::from_value(analysis_body(patient_id, "low")).unwrap();
    let analysis = service.create_analysis(request).await.unwrap();
    assert!(!analysis.requires_doctor_review);
    let uri = format!("/{}", analysis.id);
    let token = doctor.token(&state);

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("PUT", &uri, Some(&token), Some(json!({ "overallSeverity": "critical" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["requiresDoctorReview"], true);
    assert_eq!(service.pending_reviews(10).await.unwrap().len(), 1);

    service
        .review_analysis(analysis.id, doctor.id, Default::default())
        .await
        .unwrap();

    // An explicit flag wins over the severity default.
    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "overallSeverity": "high", "requiresDoctorReview": false })),
        ))
        .await
        .unwrap();
    assert_eq!(read_json(response).await["requiresDoctorReview"], false);
    assert!(service.pending_reviews(10).await.unwrap().is_empty());

    let response = photo_analysis_routes(state.clone())
        .oneshot(json_request("PUT", &uri, Some(&token), Some(json!({ "overallSeverity": "critical" }))))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["requiresDoctorReview"], true);
    assert_eq!(body["reviewedAt"], Value::Null);
    assert_eq!(service.pending_reviews(10).await.unwrap().len(), 1);
}
