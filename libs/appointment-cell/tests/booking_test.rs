use assert_matches::assert_matches;
use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus, CreateAppointmentRequest};
use appointment_cell::router::appointment_routes;
use appointment_cell::services::AppointmentBookingService;
use shared_models::error::DbError;
use shared_utils::test_utils::{insert_test_patient, json_request, read_json, test_state, TestUser};

#[tokio::test]
async fn test_book_appointment_with_doctor() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&staff.token(&state)),
            Some(json!({
                "patient_id": patient_id,
                "doctor_id": doctor.id,
                "scheduled_at": "2030-03-10T14:00:00Z",
                "duration_minutes": 45,
                "appointment_type": "post_op_check"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["patient_id"], patient_id.to_string());
    assert_eq!(body["doctor_id"], doctor.id.to_string());
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["appointment_type"], "post_op_check");
    assert_eq!(body["duration_minutes"], 45);
}

#[tokio::test]
async fn test_appointment_for_missing_patient_is_foreign_key_violation() {
    let state = test_state().await;
    let service = AppointmentBookingService::new(&state.db);

    let result = service
        .book_appointment(CreateAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            scheduled_at: Utc::now(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: None,
        })
        .await;

    assert_matches!(result, Err(AppointmentError::Database(DbError::ForeignKeyViolation(_))));
}

#[tokio::test]
async fn test_missing_patient_maps_to_bad_request() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&staff.token(&state)),
            Some(json!({ "patient_id": Uuid::new_v4(), "scheduled_at": "2030-03-10T14:00:00Z" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_doctor_id_must_reference_a_doctor() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&staff.token(&state)),
            Some(json!({
                "patient_id": patient_id,
                "doctor_id": staff.id,
                "scheduled_at": "2030-03-10T14:00:00Z"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("is not a doctor"));
}

#[tokio::test]
async fn test_non_positive_duration_is_rejected() {
    let state = test_state().await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;

    let result = AppointmentBookingService::new(&state.db)
        .book_appointment(CreateAppointmentRequest {
            patient_id,
            doctor_id: None,
            scheduled_at: Utc::now(),
            duration_minutes: 0,
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: None,
        })
        .await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn test_search_by_status_and_date_range() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;
    let service = AppointmentBookingService::new(&state.db);

    let base = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
    for day in 0..4 {
        service
            .book_appointment(CreateAppointmentRequest {
                patient_id,
                doctor_id: Some(doctor.id),
                scheduled_at: base + Duration::days(day),
                duration_minutes: 30,
                status: if day == 3 {
                    AppointmentStatus::Cancelled
                } else {
                    AppointmentStatus::Scheduled
                },
                appointment_type: Default::default(),
                notes: None,
            })
            .await
            .unwrap();
    }

    let token = doctor.token(&state);
    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "GET",
            "/?from=2030-01-02T00:00:00Z&to=2030-01-03T23:59:59Z",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let response = appointment_routes(state.clone())
        .oneshot(json_request("GET", "/?status=cancelled", Some(&token), None))
        .await
        .unwrap();
    let listed = read_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = appointment_routes(state)
        .oneshot(json_request(
            "GET",
            &format!("/?doctor_id={}&patient_id={}", doctor.id, patient_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_update_records_clinical_notes() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;
    let appointment = AppointmentBookingService::new(&state.db)
        .book_appointment(CreateAppointmentRequest {
            patient_id,
            doctor_id: None,
            scheduled_at: Utc::now(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: None,
        })
        .await
        .unwrap();

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", appointment.id),
            Some(&doctor.token(&state)),
            Some(json!({
                "status": "completed",
                "diagnosis": "healing well",
                "prescription": "paracetamol"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["diagnosis"], "healing well");
    assert_eq!(body["prescription"], "paracetamol");
}

#[tokio::test]
async fn test_appointments_cascade_with_patient() {
    let state = test_state().await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;
    let service = AppointmentBookingService::new(&state.db);
    let appointment = service
        .book_appointment(CreateAppointmentRequest {
            patient_id,
            doctor_id: None,
            scheduled_at: Utc::now(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: None,
        })
        .await
        .unwrap();

    sqlx::query("DELETE FROM patients WHERE id = ?")
        .bind(patient_id.to_string())
        .execute(&state.db)
        .await
        .unwrap();

    assert_matches!(service.get_appointment(appointment.id).await, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "DELETE",
            &format!("/{}", Uuid::new_v4()),
            Some(&staff.token(&state)),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_unassigns_doctor_with_null() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Ana", "ana@example.com").await;
    let appointment = AppointmentBookingService::new(&state.db)
        .book_appointment(CreateAppointmentRequest {
            patient_id,
            doctor_id: Some(doctor.id),
            scheduled_at: Utc::now(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            appointment_type: Default::default(),
            notes: Some("bring previous exams".to_string()),
        })
        .await
        .unwrap();
    let uri = format!("/{}", appointment.id);

    let response = appointment_routes(state.clone())
        .oneshot(json_request("PUT", &uri, Some(&doctor.token(&state)), Some(json!({ "status": "confirmed" }))))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["doctor_id"], doctor.id.to_string());
    assert_eq!(body["notes"], "bring previous exams");

    let response = appointment_routes(state.clone())
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&doctor.token(&state)),
            Some(json!({ "doctor_id": null, "notes": null })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["doctor_id"].is_null());
    assert!(body["notes"].is_null());
    assert_eq!(body["status"], "confirmed");
}
