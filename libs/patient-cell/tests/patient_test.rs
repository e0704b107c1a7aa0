use assert_matches::assert_matches;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use patient_cell::models::{CreatePatientRequest, PatientError, PatientStatus};
use patient_cell::router::create_patient_router;
use patient_cell::services::PatientService;
use shared_utils::test_utils::{json_request, read_json, test_state, TestUser};

fn new_patient(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "phone": "+55 11 99999-0000",
        "birth_date": "1990-04-12",
        "allergies": "penicillin"
    })
}

#[tokio::test]
async fn test_create_and_get_patient() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let token = staff.token(&state);

    let response = create_patient_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&token),
            Some(new_patient("Maria Silva", "Maria@Example.com")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["email"], "maria@example.com");
    assert_eq!(created["status"], "active");
    assert_eq!(created["birth_date"], "1990-04-12");

    let response = create_patient_router(state.clone())
        .oneshot(json_request(
            "GET",
            &format!("/{}", created["id"].as_str().unwrap()),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["name"], "Maria Silva");
}

#[tokio::test]
async fn test_patient_routes_require_clinical_role() {
    let state = test_state().await;
    let patient_user = TestUser::patient("someone@clinic.test");
    patient_user.insert(&state).await;

    let response = create_patient_router(state.clone())
        .oneshot(json_request("GET", "/", Some(&patient_user.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = create_patient_router(state)
        .oneshot(json_request("GET", "/", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let token = staff.token(&state);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let response = create_patient_router(state.clone())
            .oneshot(json_request(
                "POST",
                "/",
                Some(&token),
                Some(new_patient("Ana", "ana@example.com")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn test_assigned_doctor_must_be_a_doctor() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let token = staff.token(&state);

    let mut body = new_patient("Joao", "joao@example.com");
    body["assigned_doctor_id"] = json!(staff.id);
    let response = create_patient_router(state.clone())
        .oneshot(json_request("POST", "/", Some(&token), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = new_patient("Joao", "joao@example.com");
    body["assigned_doctor_id"] = json!(Uuid::new_v4());
    let response = create_patient_router(state.clone())
        .oneshot(json_request("POST", "/", Some(&token), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = new_patient("Joao", "joao@example.com");
    body["assigned_doctor_id"] = json!(doctor.id);
    let response = create_patient_router(state)
        .oneshot(json_request("POST", "/", Some(&token), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["assigned_doctor_id"], doctor.id.to_string());
}

#[tokio::test]
async fn test_search_filters_and_pagination() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let token = staff.token(&state);

    let service = PatientService::new(&state.db);
    for (name, email) in [
        ("Carla Souza", "carla@example.com"),
        ("Carlos Lima", "carlos@example.com"),
        ("Beatriz Rocha", "bia@example.com"),
    ] {
        let request: CreatePatientRequest = serde_json::from_value(new_patient(name, email)).unwrap();
        service.create_patient(request).await.unwrap();
    }

    let response = create_patient_router(state.clone())
        .oneshot(json_request("GET", "/?name=carl", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 2);

    let response = create_patient_router(state.clone())
        .oneshot(json_request("GET", "/?limit=1&offset=1", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(read_json(response).await.as_array().unwrap().len(), 1);

    let response = create_patient_router(state)
        .oneshot(json_request("GET", "/?status=archived", Some(&token), None))
        .await
        .unwrap();
    assert!(read_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_patient_status() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;

    let request: CreatePatientRequest =
        serde_json::from_value(new_patient("Paula", "paula@example.com")).unwrap();
    let patient = PatientService::new(&state.db).create_patient(request).await.unwrap();

    let response = create_patient_router(state.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", patient.id),
            Some(&doctor.token(&state)),
            Some(json!({ "status": "inactive", "medications": "ibuprofen" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], PatientStatus::Inactive.as_str());
    assert_eq!(body["medications"], "ibuprofen");
    assert_eq!(body["allergies"], "penicillin");
}

#[tokio::test]
async fn test_delete_is_admin_only() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;

    let request: CreatePatientRequest =
        serde_json::from_value(new_patient("Rita", "rita@example.com")).unwrap();
    let patient = PatientService::new(&state.db).create_patient(request).await.unwrap();
    let uri = format!("/{}", patient.id);

    let response = create_patient_router(state.clone())
        .oneshot(json_request("DELETE", &uri, Some(&staff.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = create_patient_router(state.clone())
        .oneshot(json_request("DELETE", &uri, Some(&admin.token(&state)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let result = PatientService::new(&state.db).get_patient(patient.id).await;
    assert_matches!(result, Err(PatientError::NotFound));
}

#[tokio::test]
async fn test_delete_with_payments_is_refused() {
    let state = test_state().await;
    let request: CreatePatientRequest =
        serde_json::from_value(new_patient("Lia", "lia@example.com")).unwrap();
    let service = PatientService::new(&state.db);
    let patient = service.create_patient(request).await.unwrap();

    sqlx::query(
        "INSERT INTO payments (id, patient_id, payment_intent_id, amount, currency, status, created_at, updated_at) \
         VALUES (?, ?, 'pi_test_1', 5000, 'usd', 'succeeded', datetime('now'), datetime('now'))",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(patient.id.to_string())
    .execute(&state.db)
    .await
    .unwrap();

    let result = service.delete_patient(patient.id).await;
    assert_matches!(result, Err(PatientError::HasDependents(id)) if id == patient.id);
    assert!(service.exists(patient.id).await.unwrap());
}

#[tokio::test]
async fn test_update_clears_nullable_fields_with_null() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let token = staff.token(&state);

    let mut body = new_patient("Joao", "joao@example.com");
    body["assigned_doctor_id"] = json!(doctor.id);
    let response = create_patient_router(state.clone())
        .oneshot(json_request("POST", "/", Some(&token), Some(body)))
        .await
        .unwrap();
    let id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = create_patient_router(state.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", id),
            Some(&token),
            Some(json!({ "assigned_doctor_id": null, "allergies": null })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["assigned_doctor_id"], Value::Null);
    assert_eq!(body["allergies"], Value::Null);
    assert_eq!(body["phone"], "+55 11 99999-0000");

    let response = create_patient_router(state)
        .oneshot(json_request("PUT", &format!("/{}", id), Some(&token), Some(json!({ "name": "Joao Silva" }))))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["name"], "Joao Silva");
    assert_eq!(body["birth_date"], "1990-04-12");
}
