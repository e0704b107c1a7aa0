use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use auth_cell::router::{auth_routes, user_routes};
use shared_models::auth::Role;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{
    insert_test_patient, json_request, read_json, test_state, JwtTestUtils, TestUser, TEST_PASSWORD,
};

#[tokio::test]
async fn test_login_returns_token_for_valid_credentials() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;

    let response = auth_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ADMIN@clinic.test ", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "admin@clinic.test");
    assert_eq!(body["user"]["role"], "admin");

    let token = body["token"].as_str().unwrap();
    let principal = validate_token(token, &state.config.jwt_secret).unwrap();
    assert_eq!(principal, admin.to_user());
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let state = test_state().await;
    TestUser::staff("staff@clinic.test").insert(&state).await;

    let response = auth_routes(state)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "staff@clinic.test", "password": "not-the-password" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_rejects_unknown_email() {
    let state = test_state().await;

    let response = auth_routes(state)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "nobody@clinic.test", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_inactive_user() {
    let state = test_state().await;
    let staff = TestUser::staff("gone@clinic.test");
    staff.insert(&state).await;
    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(staff.id.to_string())
        .execute(&state.db)
        .await
        .unwrap();

    let response = auth_routes(state)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "gone@clinic.test", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "Account is disabled");
}

#[tokio::test]
async fn test_profile_requires_token() {
    let state = test_state().await;

    let response = auth_routes(state)
        .oneshot(json_request("GET", "/profile", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_profile_rejects_expired_and_forged_tokens() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;

    for token in [
        JwtTestUtils::create_expired_token(&doctor, &state.config.jwt_secret),
        JwtTestUtils::create_invalid_signature_token(&doctor),
        JwtTestUtils::create_malformed_token(),
    ] {
        let response = auth_routes(state.clone())
            .oneshot(json_request("GET", "/profile", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_profile_returns_caller_record() {
    let state = test_state().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;

    let response = auth_routes(state.clone())
        .oneshot(json_request("GET", "/profile", Some(&doctor.token(&state)), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["id"], doctor.id.to_string());
    assert_eq!(body["role"], "doctor");
    assert_eq!(body["mfa_enabled"], false);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let state = test_state().await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;

    let response = user_routes(state.clone())
        .oneshot(json_request("GET", "/", Some(&staff.token(&state)), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_creates_lists_and_updates_users() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let token = admin.token(&state);

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&token),
            Some(json!({
                "email": "New.Doctor@Clinic.test",
                "password": "long-enough-password",
                "name": "Dr. New",
                "role": "doctor"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["email"], "new.doctor@clinic.test");
    let id = created["id"].as_str().unwrap().to_string();

    let response = user_routes(state.clone())
        .oneshot(json_request("GET", "/?role=doctor", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/{}", id),
            Some(&token),
            Some(json!({ "role": "staff", "is_active": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["role"], Role::Staff.as_str());
    assert_eq!(updated["is_active"], false);
}

#[tokio::test]
async fn test_create_user_with_duplicate_email_conflicts() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&admin.token(&state)),
            Some(json!({
                "email": "admin@clinic.test",
                "password": "long-enough-password",
                "name": "Second Admin",
                "role": "admin"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_user_validates_input() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let token = admin.token(&state);

    let short_password = json!({
        "email": "x@clinic.test", "password": "short", "name": "X", "role": "staff"
    });
    let bad_email = json!({
        "email": "not-an-email", "password": "long-enough-password", "name": "X", "role": "staff"
    });
    for body in [short_password, bad_email] {
        let response = user_routes(state.clone())
            .oneshot(json_request("POST", "/", Some(&token), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = user_routes(state)
        .oneshot(json_request(
            "POST",
            "/",
            Some(&token),
            Some(json!({
                "email": "y@clinic.test", "password": "long-enough-password", "name": "Y", "role": "superuser"
            })),
        ))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;

    let response = user_routes(state.clone())
        .oneshot(json_request("DELETE", &format!("/{}", admin.id), Some(&admin.token(&state)), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let token = admin.token(&state);

    let response = user_routes(state.clone())
        .oneshot(json_request("DELETE", &format!("/{}", staff.id), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = user_routes(state)
        .oneshot(json_request("GET", &format!("/{}", staff.id), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assigned_doctor_cannot_lose_doctor_role() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let doctor = TestUser::doctor("doc@clinic.test");
    doctor.insert(&state).await;
    let patient_id = insert_test_patient(&state, "Maria", "maria@example.com").await;
    sqlx::query("UPDATE patients SET assigned_doctor_id = ? WHERE id = ?")
        .bind(doctor.id.to_string())
        .bind(patient_id.to_string())
        .execute(&state.db)
        .await
        .unwrap();
    let token = admin.token(&state);

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/{}", doctor.id),
            Some(&token),
            Some(json!({ "role": "staff" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(doctor.id.to_string())
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(role, "doctor");

    sqlx::query("UPDATE patients SET assigned_doctor_id = NULL WHERE id = ?")
        .bind(patient_id.to_string())
        .execute(&state.db)
        .await
        .unwrap();

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/{}", doctor.id),
            Some(&token),
            Some(json!({ "role": "staff" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deactivated_user_token_is_rejected() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let staff = TestUser::staff("staff@clinic.test");
    staff.insert(&state).await;
    let staff_token = staff.token(&state);

    let response = auth_routes(state.clone())
        .oneshot(json_request("GET", "/profile", Some(&staff_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/{}", staff.id),
            Some(&admin.token(&state)),
            Some(json!({ "is_active": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = auth_routes(state.clone())
        .oneshot(json_request("GET", "/profile", Some(&staff_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demoted_admin_loses_admin_access() {
    let state = test_state().await;
    let admin = TestUser::admin("admin@clinic.test");
    admin.insert(&state).await;
    let other = TestUser::admin("other@clinic.test");
    other.insert(&state).await;
    let other_token = other.token(&state);

    let response = user_routes(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/{}", other.id),
            Some(&admin.token(&state)),
            Some(json!({ "role": "staff" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = user_routes(state.clone())
        .oneshot(json_request("GET", "/", Some(&other_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
