use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use headers::{
    authorization::{Basic, Bearer},
    Authorization, HeaderMapExt,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use shared_config::BasicAuthCredentials;
use shared_database::AppState;
use shared_models::error::AppError;

use crate::jwt::validate_token;

const PUBLIC_PATHS: &[&str] = &["/health"];

/// Reverse-proxy gate. Enabled only when basic-auth credentials are configured.
///
/// A request passes when it carries matching basic credentials or a bearer
/// token that validates; `/health` is always public.
pub async fn basic_auth_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(credentials) = state.config.basic_auth.as_ref() else {
        return Ok(next.run(request).await);
    };

    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let allowed = if let Some(Authorization(basic)) = headers.typed_get::<Authorization<Basic>>() {
        credentials_match(credentials, basic.username(), basic.password())
    } else if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        validate_token(bearer.token(), &state.config.jwt_secret).is_ok()
    } else {
        false
    };

    if !allowed {
        warn!("Basic auth gate rejected {} {}", request.method(), request.uri().path());
        return Err(AppError::BasicAuth("Invalid or missing credentials".to_string()));
    }

    Ok(next.run(request).await)
}

fn credentials_match(expected: &BasicAuthCredentials, username: &str, password: &str) -> bool {
    // Both fields are always compared.
    let user_ok = expected.username.as_bytes().ct_eq(username.as_bytes());
    let pass_ok = expected.password.as_bytes().ct_eq(password.as_bytes());
    (user_ok & pass_ok).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_exact_credentials() {
        let creds = BasicAuthCredentials {
            username: "clinic".into(),
            password: "s3cret".into(),
        };
        assert!(credentials_match(&creds, "clinic", "s3cret"));
        assert!(!credentials_match(&creds, "clinic", "s3cret!"));
        assert!(!credentials_match(&creds, "admin", "s3cret"));
        assert!(!credentials_match(&creds, "", ""));
    }
}
