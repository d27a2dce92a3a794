//! Account registration, login, and bearer-token middleware

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::{ApiError, ApiState, is_valid_email};
use crate::db::{NewUser, User};
use crate::security::{Claims, hash_password, verify_password};
use crate::Error;

const MIN_PASSWORD_LEN: usize = 6;

/// Registration body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `/api/auth` routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}

/// Token-protected routes
pub fn protected_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/protected", get(protected))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_token,
        ))
        .with_state(state)
}

fn validate_registration(body: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if body.username.trim().is_empty() {
        errors.push("Username is required");
    }
    if !is_valid_email(body.email.trim()) {
        errors.push("Please include a valid email");
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Please enter a password with 6 or more characters");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(&errors))
    }
}

fn validate_login(body: &LoginRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if !is_valid_email(body.email.trim()) {
        errors.push("Please include a valid email");
    }
    if body.password.is_empty() {
        errors.push("Password is required");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(&errors))
    }
}

fn user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
    })
}

/// Reject unparseable bodies with the validation shape
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(b)| b).map_err(|e| {
        tracing::debug!(error = %e, "rejected request body");
        ApiError::validation(&["Request body must be valid JSON"])
    })
}

async fn register(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(body)?;
    validate_registration(&body)?;

    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Auth(format!("hashing task failed: {e}")))??;

    let user = state.users.create(&NewUser {
        username: body.username.trim(),
        email: body.email.trim(),
        password_hash: &password_hash,
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User registered successfully",
            "user": user_json(&user),
        })),
    ))
}

async fn login(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(body)?;
    validate_login(&body)?;

    let Some(user) = state.users.find_by_email(body.email.trim())? else {
        tracing::debug!("login for unknown email");
        return Err(ApiError::Unauthorized("Invalid credentials"));
    };

    let stored = user.password_hash.clone();
    let password = body.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| Error::Auth(format!("verification task failed: {e}")))?;

    if !matches {
        tracing::debug!(user_id = user.id, "login with wrong password");
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(serde_json::json!({
        "message": "Logged in successfully",
        "token": token,
        "user": user_json(&user),
    })))
}

async fn protected(Extension(claims): Extension<Claims>) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    Ok(Json(serde_json::json!({
        "message": "You have access to protected data!",
        "userId": user_id,
    })))
}

/// Extract bearer token from the Authorization header
fn extract_bearer(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a valid session token; stores its [`Claims`] in request extensions
pub async fn require_token(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer(&req) else {
        tracing::debug!("no token provided");
        return Err(ApiError::Unauthorized("No token, authorization denied"));
    };

    match state.tokens.validate(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected token");
            Err(ApiError::Unauthorized("Token is not valid"))
        }
    }
}
