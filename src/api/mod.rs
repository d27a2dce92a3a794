//! HTTP API server
//!
//! Account registration and login, a token-protected sample route, and
//! health endpoints.

pub mod auth;
pub mod health;

use std::sync::{Arc, LazyLock};

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{DbPool, UserRepo};
use crate::security::TokenIssuer;
use crate::{Error, Result};

/// Body of every 500 response
pub const INTERNAL_ERROR_BODY: &str = "Something broke!";

/// Shared state for API handlers
#[derive(Debug)]
pub struct ApiState {
    pub users: UserRepo,
    pub tokens: TokenIssuer,
}

impl ApiState {
    #[must_use]
    pub fn new(db: DbPool, tokens: TokenIssuer) -> Self {
        Self {
            users: UserRepo::new(db),
            tokens,
        }
    }
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub msg: String,
}

/// Handler error, rendered as the API's JSON error shapes
#[derive(Debug)]
pub enum ApiError {
    /// 400 `{errors: [{msg}]}`
    Validation(Vec<FieldError>),
    /// 401 `{message}`
    Unauthorized(&'static str),
    /// 409 `{message}`
    Conflict(String),
    /// 500 plain text
    Internal(Error),
}

impl ApiError {
    pub(crate) fn validation(messages: &[&str]) -> Self {
        Self::Validation(
            messages
                .iter()
                .map(|m| FieldError {
                    msg: (*m).to_string(),
                })
                .collect(),
        )
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Conflict(field) => Self::Conflict(format!("User with that {field} already exists")),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "errors": errors })))
                    .into_response()
            }
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "message": message })),
            )
                .into_response(),
            Self::Conflict(message) => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "message": message })),
            )
                .into_response(),
            Self::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
});

/// Loose structural email check
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Builder for [`ApiServer`]
#[derive(Debug)]
pub struct ApiServerBuilder {
    db: DbPool,
    tokens: TokenIssuer,
    host: String,
    port: u16,
}

impl ApiServerBuilder {
    #[must_use]
    pub fn new(db: DbPool, tokens: TokenIssuer) -> Self {
        Self {
            db,
            tokens,
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState::new(self.db, self.tokens)),
            host: self.host,
            port: self.port,
        }
    }
}

/// HTTP API server
#[derive(Debug)]
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// The full router with middleware applied
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Serve until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(%addr, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Build the router over `state`
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", auth::router(Arc::clone(&state)))
        .merge(auth::protected_router(state))
        .merge(health::router())
        .layer(CatchPanicLayer::custom(
            |_: Box<dyn std::any::Any + Send + 'static>| internal_error(),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
