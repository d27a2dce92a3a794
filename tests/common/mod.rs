//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use cozmo_assistant::security::TokenIssuer;
use cozmo_assistant::{DbPool, db};

pub const TEST_SECRET: &str = "test-jwt-secret";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Token issuer sharing the router's secret
#[must_use]
pub fn test_tokens() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET).expect("failed to create token issuer")
}

/// Build the full API router over `db`
#[must_use]
pub fn build_test_router(db: DbPool) -> axum::Router {
    let state = Arc::new(cozmo_assistant::api::ApiState::new(db, test_tokens()));
    cozmo_assistant::api::router(state)
}
