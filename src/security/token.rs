//! Session tokens (HS256 JWT)

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// The numeric user id in `sub`
    ///
    /// # Errors
    ///
    /// Returns error if `sub` is not an integer
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::Auth(format!("malformed subject: {}", self.sub)))
    }
}

/// Issues and validates tokens signed with a shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer for `secret`
    ///
    /// # Errors
    ///
    /// Returns error if the secret is empty
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("JWT secret must not be empty".to_string()));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: DEFAULT_TOKEN_TTL,
        })
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sign a token for `user_id`
    ///
    /// # Errors
    ///
    /// Returns error if signing fails
    pub fn issue(&self, user_id: i64) -> Result<String> {
        let now = now_secs();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Auth(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` if the token is invalid or expired
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::Auth(format!("invalid token: {e}")))
    }
}

fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
