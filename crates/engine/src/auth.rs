//! Password hashing and token minting.
//!
//! Hashes are bcrypt; tokens are HS256 JWTs signed with one process-wide
//! secret. Access and refresh tokens share the key and differ by lifetime
//! and by their `typ` claim.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

const INVALID_TOKEN: &str = "invalid or expired token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Random per token, so two pairs minted in the same second differ.
    pub jti: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Signing key, token lifetimes and bcrypt cost.
#[derive(Clone)]
pub struct Credentials {
    secret: String,
    token_ttl: Duration,
    refresh_ttl: Duration,
    cost: u32,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token_ttl", &self.token_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("change-me", Duration::hours(1), Duration::hours(24 * 7))
    }
}

impl Credentials {
    pub fn new(secret: impl Into<String>, token_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            token_ttl,
            refresh_ttl,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost (tests use the minimum).
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Salted bcrypt hash, computed on the blocking pool.
    pub async fn hash_password(&self, plaintext: &str) -> ResultEngine<String> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|err| EngineError::Unknown(format!("hashing task failed: {err}")))?
            .map_err(|err| EngineError::Unknown(format!("hashing failed: {err}")))
    }

    /// Whether `plaintext` matches `hash`. Malformed hashes count as a
    /// mismatch.
    pub async fn verify_password(&self, hash: &str, plaintext: &str) -> ResultEngine<bool> {
        let hash = hash.to_string();
        let plaintext = plaintext.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|err| EngineError::Unknown(format!("verify task failed: {err}")))?;
        match verified {
            Ok(valid) => Ok(valid),
            Err(err) => {
                tracing::warn!("stored password hash rejected by bcrypt: {err}");
                Ok(false)
            }
        }
    }

    pub fn generate_tokens(&self, id: &str, username: &str) -> ResultEngine<TokenPair> {
        Ok(TokenPair {
            token: self.sign(id, username, TokenKind::Access, self.token_ttl)?,
            refresh_token: self.sign(id, username, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    /// Verifies signature, expiry and kind of `signed`.
    pub fn validate_token(&self, signed: &str, kind: TokenKind) -> ResultEngine<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let claims = decode::<Claims>(signed, &key, &validation)
            .map_err(|_| EngineError::Unauthorized(INVALID_TOKEN.to_string()))?
            .claims;
        if claims.typ != kind {
            return Err(EngineError::Unauthorized(INVALID_TOKEN.to_string()));
        }
        Ok(claims)
    }

    fn sign(&self, id: &str, username: &str, typ: TokenKind, ttl: Duration) -> ResultEngine<String> {
        let now = Utc::now();
        let claims = Claims {
            id: id.to_string(),
            username: username.to_string(),
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|err| EngineError::Unknown(format!("failed to sign token: {err}")))
    }
}
