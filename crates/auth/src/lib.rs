//! Credential issuance and verification.
//!
//! The realtime subsystem treats this as an external collaborator: it hands
//! over a bearer token and gets back the owning account. Tokens are JWTs
//! signed with the configured secret; passwords are stored as argon2 hashes.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use parley_config::AuthConfig;
use parley_store::{Account, AccountRepository, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct Authenticator {
    accounts: AccountRepository,
    jwt_secret: String,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: Duration::seconds(config.token_ttl_seconds.min(i64::MAX as u64) as i64),
        }
    }

    /// Register a new account and issue its first token.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(String, Account), AuthError> {
        let password_hash = hash_password(password)?;
        let account = match self.accounts.create(name, email, &password_hash).await {
            Ok(account) => account,
            Err(StoreError::EmailTaken) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        debug!(account_id = %account.id, "account registered");
        let token = self.issue_token(&account.id)?;
        Ok((token, account))
    }

    /// Exchange email/password for a token. A missing account and a wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, Account), AuthError> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&account.id)?;
        Ok((token, account))
    }

    /// Resolve a bearer token to its account. Expired, malformed, and
    /// orphaned tokens all fail the same way.
    pub async fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?
        .claims;

        self.accounts
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    fn issue_token(&self, account_id: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
