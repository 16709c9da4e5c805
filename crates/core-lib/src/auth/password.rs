// ============================
// crates/core-lib/src/auth/password.rs
// ============================
//! Password policy, hashing and verification.
use rand::RngCore;
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

use super::tokens::{random_token, DEFAULT_TOKEN_BYTES};
use crate::config::CredentialSettings;
use crate::error::AppError;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length, in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Cheapest scrypt cost we accept (`N = 2^4`)
pub const MIN_LOG_N: u8 = 4;

/// Most expensive scrypt cost we accept
pub const MAX_LOG_N: u8 = 20;

const BLOCK_SIZE: u32 = 8;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;
const SALT_BYTES: usize = 16;

/// Adaptive cost of the password hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCost {
    /// Cheapest cost, for test suites
    Minimum,
    /// scrypt's recommended parameters
    Recommended,
    /// Explicit `log_n`
    LogN(u8),
}

impl HashCost {
    fn params(self) -> Result<Params, AppError> {
        let log_n = match self {
            HashCost::Minimum => MIN_LOG_N,
            HashCost::Recommended => return Ok(Params::recommended()),
            HashCost::LogN(log_n) => log_n,
        };
        Params::new(log_n, BLOCK_SIZE, PARALLELISM, OUTPUT_LEN)
            .map_err(|e| AppError::Hash(format!("invalid scrypt cost {log_n}: {e}")))
    }
}

/// Check a plaintext password against the password policy
pub fn check_password_policy(plain: &str) -> Result<(), AppError> {
    if plain.trim().is_empty() {
        return Err(AppError::PolicyViolation("can't be blank".to_string()));
    }

    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::PolicyViolation(format!(
            "is too short (minimum is {MIN_PASSWORD_LENGTH} characters)"
        )));
    }

    if plain.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::PolicyViolation(format!(
            "is too long (maximum is {MAX_PASSWORD_BYTES} bytes)"
        )));
    }

    let mut chars = plain.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return Err(AppError::PolicyViolation(
                "can't be all the same character".to_string(),
            ));
        }
    }

    Ok(())
}

/// Hashes secrets with a fixed cost.
///
/// Hashing is deliberately slow; use [`Credentials::hash_password_offloaded`]
/// when many hashes are computed from async code.
#[derive(Debug, Clone)]
pub struct Credentials {
    params: Params,
    token_bytes: usize,
}

impl Credentials {
    /// Create a hasher with the given cost
    pub fn new(cost: HashCost) -> Result<Self, AppError> {
        Ok(Self {
            params: cost.params()?,
            token_bytes: DEFAULT_TOKEN_BYTES,
        })
    }

    /// Create a hasher from settings. Unit tests always get the minimum cost.
    pub fn from_settings(settings: &CredentialSettings) -> Result<Self, AppError> {
        let cost = if cfg!(test) {
            HashCost::Minimum
        } else {
            settings.hash_cost()
        };
        let mut credentials = Self::new(cost)?;
        credentials.token_bytes = settings.token_bytes;
        Ok(credentials)
    }

    /// Hash a password after enforcing the password policy
    pub fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        check_password_policy(plain)?;
        self.digest(plain)
    }

    /// Hash an arbitrary secret without the password policy
    pub fn digest(&self, secret: &str) -> Result<String, AppError> {
        let mut salt_bytes = [0u8; SALT_BYTES];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = Scrypt
            .hash_password_customized(secret.as_bytes(), None, None, self.params, &salt)?
            .to_string();
        Ok(hash)
    }

    /// Securely hash a password and zeroize the original
    pub fn hash_password_secure(&self, plain: &mut String) -> Result<String, AppError> {
        let hash = self.hash_password(plain);
        plain.zeroize();
        hash
    }

    /// Hash a password on the blocking thread pool
    pub async fn hash_password_offloaded(&self, plain: String) -> Result<String, AppError> {
        let credentials = self.clone();
        let mut plain = plain;
        tokio::task::spawn_blocking(move || credentials.hash_password_secure(&mut plain)).await?
    }

    /// Digest a secret on the blocking thread pool
    pub async fn digest_offloaded(&self, secret: String) -> Result<String, AppError> {
        let credentials = self.clone();
        tokio::task::spawn_blocking(move || credentials.digest(&secret)).await?
    }

    /// Generate a fresh remember, activation or reset token.
    /// The caller stores only its digest.
    pub fn issue_token(&self) -> String {
        random_token(self.token_bytes)
    }
}

/// Verify a password against a digest. Absent or malformed digests never verify.
pub fn verify_password(plain: &str, digest: &str) -> bool {
    if digest.is_empty() {
        return false;
    }
    let parsed_hash = match PasswordHash::new(digest) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// [`verify_password`] on the blocking thread pool. A failed worker never verifies.
pub async fn verify_password_offloaded(plain: String, digest: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&plain, &digest))
        .await
        .unwrap_or(false)
}
