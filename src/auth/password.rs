//! Password Hashing
//! Mission: One-way bcrypt hashing with verification that never errors

use bcrypt::{hash, verify};
use tracing::debug;

/// Work-factor bounds bcrypt accepts.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

const DUMMY_PASSWORD: &str = "examportal-timing-equalizer";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid password: {0}")]
    Validation(&'static str),
    #[error("bcrypt cost {0} outside 4..=31")]
    InvalidCost(u32),
    #[error("failed to hash password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

/// Salted bcrypt hasher. The salt is random per call and embedded in the output.
pub struct PasswordHasher {
    cost: u32,
    // Stand-in hash so failed lookups and malformed hashes cost a full verify.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        let dummy_hash = hash(DUMMY_PASSWORD, cost)?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password. Rejects empty input and input bcrypt would truncate.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.is_empty() {
            return Err(PasswordError::Validation("password must not be empty"));
        }
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::Validation("password longer than 72 bytes"));
        }
        Ok(hash(plaintext, self.cost)?)
    }

    /// Check `plaintext` against a stored hash.
    ///
    /// Returns `false` for any mismatch, including a malformed `hash_string`;
    /// in that case the dummy hash is verified instead so the call takes as
    /// long as a real comparison.
    pub fn verify(&self, plaintext: &str, hash_string: &str) -> bool {
        match verify(plaintext, hash_string) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Stored password hash rejected by bcrypt: {}", e);
                self.verify_dummy(plaintext);
                false
            }
        }
    }

    /// Burn one verify against the dummy hash (used when no user matched).
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = verify(plaintext, &self.dummy_hash);
    }
}
