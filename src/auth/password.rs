use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plaintext: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Constant-time via bcrypt; a malformed hash counts as a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password should have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
    })
}

/// Trims and lowercases an email address, rejecting malformed ones.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(AppError::BadRequest(
            "Please provide a valid email address".into(),
        ));
    }
    Ok(email)
}

/// A password reset token: the plaintext is mailed, only the hash is stored.
pub struct ResetToken {
    pub plaintext: String,
    pub hash: String,
}

impl ResetToken {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        let plaintext = hex::encode(bytes);
        let hash = hash_reset_token(&plaintext);
        Self { plaintext, hash }
    }
}

pub fn hash_reset_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
