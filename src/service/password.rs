//! bcrypt hashing plus the registration strength rule.

use bcrypt::{BcryptError, DEFAULT_COST};

pub fn hash(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, DEFAULT_COST)
}

pub fn verify(password: &str, hashed: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, hashed)
}

/// At least 8 characters, containing both a letter and a digit.
pub fn is_strong(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}
