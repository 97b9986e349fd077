use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("The two password fields didn't match.")]
    Mismatch,

    #[error("This password is too short. It must contain at least 8 characters.")]
    TooShort,

    #[error("This password is entirely numeric.")]
    EntirelyNumeric,

    #[error("Password hashing failed")]
    Hashing,
}

/// Check a sign-up password and its confirmation.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), PasswordError> {
    if password != confirmation {
        return Err(PasswordError::Mismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PasswordError::EntirelyNumeric);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|_| PasswordError::Hashing)
}

/// Verify a plaintext password against a stored bcrypt hash (constant-time via bcrypt).
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
