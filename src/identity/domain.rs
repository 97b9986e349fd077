use rand::Rng;
use std::fmt;
use thiserror::Error;

use crate::db::models::Profile;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 150;
pub const USER_CODE_LEN: usize = 16;

/// Points contributed by each populated profile field.
const SCORE_STEP: i64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("username: Enter a valid username. Letters, digits and @/./+/-/_ only.")]
    InvalidUsername,

    #[error("username: A user with that username already exists.")]
    UsernameTaken,

    #[error("email: Enter a valid email address.")]
    InvalidEmail,
}

/// Handles that would shadow a top-level route: `GET /{username}` must
/// always reach the profile page.
const RESERVED_USERNAMES: &[&str] = &[
    "signin",
    "signup",
    "signout",
    "termsandconditions",
    "completeprofile",
    "report-csp-violation",
    "members",
    "create",
    "update",
    "delete",
    "update_profile",
    "connect",
    "disconnect",
    "disconnect_platform",
    "sync",
    "media",
    "instagram_login",
    "instagram_callback",
    "facebook_login",
    "facebook_callback",
];

/// Lowercased, validated account handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let name = raw.trim().to_lowercase();
        let len = name.chars().count();
        let valid_len = (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len);
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
        if !(valid_len && valid_chars) {
            return Err(IdentityError::InvalidUsername);
        }
        if RESERVED_USERNAMES.contains(&name.as_str()) {
            return Err(IdentityError::UsernameTaken);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional email: blank means none, anything else needs `local@domain`.
pub fn parse_email(raw: Option<&str>) -> Result<Option<String>, IdentityError> {
    let Some(email) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(Some(email.to_string()))
        }
        _ => Err(IdentityError::InvalidEmail),
    }
}

/// Random 16-digit public identity code. Uniqueness is checked by the caller.
pub fn generate_user_code() -> String {
    let mut rng = rand::thread_rng();
    (0..USER_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Completeness score in `0..=100`: 20 points each for full name, bio,
/// picture, QR badge and the verified flag.
pub fn completeness_score(profile: &Profile) -> i64 {
    let populated = |field: &Option<String>| {
        field
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    };

    [
        populated(&profile.full_name),
        populated(&profile.bio),
        populated(&profile.picture_path),
        populated(&profile.qr_code_path),
        profile.verified,
    ]
    .into_iter()
    .filter(|present| *present)
    .count() as i64
        * SCORE_STEP
}
