// ============================
// crates/core-lib/src/validation/mod.rs
// ============================
//! Field normalization and validation for users and microposts.
//!
//! Write paths call these explicitly: normalize first, then validate, then
//! persist.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MAX_NICKNAME_LENGTH: usize = 50;
pub const MAX_MICROPOST_LENGTH: usize = 140;

// Regex patterns for validation
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+\-.]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]+$").unwrap()
});
static NICKNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name {0}")]
    InvalidName(String),

    #[error("Email {0}")]
    InvalidEmail(String),

    #[error("Nickname {0}")]
    InvalidNickname(String),

    #[error("Content {0}")]
    InvalidMicropost(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trim surrounding whitespace from a display name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// Emails are unique case-insensitively, so they are stored lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Nicknames are stored lowercased, without a leading `@`
pub fn normalize_nickname(nickname: &str) -> String {
    nickname.trim().trim_start_matches('@').to_lowercase()
}

/// Validate a display name
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidName("can't be blank".to_string()));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "is too long (maximum is {MAX_NAME_LENGTH} characters)"
        )));
    }

    Ok(name)
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.trim().is_empty() {
        return Err(ValidationError::InvalidEmail("can't be blank".to_string()));
    }

    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "is too long (maximum is {MAX_EMAIL_LENGTH} characters)"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail("is invalid".to_string()));
    }

    Ok(email)
}

/// Validate a nickname (the handle used in `@mentions`)
pub fn validate_nickname(nickname: &str) -> ValidationResult<&str> {
    if nickname.is_empty() {
        return Err(ValidationError::InvalidNickname("can't be blank".to_string()));
    }

    if nickname.len() > MAX_NICKNAME_LENGTH {
        return Err(ValidationError::InvalidNickname(format!(
            "is too long (maximum is {MAX_NICKNAME_LENGTH} characters)"
        )));
    }

    if !NICKNAME_REGEX.is_match(nickname) {
        return Err(ValidationError::InvalidNickname(
            "may only contain letters, digits and underscores".to_string(),
        ));
    }

    Ok(nickname)
}

/// Validate a micropost body
pub fn validate_micropost_body(body: &str) -> ValidationResult<&str> {
    if body.trim().is_empty() {
        return Err(ValidationError::InvalidMicropost("can't be blank".to_string()));
    }

    if body.chars().count() > MAX_MICROPOST_LENGTH {
        return Err(ValidationError::InvalidMicropost(format!(
            "is too long (maximum is {MAX_MICROPOST_LENGTH} characters)"
        )));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Example User").is_ok());
        assert!(validate_name(&"a".repeat(50)).is_ok());

        assert!(matches!(validate_name(" "), Err(ValidationError::InvalidName(_))));
        assert!(matches!(
            validate_name(&"a".repeat(51)),
            Err(ValidationError::InvalidName(_))
        ));
    }

    #[test]
    fn test_validate_email_accepts_valid_addresses() {
        for address in [
            "user@example.com",
            "USER@foo.COM",
            "A_US-ER@foo.bar.org",
            "first.last@foo.jp",
            "alice+bob@baz.cn",
        ] {
            assert!(validate_email(address).is_ok(), "{address} should be valid");
        }
    }

    #[test]
    fn test_validate_email_rejects_invalid_addresses() {
        for address in [
            "user@example,com",
            "user_at_foo.org",
            "user.name@example.",
            "foo@bar_baz.com",
            "foo@bar+baz.com",
            "foo@bar..com",
            " ",
        ] {
            assert!(
                matches!(validate_email(address), Err(ValidationError::InvalidEmail(_))),
                "{address:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_validate_email_length() {
        let too_long = format!("{}@example.com", "a".repeat(244));
        assert!(matches!(
            validate_email(&too_long),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_normalize_email_is_case_insensitive() {
        assert_eq!(normalize_email("USER@EXAMPLE.COM"), "user@example.com");
        assert_eq!(normalize_email("  Foo@Bar.org "), "foo@bar.org");
    }

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("michael").is_ok());
        assert!(validate_nickname("lana_kane2").is_ok());

        assert!(matches!(validate_nickname(""), Err(ValidationError::InvalidNickname(_))));
        assert!(matches!(
            validate_nickname("not-a-word"),
            Err(ValidationError::InvalidNickname(_))
        ));
        assert_eq!(normalize_nickname("@Michael"), "michael");
    }

    #[test]
    fn test_validate_micropost_body() {
        assert!(validate_micropost_body("Lorem ipsum").is_ok());
        assert!(matches!(
            validate_micropost_body("   "),
            Err(ValidationError::InvalidMicropost(_))
        ));
        assert!(matches!(
            validate_micropost_body(&"a".repeat(141)),
            Err(ValidationError::InvalidMicropost(_))
        ));
    }
}
