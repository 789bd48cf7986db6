//! Input validation utilities
//!
//! Shape checks only: the backend is the authority on whether credentials
//! are actually correct.

use regex::Regex;
use std::sync::OnceLock;

/// Validate the login identifier (username or email)
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    if identifier.is_empty() {
        return Err("Identifier is required".to_string());
    }

    if identifier.len() > 254 {
        return Err("Identifier must be at most 254 characters long".to_string());
    }

    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = IDENTIFIER_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+(@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})?$")
            .expect("Failed to compile identifier regex")
    });

    if !regex.is_match(identifier) {
        return Err("Identifier must be a username or an email address".to_string());
    }

    Ok(())
}

/// Validate the password shape
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_usernames_and_emails() {
        assert!(validate_identifier("star1").is_ok());
        assert!(validate_identifier("star.one+trade@example.com").is_ok());
    }

    #[test]
    fn rejects_empty_and_malformed_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("two words").is_err());
        assert!(validate_identifier(&"x".repeat(300)).is_err());
    }

    #[test]
    fn accepts_any_non_empty_bounded_password() {
        assert!(validate_password("correct-pw").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"x".repeat(200)).is_err());
    }
}
