//! Input validation for account payloads

use regex::Regex;
use std::sync::OnceLock;

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    let length = name.chars().count();
    if length < 2 {
        return Err("Name must be at least 2 characters long".to_string());
    }

    if length > 50 {
        return Err("Name must be at most 50 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();

    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password: 8 to 128 characters with at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();
    if length < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if length > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(validate_name("Ada").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_name("Zoë").is_ok());
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("neighbour@example.org").is_ok());
        assert!(validate_email(" neighbour@example.org ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.example.org").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_passwords() {
        assert!(validate_password("lending42").is_ok());
        assert_eq!(
            validate_password("short1"),
            Err("Password must be at least 8 characters long".to_string())
        );
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password(&format!("a1{}", "x".repeat(127))).is_err());
    }
}
