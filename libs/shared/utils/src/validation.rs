use std::sync::OnceLock;

use regex::Regex;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

/// Lowercases and trims an email, rejecting malformed input.
pub fn normalize_email(email: &str) -> Result<String, String> {
    let normalized = email.trim().to_lowercase();
    if is_valid_email(&normalized) {
        Ok(normalized)
    } else {
        Err(format!("Invalid email address: {}", email))
    }
}

/// Rejects blank required text fields.
pub fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane.doe@clinic.example"));
        assert!(!is_valid_email("jane.doe"));
        assert!(!is_valid_email("jane@clinic"));
        assert_eq!(normalize_email("  Jane@Clinic.Example ").unwrap(), "jane@clinic.example");
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(require_non_blank("name", "   ").is_err());
        assert!(require_non_blank("name", "Ana").is_ok());
    }
}
