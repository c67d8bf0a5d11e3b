//! Form field validation.
//!
//! Each check returns the message shown next to the field. Failures are
//! collected into [`FieldErrors`], which serializes as `{"field": "message"}`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use farmfusion_core::Email;

static NAME_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2,}$").expect("Invalid regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,}$").expect("Invalid regex"));
static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\s,'-]*$").expect("Invalid regex"));

/// Characters a password may contain besides ASCII letters and digits.
const PASSWORD_SYMBOLS: &str = "@$!%*?&";

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// No errors yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` (the first message per field wins).
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Record the error of `result`, if any, and pass its value through.
    pub fn check<T>(&mut self, field: &'static str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether every field passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate and normalize (trim, lower-case) an email.
///
/// # Errors
///
/// `"Email is required"` or `"Invalid email"`.
pub fn email(raw: &str) -> Result<Email, String> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err("Email is required".to_string());
    }
    Email::parse(&normalized).map_err(|_| "Invalid email".to_string())
}

/// Check password strength.
///
/// At least eight characters, with a lower-case letter, an upper-case letter
/// and a digit, drawn from letters, digits and `@$!%*?&`.
///
/// # Errors
///
/// `"Password is required"` or `"Invalid password"`.
pub fn password(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("Password is required".to_string());
    }
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
    let strong = raw.chars().any(|c| c.is_ascii_lowercase())
        && raw.chars().any(|c| c.is_ascii_uppercase())
        && raw.chars().any(|c| c.is_ascii_digit());
    if allowed && strong && raw.chars().count() >= MIN_PASSWORD_LENGTH {
        Ok(())
    } else {
        Err("Invalid password".to_string())
    }
}

/// Check that a confirmation matches the password.
///
/// # Errors
///
/// `"Passwords do not match"`.
pub fn confirmation(password: &str, confirm: &str) -> Result<(), String> {
    if password == confirm {
        Ok(())
    } else {
        Err("Passwords do not match".to_string())
    }
}

/// Check a person's name: one or more words of at least two letters.
///
/// # Errors
///
/// `"Invalid name"`.
pub fn name(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.split_whitespace().all(|w| NAME_WORD.is_match(w)) {
        Ok(trimmed.to_string())
    } else {
        Err("Invalid name".to_string())
    }
}

/// Check a phone number (ten or more digits). Empty is allowed when
/// `required` is false.
///
/// # Errors
///
/// `"Phone is required"` or `"Invalid phone number"`.
pub fn phone(raw: &str, required: bool) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return if required {
            Err("Phone is required".to_string())
        } else {
            Ok(String::new())
        };
    }
    if PHONE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err("Invalid phone number".to_string())
    }
}

/// Check a postal address (letters, digits, spaces and `,'-`).
///
/// # Errors
///
/// `"Invalid address"`.
pub fn address(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if ADDRESS.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err("Invalid address".to_string())
    }
}

/// Check a required free-text field.
///
/// # Errors
///
/// `"<label> is required"`.
pub fn required(raw: &str, label: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(format!("{label} is required"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_messages_and_normalization() {
        assert_eq!(email("  "), Err("Email is required".to_string()));
        assert_eq!(email("not-an-email"), Err("Invalid email".to_string()));
        assert_eq!(
            email(" Kofi@Farm.Test ").map(Email::into_inner),
            Ok("kofi@farm.test".to_string())
        );
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(password(""), Err("Password is required".to_string()));
        assert!(password("Harvest24").is_ok());
        assert!(password("Har@vest24").is_ok());
        // too short
        assert!(password("Hv24").is_err());
        // no upper case
        assert!(password("harvest24").is_err());
        // no digit
        assert!(password("Harvesting").is_err());
        // space is not an allowed character
        assert!(password("Harvest 24").is_err());
    }

    #[test]
    fn test_name_checks_each_word() {
        assert_eq!(name(" Ama  Owusu "), Ok("Ama  Owusu".to_string()));
        assert!(name("A Owusu").is_err());
        assert!(name("Ama2").is_err());
        assert!(name("").is_err());
    }

    #[test]
    fn test_phone_and_address() {
        assert_eq!(phone("", false), Ok(String::new()));
        assert!(phone("", true).is_err());
        assert!(phone("024400000", false).is_err());
        assert!(phone("0244000000", true).is_ok());
        assert!(address("12 Farm Road, Tamale").is_ok());
        assert!(address("<script>").is_err());
    }

    #[test]
    fn test_field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.check("email", email("x")), None);
        errors.add("email", "second");
        assert_eq!(errors.get("email"), Some("Invalid email"));
        assert!(!errors.is_empty());

        let json = serde_json::to_value(&errors).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"email": "Invalid email"}));
    }
}
