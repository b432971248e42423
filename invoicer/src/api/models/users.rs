//! Form payloads and session identity for users.

use crate::api::models::forms::FormErrors;
use crate::config::PasswordConfig;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use serde::{Deserialize, Serialize};

const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 150;

/// The user a request was authenticated as, decoded from the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
        }
    }
}

/// Registration form submitted to `/signup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password_confirm: String,
}

impl SignupForm {
    /// Check the submitted values, normalising whitespace in place.
    pub fn validate(&mut self, rules: &PasswordConfig) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();

        let username_length = self.username.chars().count();
        if self.username.is_empty() {
            errors.add("username", "This field is required.");
        } else if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&username_length) {
            errors.add(
                "username",
                format!("Username must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH} characters."),
            );
        } else if !self.username.chars().all(is_username_char) {
            errors.add("username", "Enter a valid username. Use only letters, numbers, and @/./+/-/_ characters.");
        }

        if self.email.is_empty() {
            errors.add("email", "This field is required.");
        } else if self.email.parse::<lettre::Address>().is_err() {
            errors.add("email", "Enter a valid email address.");
        }

        let password_length = self.password.chars().count();
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        } else if password_length < rules.min_length {
            errors.add(
                "password",
                format!("This password is too short. It must contain at least {} characters.", rules.min_length),
            );
        } else if password_length > rules.max_length {
            errors.add(
                "password",
                format!("This password is too long. It must contain at most {} characters.", rules.max_length),
            );
        } else if self.password.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password", "This password is entirely numeric.");
        }

        if self.password != self.password_confirm {
            errors.add("password_confirm", "The two password fields didn't match.");
        }

        errors.into_result(())
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// Login form submitted to `/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub next: Option<String>,
}

/// Query string accepted by the login page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Only follow `next` when it points back into this site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let local = next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\");
    (local && !next.chars().any(char::is_control)).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_valid_signup() {
        let mut form = signup("  alice.b+1@x ", " alice@example.com", "correct horse", "correct horse");
        assert!(form.validate(&PasswordConfig::default()).is_ok());
        assert_eq!(form.username, "alice.b+1@x");
        assert_eq!(form.email, "alice@example.com");
    }

    #[test]
    fn test_signup_field_errors() {
        let mut form = signup("a b", "not-an-email", "short", "other");
        let errors = form.validate(&PasswordConfig::default()).unwrap_err();

        assert!(errors.has("username"));
        assert!(errors.has("email"));
        assert!(errors.has("password"));
        assert!(errors.has("password_confirm"));
    }

    #[test]
    fn test_signup_username_length() {
        let rules = PasswordConfig::default();

        let mut form = signup("ab", "a@example.com", "password123", "password123");
        assert!(form.validate(&rules).unwrap_err().has("username"));

        let mut form = signup(&"a".repeat(151), "a@example.com", "password123", "password123");
        assert!(form.validate(&rules).unwrap_err().has("username"));

        let mut form = signup(&"a".repeat(150), "a@example.com", "password123", "password123");
        assert!(form.validate(&rules).is_ok());
    }

    #[test]
    fn test_signup_password_rules() {
        let rules = PasswordConfig {
            min_length: 4,
            max_length: 6,
            ..Default::default()
        };

        let mut form = signup("alice", "a@example.com", "1234", "1234");
        let errors = form.validate(&rules).unwrap_err();
        assert_eq!(errors.get("password").unwrap(), ["This password is entirely numeric.".to_string()]);

        let mut form = signup("alice", "a@example.com", "abcdefg", "abcdefg");
        assert!(form.validate(&rules).unwrap_err().has("password"));

        let mut form = signup("alice", "a@example.com", "abcd", "abcd");
        assert!(form.validate(&rules).is_ok());
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/invoices/new")), Some("/invoices/new"));
        assert_eq!(safe_next(Some("/dashboard?status=paid")), Some("/dashboard?status=paid"));
        assert_eq!(safe_next(Some("https://evil.example.com/")), None);
        assert_eq!(safe_next(Some("//evil.example.com")), None);
        assert_eq!(safe_next(Some("/\\evil.example.com")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }
}
