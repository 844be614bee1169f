//! Sign-up and password-change form checks.
//!
//! Unlike the username chain these collect every failing field, since the
//! form shows all of them at once.

use serde::{Deserialize, Serialize};

use crate::slug::{get_slug_with, SlugOptions};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email_consent: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PasswordChange {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// A single failing form field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Loose address check: one `@`, something before it, and a dotted domain
/// after it.
pub fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !s.chars().any(char::is_whitespace)
}

fn check_password(field: &'static str, value: &str, errors: &mut Vec<FieldError>) {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            field,
            "Password must be at least 8 characters.",
        ));
    }
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.first_name.is_empty() {
            errors.push(FieldError::new("first_name", "First name is required."));
        }
        if self.last_name.is_empty() {
            errors.push(FieldError::new("last_name", "Last name is required."));
        }
        if self.phone.is_empty() {
            errors.push(FieldError::new("phone", "Phone is required."));
        }
        if !looks_like_email(&self.email) {
            errors.push(FieldError::new("email", "Invalid email address."));
        }
        check_password("password", &self.password, &mut errors);
        if !self.email_consent {
            errors.push(FieldError::new(
                "email_consent",
                "We need your consent to send you emails.",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Username to try for this person: the one they typed, or one derived
    /// from their full name. Either way it goes through slug normalization.
    pub fn suggested_username(&self, opts: SlugOptions) -> String {
        match self.username.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => get_slug_with(u, opts),
            _ => get_slug_with(&format!("{} {}", self.first_name, self.last_name), opts),
        }
    }
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_password("current_password", &self.current_password, &mut errors);
        check_password("new_password", &self.new_password, &mut errors);
        check_password("confirm_password", &self.confirm_password, &mut errors);
        if self.new_password != self.confirm_password {
            errors.push(FieldError::new("confirm_password", "Passwords do not match"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            first_name: "Юлия".into(),
            last_name: "Иванова".into(),
            phone: "+49 151 0000000".into(),
            email: "julia@example.com".into(),
            password: "correct horse".into(),
            email_consent: true,
            username: None,
        }
    }

    #[test]
    fn complete_form_passes() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn every_failing_field_is_reported() {
        let errors = RegistrationForm::default().validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            [
                "first_name",
                "last_name",
                "phone",
                "email",
                "password",
                "email_consent"
            ]
        );
    }

    #[test]
    fn short_password_message() {
        let mut f = form();
        f.password = "short".into();
        let errors = f.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError::new(
                "password",
                "Password must be at least 8 characters."
            )]
        );
    }

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("not-an-email"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("a b@c.de"));
    }

    #[test]
    fn username_is_derived_from_name() {
        let opts = SlugOptions::default();
        assert_eq!(form().suggested_username(opts), "yuliya-ivanova");

        let mut f = form();
        f.username = Some("  julia.dances ".into());
        assert_eq!(f.suggested_username(opts), "julia.dances");

        f.username = Some("   ".into());
        assert_eq!(f.suggested_username(opts), "yuliya-ivanova");
    }

    #[test]
    fn typed_username_is_normalized() {
        let opts = SlugOptions::default();
        let mut f = form();
        f.username = Some("Bad Name!!".into());
        assert_eq!(f.suggested_username(opts), "bad-name");

        f.username = Some("https://www.instagram.com/julia.dances".into());
        assert_eq!(f.suggested_username(opts), "julia.dances");

        f.username = Some("abcdefgh".into());
        assert_eq!(f.suggested_username(SlugOptions::new(2, 5)), "abcde");
    }

    #[test]
    fn password_change_requires_match() {
        let ok = PasswordChange {
            current_password: "old password".into(),
            new_password: "new password".into(),
            confirm_password: "new password".into(),
        };
        assert!(ok.validate().is_ok());

        let mismatch = PasswordChange {
            confirm_password: "other password".into(),
            ..ok
        };
        assert_eq!(
            mismatch.validate().unwrap_err(),
            vec![FieldError::new("confirm_password", "Passwords do not match")]
        );
    }
}
