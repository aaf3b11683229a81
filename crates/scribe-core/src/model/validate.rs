//! Field-level validation rules shared by the user and post models.
//!
//! Validators push [`FieldError`]s into a collector instead of failing fast,
//! so a single response can report every problem with a request body.

use serde::Serialize;

/// Characters that satisfy the "special character" password rule.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// A single rejected field with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Accumulates field errors for one request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Character count (not bytes) must lie in `min..=max`.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(field, format!("must be at least {min} characters"));
        } else if len > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    pub fn optional_length(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            self.length(field, v, 0, max);
        }
    }

    pub fn username(&mut self, value: &str) {
        self.length("username", value, 3, 50);
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.push(
                "username",
                "may only contain letters, digits, underscores and hyphens",
            );
        }
    }

    pub fn email(&mut self, value: &str) {
        if !is_valid_email(value) {
            self.push("email", "value is not a valid email address");
        }
    }

    pub fn password(&mut self, field: &str, value: &str) {
        self.length(field, value, 8, 100);
        if !value.chars().any(|c| c.is_uppercase()) {
            self.push(field, "Password must contain at least one uppercase letter");
        }
        if !value.chars().any(|c| c.is_lowercase()) {
            self.push(field, "Password must contain at least one lowercase letter");
        }
        if !value.chars().any(|c| c.is_ascii_digit()) {
            self.push(field, "Password must contain at least one digit");
        }
        if !value.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
            self.push(field, "Password must contain at least one special character");
        }
    }

    pub fn phone(&mut self, value: Option<&str>) {
        if let Some(v) = value {
            if !is_valid_phone(v) {
                self.push("phone", "must be 7 to 16 digits with an optional leading +");
            }
        }
    }

    /// Returns `Err` with every collected error, or `Ok` if none were recorded.
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Pragmatic address check: one `@`, a non-empty local part and a dotted
/// domain without empty labels or whitespace.
pub fn is_valid_email(value: &str) -> bool {
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

/// Optional `+`, then 7–15 digits, or 16 digits not starting with `0`.
pub fn is_valid_phone(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match digits.len() {
        7..=15 => true,
        16 => !digits.starts_with('0'),
        _ => false,
    }
}
