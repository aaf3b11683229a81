//! User identities and the typed requests that create or change them.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::validate::{FieldError, Validator};

pub type UserId = i64;

/// A stored identity.
///
/// `password_hash` is an opaque digest. `User` deliberately does not
/// implement `Serialize`; the web layer converts it into a response type
/// that omits the digest.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.email(&self.email);
        v.username(&self.username);
        v.optional_length("full_name", self.full_name.as_deref(), 100);
        v.optional_length("bio", self.bio.as_deref(), 1000);
        v.phone(self.phone.as_deref());
        v.password("password", &self.password);
        v.finish()
    }

    /// Builds the store record once the password has been hashed.
    pub fn into_draft(self, password_hash: String) -> UserDraft {
        UserDraft {
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            bio: self.bio,
            phone: self.phone,
            password_hash,
            is_active: true,
            is_verified: false,
            is_superuser: false,
        }
    }
}

/// Everything the store needs to insert a user; the store assigns the id
/// and timestamps.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
}

/// Profile update with every field optional. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        if let Some(email) = &self.email {
            v.email(email);
        }
        if let Some(username) = &self.username {
            v.username(username);
        }
        v.optional_length("full_name", self.full_name.as_deref(), 100);
        v.optional_length("bio", self.bio.as_deref(), 1000);
        v.phone(self.phone.as_deref());
        v.optional_length("avatar_url", self.avatar_url.as_deref(), 500);
        v.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.full_name.is_none()
            && self.bio.is_none()
            && self.phone.is_none()
            && self.avatar_url.is_none()
    }

    /// Merges the present fields into `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(full_name) = &self.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
    }
}

/// Password change request; the current password must be re-supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.password("new_password", &self.new_password);
        v.finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(id: UserId, username: &str) -> User {
        let now = Utc::now();
        User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: None,
            bio: None,
            phone: None,
            avatar_url: None,
            is_active: true,
            is_verified: true,
            is_superuser: false,
            password_hash: "digest".to_string(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn draft(username: &str) -> UserDraft {
        UserDraft {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: None,
            bio: None,
            phone: None,
            password_hash: "digest".to_string(),
            is_active: true,
            is_verified: false,
            is_superuser: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewUser {
        NewUser {
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            full_name: Some("Test User".to_string()),
            bio: Some("Test user bio".to_string()),
            phone: Some("+1234567890".to_string()),
            password: "TestPass123!".to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let new_user = NewUser {
            email: "invalid-email".to_string(),
            username: "ab".to_string(),
            ..registration()
        };
        let errors = new_user.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "email"));
        assert!(errors.iter().any(|e| e.field == "username"));
    }

    #[test]
    fn draft_starts_active_and_unverified() {
        let draft = registration().into_draft("hash".to_string());
        assert!(draft.is_active);
        assert!(!draft.is_verified);
        assert!(!draft.is_superuser);
        assert_eq!(draft.password_hash, "hash");
    }

    #[test]
    fn update_merges_only_present_fields() {
        let mut user = fixtures::user(1, "alice");
        user.bio = Some("old bio".to_string());

        let update = UserUpdate {
            full_name: Some("Alice A.".to_string()),
            ..UserUpdate::default()
        };
        update.apply_to(&mut user);

        assert_eq!(user.full_name.as_deref(), Some("Alice A."));
        assert_eq!(user.bio.as_deref(), Some("old bio"));
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn update_validates_present_fields_only() {
        assert!(UserUpdate::default().validate().is_ok());
        let update = UserUpdate {
            username: Some("bad name".to_string()),
            ..UserUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UserUpdate::default().is_empty());
        let update = UserUpdate {
            avatar_url: Some("https://example.com/a.png".to_string()),
            ..UserUpdate::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn password_change_checks_new_password() {
        let change = PasswordChange {
            current_password: "anything".to_string(),
            new_password: "short".to_string(),
        };
        let errors = change.validate().unwrap_err();
        assert!(errors.iter().all(|e| e.field == "new_password"));
    }
}
