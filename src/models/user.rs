// src/models/user.rs
// DOCUMENTATION: User accounts, roles and auth payloads
// PURPOSE: Defines the users table mapping and every request DTO touching it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Access level of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

/// Represents a complete user record from the database
/// DOCUMENTATION: Secrets (password hash, reset token) and the soft-delete
/// flag are never serialized
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,

    /// bcrypt hash
    #[serde(skip_serializing)]
    pub password: String,

    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,

    /// sha256 of the reset token mailed to the user
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,

    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the password changed after a token issued at `jwt_iat` (seconds)
    pub fn changed_password_after(&self, jwt_iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => jwt_iat < changed_at.timestamp(),
            None => false,
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Public author info embedded in reviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

/// Guide info embedded in tour details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GuideSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

/// POST /api/v1/users/signup
/// The role is never taken from the request; new accounts are always `user`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email address."))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "password and passwordConfirm do not match!"))]
    pub password_confirm: String,
}

impl SignupRequest {
    pub fn normalize(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// POST /api/v1/users/login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// POST /api/v1/users/forgotPassword
#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

/// PATCH /api/v1/users/resetPassword/{token}
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "password and passwordConfirm do not match!"))]
    pub password_confirm: String,
}

/// PATCH /api/v1/users/updateMyPassword
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "password and passwordConfirm do not match!"))]
    pub new_password_confirm: String,
}

/// PATCH /api/v1/users/updateMe and POST /submit-user-data
/// Password fields are only captured so the handler can reject them
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email address."))]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<serde_json::Value>,

    #[serde(default)]
    pub password_confirm: Option<serde_json::Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }

    pub fn normalize(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self
    }
}

/// PATCH /api/v1/users/{id} (admin). Not for passwords.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email address."))]
    pub email: Option<String>,

    pub photo: Option<String>,

    pub role: Option<Role>,
}

#[cfg(test)]
pub(crate) fn sample_user(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Laura Wilson".to_string(),
        email: "laura@example.com".to_string(),
        photo: "default.jpg".to_string(),
        role,
        password: "$2b$10$hash".to_string(),
        password_changed_at: None,
        password_reset_token: None,
        password_reset_expires: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_serialization_hides_secrets() {
        let mut user = sample_user(Role::Guide);
        user.password_reset_token = Some("abc".to_string());
        let json = serde_json::to_value(&user).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("passwordResetToken").is_none());
        assert!(json.get("active").is_none());
        assert_eq!(json["role"], "guide");
        assert_eq!(json["email"], "laura@example.com");
    }

    #[test]
    fn test_changed_password_after() {
        let mut user = sample_user(Role::User);
        let issued_at = Utc::now().timestamp();
        assert!(!user.changed_password_after(issued_at));

        user.password_changed_at = Some(Utc::now() + Duration::seconds(30));
        assert!(user.changed_password_after(issued_at));

        user.password_changed_at = Some(Utc::now() - Duration::hours(1));
        assert!(!user.changed_password_after(issued_at));
    }

    #[test]
    fn test_signup_validation() {
        let ok = SignupRequest {
            name: "Laura".into(),
            email: "laura@example.com".into(),
            password: "pass1234".into(),
            password_confirm: "pass1234".into(),
        };
        assert!(ok.validate().is_ok());

        let mismatch = SignupRequest {
            password_confirm: "different".into(),
            ..ok.clone()
        };
        assert!(mismatch.validate().is_err());

        let short = SignupRequest {
            password: "short".into(),
            password_confirm: "short".into(),
            ..ok
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_signup_normalize() {
        let req = SignupRequest {
            name: "  Laura Wilson ".into(),
            email: " Laura@Example.COM ".into(),
            password: "pass1234".into(),
            password_confirm: "pass1234".into(),
        }
        .normalize();
        assert_eq!(req.name, "Laura Wilson");
        assert_eq!(req.email, "laura@example.com");
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), "lead-guide");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_update_me_detects_password() {
        let req: UpdateMeRequest =
            serde_json::from_str(r#"{"name":"New","password":"x"}"#).unwrap();
        assert!(req.touches_password());
        let req: UpdateMeRequest = serde_json::from_str(r#"{"name":"New"}"#).unwrap();
        assert!(!req.touches_password());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(sample_user(Role::User).first_name(), "Laura");
    }
}
