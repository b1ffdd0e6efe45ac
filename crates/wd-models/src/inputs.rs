//! Validated input types for user operations

use serde::{Deserialize, Serialize};
use validator::Validate;
use wd_core::{Role, ValidationErrors, WdError, WdResult};

fn default_true() -> bool {
    true
}

/// New account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(skip_serializing)]
    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(
        length(min = 8, max = 128),
        must_match(other = "password", message = "Passwords do not match")
    )]
    pub confirm_password: String,
}

impl CreateUser {
    /// Trim names and lowercase the email ahead of validation
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self
    }
}

fn trim_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string())
}

/// Administrative partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 500))]
    pub avatar_url: Option<String>,

    pub is_active: Option<bool>,

    pub role: Option<Role>,
}

impl UpdateUser {
    pub fn normalized(mut self) -> Self {
        self.first_name = trim_name(self.first_name);
        self.last_name = trim_name(self.last_name);
        self
    }
}

/// Self-service profile update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 500))]
    pub avatar_url: Option<String>,
}

impl UpdateProfile {
    pub fn normalized(mut self) -> Self {
        self.first_name = trim_name(self.first_name);
        self.last_name = trim_name(self.last_name);
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePassword {
    #[validate(length(min = 1))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password: String,

    #[validate(
        length(min = 8, max = 128),
        must_match(other = "new_password", message = "New passwords do not match")
    )]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPassword {
    #[validate(length(min = 1))]
    pub token: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password: String,

    #[validate(
        length(min = 8, max = 128),
        must_match(other = "new_password", message = "Passwords do not match")
    )]
    pub confirm_password: String,
}

/// Convert `validator` output into the shared validation error type
pub fn to_validation_errors(errors: &validator::ValidationErrors) -> ValidationErrors {
    let mut out = ValidationErrors::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match &error.message {
                Some(message) => message.to_string(),
                None => default_message(&error.code, &error.params),
            };
            out.add(field.to_string(), message);
        }
    }
    out
}

fn default_message(
    code: &str,
    params: &std::collections::HashMap<std::borrow::Cow<'static, str>, serde_json::Value>,
) -> String {
    match code {
        "length" => match (params.get("min"), params.get("max")) {
            (Some(min), Some(max)) => format!("must be between {} and {} characters", min, max),
            (Some(min), None) => format!("must be at least {} characters", min),
            (None, Some(max)) => format!("must be at most {} characters", max),
            (None, None) => "has an invalid length".to_string(),
        },
        "email" => "is not a valid email address".to_string(),
        "must_match" => "does not match".to_string(),
        other => format!("is invalid ({})", other),
    }
}

/// Run `validator` rules and map failures to `WdError::Validation`
pub fn validate_input<T: Validate>(input: &T) -> WdResult<()> {
    input
        .validate()
        .map_err(|e| WdError::Validation(to_validation_errors(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateUser {
        CreateUser {
            email: "new@example.com".into(),
            first_name: "New".into(),
            last_name: "User".into(),
            role: Role::User,
            is_active: true,
            password: "Str0ng!Pass".into(),
            confirm_password: "Str0ng!Pass".into(),
        }
    }

    #[test]
    fn test_valid_create() {
        assert!(validate_input(&create_input()).is_ok());
    }

    #[test]
    fn test_create_defaults_from_json() {
        let input: CreateUser = serde_json::from_value(serde_json::json!({
            "email": "a@b.co",
            "first_name": "A",
            "last_name": "B",
            "password": "Str0ng!Pass",
            "confirm_password": "Str0ng!Pass"
        }))
        .unwrap();
        assert_eq!(input.role, Role::User);
        assert!(input.is_active);
    }

    #[test]
    fn test_password_mismatch() {
        let mut input = create_input();
        input.confirm_password = "Different1!".into();
        match validate_input(&input) {
            Err(WdError::Validation(errors)) => {
                assert_eq!(
                    errors.get("confirm_password").unwrap(),
                    &vec!["Passwords do not match".to_string()]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_email_and_names() {
        let mut input = create_input();
        input.email = "not-an-email".into();
        input.first_name = String::new();
        let Err(WdError::Validation(errors)) = validate_input(&input) else {
            panic!("expected validation error");
        };
        assert!(errors.has_error("email"));
        assert!(errors.has_error("first_name"));
    }

    #[test]
    fn test_blank_names_fail_after_normalizing() {
        let mut input = create_input();
        input.email = "  New@Example.COM ".into();
        input.first_name = "   ".into();
        input.last_name = " Lovelace ".into();
        let input = input.normalized();
        assert_eq!(input.email, "new@example.com");
        assert_eq!(input.last_name, "Lovelace");
        let Err(WdError::Validation(errors)) = validate_input(&input) else {
            panic!("expected validation error");
        };
        assert!(errors.has_error("first_name"));
        assert!(!errors.has_error("last_name"));

        let update = UpdateUser {
            last_name: Some("\t ".into()),
            ..Default::default()
        }
        .normalized();
        assert!(validate_input(&update).is_err());

        let profile = UpdateProfile {
            first_name: Some("  Ada ".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert!(validate_input(&profile).is_ok());
    }

    #[test]
    fn test_partial_update_skips_missing_fields() {
        assert!(validate_input(&UpdateUser::default()).is_ok());
        let update = UpdateProfile {
            first_name: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_input(&update).is_err());
    }

    #[test]
    fn test_change_password_mismatch() {
        let input = ChangePassword {
            current_password: "old".into(),
            new_password: "N3w!Password".into(),
            confirm_password: "N3w!Passw0rd".into(),
        };
        let Err(WdError::Validation(errors)) = validate_input(&input) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("confirm_password").unwrap()[0],
            "New passwords do not match"
        );
    }
}
