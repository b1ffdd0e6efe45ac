//! Password hashing using Argon2 and the password strength policy

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;
use thiserror::Error;
use wd_core::config::PasswordPolicyConfig;
use wd_core::{ValidationErrors, WdError};

const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

impl From<PasswordError> for WdError {
    fn from(err: PasswordError) -> Self {
        WdError::Internal(err.to_string())
    }
}

/// Hash a password using Argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hash(e.to_string())),
    }
}

/// Result of checking a password against the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// 100 minus 20 per failed requirement, floored at zero
    pub strength_score: u8,
}

impl PasswordStrength {
    /// Fail with a validation error on `field` unless the password passed
    pub fn into_result(self, field: &str) -> Result<(), WdError> {
        if self.is_valid {
            return Ok(());
        }
        let mut errors = ValidationErrors::new();
        for message in self.errors {
            errors.add(field, message);
        }
        Err(WdError::Validation(errors))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordPolicy {
    config: PasswordPolicyConfig,
}

impl PasswordPolicy {
    pub fn new(config: PasswordPolicyConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, password: &str) -> PasswordStrength {
        let c = &self.config;
        let length = password.chars().count();
        let mut errors = Vec::new();

        if length < c.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                c.min_length
            ));
        }
        if length > c.max_length {
            errors.push(format!(
                "Password must be at most {} characters long",
                c.max_length
            ));
        }
        if c.require_uppercase && !password.chars().any(|ch| ch.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if c.require_lowercase && !password.chars().any(|ch| ch.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if c.require_digit && !password.chars().any(|ch| ch.is_ascii_digit()) {
            errors.push("Password must contain at least one number".to_string());
        }
        if c.require_special && !password.chars().any(|ch| SPECIAL_CHARACTERS.contains(ch)) {
            errors.push("Password must contain at least one special character".to_string());
        }

        let penalty = (errors.len() * 20).min(100) as u8;
        PasswordStrength {
            is_valid: errors.is_empty(),
            strength_score: 100 - penalty,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "Secure!Password123";
        let hash = hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Same!Pass1").unwrap();
        let b = hash_password("Same!Pass1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_policy_accepts_strong_password() {
        let strength = PasswordPolicy::default().check("Str0ng!Pass");
        assert!(strength.is_valid);
        assert_eq!(strength.strength_score, 100);
        assert!(strength.errors.is_empty());
    }

    #[test]
    fn test_policy_scores_failures() {
        let policy = PasswordPolicy::default();

        let strength = policy.check("weakpass");
        assert!(!strength.is_valid);
        // uppercase, digit, special
        assert_eq!(strength.errors.len(), 3);
        assert_eq!(strength.strength_score, 40);

        let strength = policy.check("");
        // length, upper, lower, digit, special
        assert_eq!(strength.errors.len(), 5);
        assert_eq!(strength.strength_score, 0);
    }

    #[test]
    fn test_policy_toggles() {
        let policy = PasswordPolicy::new(PasswordPolicyConfig {
            require_special: false,
            require_uppercase: false,
            ..Default::default()
        });
        assert!(policy.check("lowercase1").is_valid);
    }

    #[test]
    fn test_into_result() {
        let err = PasswordPolicy::default()
            .check("short")
            .into_result("password")
            .unwrap_err();
        match err {
            WdError::Validation(errors) => assert!(errors.has_error("password")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
