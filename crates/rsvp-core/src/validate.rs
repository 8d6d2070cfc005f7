//! Validation of guest-supplied fields.
//!
//! Runs before any store mutation; a rejected submission leaves no state
//! behind.

use thiserror::Error;

use crate::phone::{PhoneKey, normalize};
use crate::types::{ChatId, RsvpSubmission};

pub const MAX_NAME_CHARS: usize = 200;
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MAX_EMAIL_LEN: usize = 254;

/// A guest field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name required, max {MAX_NAME_CHARS} chars")]
    Name,

    #[error("phone required, at least {MIN_PHONE_DIGITS} digits")]
    Phone,

    #[error("invalid email")]
    Email,
}

/// A submission whose fields have been trimmed and checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub name: String,
    pub phone: String,
    pub phone_key: PhoneKey,
    pub email: Option<String>,
    pub chat_id: Option<ChatId>,
}

impl RsvpSubmission {
    /// Trim every field and enforce the entry invariants.
    pub fn validate(&self) -> Result<ValidSubmission, ValidationError> {
        let name = self.name.trim();
        let phone = self.phone.trim();
        let email = self.email.trim();

        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationError::Name);
        }

        let phone_key = normalize(phone);
        if phone_key.len() < MIN_PHONE_DIGITS {
            return Err(ValidationError::Phone);
        }

        if !email.is_empty() && (email.len() > MAX_EMAIL_LEN || !email.contains('@')) {
            return Err(ValidationError::Email);
        }

        Ok(ValidSubmission {
            name: name.to_string(),
            phone: phone.to_string(),
            phone_key,
            email: (!email.is_empty()).then(|| email.to_string()),
            chat_id: self.telegram_chat_id,
        })
    }
}
