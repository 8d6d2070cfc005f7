//! Phone-key normalization.
//!
//! A [`PhoneKey`] is the digits-only form of whatever a guest typed into a
//! phone field. Stores never hold references to each other; they join on
//! these keys instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of trailing digits compared when both keys are full-length
/// numbers. Covers trunk-prefix variants such as `+7 999…` vs `8 999…`.
pub const NATIONAL_DIGITS: usize = 10;

/// Digits-only canonical form of a phone string.
///
/// Stored as a plain string. Reading one back normalizes it again, so
/// files holding raw phone text still produce digits-only keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PhoneKey(String);

/// Strip every character that is not an ASCII digit.
pub fn normalize(raw: &str) -> PhoneKey {
    PhoneKey(raw.chars().filter(char::is_ascii_digit).collect())
}

impl PhoneKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of digits in the key.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The portion of the key used for joins.
    ///
    /// Empty keys have no join key and therefore never match anything.
    /// Keys with at least [`NATIONAL_DIGITS`] digits join on their last
    /// [`NATIONAL_DIGITS`] digits; shorter keys join on the whole key.
    pub fn join_key(&self) -> Option<&str> {
        if self.0.is_empty() {
            None
        } else if self.0.len() >= NATIONAL_DIGITS {
            // ASCII digits only, so every byte offset is a char boundary.
            Some(&self.0[self.0.len() - NATIONAL_DIGITS..])
        } else {
            Some(&self.0)
        }
    }

    /// Whether two keys identify the same contact.
    pub fn matches(&self, other: &PhoneKey) -> bool {
        match (self.join_key(), other.join_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PhoneKey {
    fn from(raw: String) -> Self {
        normalize(&raw)
    }
}

impl From<PhoneKey> for String {
    fn from(key: PhoneKey) -> Self {
        key.0
    }
}
