//! Domain types for the RSVP service.
//!
//! These are the records persisted by the stores in `rsvp-state` and the
//! bodies exchanged over the HTTP API. Field names on disk match the files
//! written by earlier deployments of the service, so existing data loads
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phone::{PhoneKey, normalize};

/// Opaque numeric address of a chat-channel recipient.
pub type ChatId = i64;

// ── RSVP entry ─────────────────────────────────────────────────────

/// One accepted guest response. Never mutated in place; entries are only
/// appended or removed wholesale by cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RsvpEntry {
    pub name: String,
    /// Phone exactly as the guest typed it (trimmed).
    pub phone: String,
    #[serde(default, with = "empty_as_none")]
    pub email: Option<String>,
    #[serde(
        rename = "telegram_chat_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chat_id: Option<ChatId>,
    /// Creation time, serialized as RFC 3339.
    pub at: DateTime<Utc>,
}

impl RsvpEntry {
    pub fn phone_key(&self) -> PhoneKey {
        normalize(&self.phone)
    }

    /// The email address if one was given and is not blank.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

// ── Channel identity ───────────────────────────────────────────────

/// A recipient registered through the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelIdentity {
    pub chat_id: ChatId,
    /// Normalized phone key (digits only, possibly empty).
    pub phone: PhoneKey,
    pub name: String,
}

impl ChannelIdentity {
    /// Build an identity from a raw phone string, normalizing it.
    pub fn new(chat_id: ChatId, raw_phone: &str, name: impl Into<String>) -> Self {
        Self {
            chat_id,
            phone: normalize(raw_phone),
            name: name.into(),
        }
    }
}

// ── Inbound bodies ─────────────────────────────────────────────────

/// Body of `POST /api/rsvp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RsvpSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<ChatId>,
}

/// Body of `POST /api/tg/init`, sent when the landing page is opened from
/// inside the chat client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelInit {
    #[serde(default)]
    pub chat_id: ChatId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
}

impl ChannelInit {
    /// Display name preference: `@username`, then first name, then a fallback.
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            format!("@{}", self.username)
        } else if !self.first_name.is_empty() {
            self.first_name.clone()
        } else {
            "Telegram User".to_string()
        }
    }
}

/// Serialize `None` as `""` and read `""` back as `None`.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.trim().is_empty()))
    }
}
