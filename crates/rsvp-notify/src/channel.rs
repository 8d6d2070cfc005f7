//! Chat-channel messaging (Telegram Bot API).
//!
//! Outbound calls go through [`ChannelMessenger`]. The inbound update
//! shapes the webhook receives live here too so both directions share one
//! definition of the bot protocol.

use async_trait::async_trait;
use rsvp_core::ChatId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::NotifyResult;
use crate::https::HttpsClient;

/// Callback payload attached to the cancel button.
pub const CANCEL_CALLBACK: &str = "cancel_rsvp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Plain,
    Markdown,
}

impl ParseMode {
    fn as_api(self) -> Option<&'static str> {
        match self {
            ParseMode::Plain => None,
            ParseMode::Markdown => Some("Markdown"),
        }
    }
}

/// Sends messages to chat addresses.
#[async_trait]
pub trait ChannelMessenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str, mode: ParseMode) -> NotifyResult<()>;

    /// Markdown message with one inline button carrying [`CANCEL_CALLBACK`].
    async fn send_with_cancel_button(&self, chat_id: ChatId, text: &str, button_label: &str) -> NotifyResult<()>;

    /// Markdown message with one inline button that opens `url` as a web app.
    async fn send_web_app_link(&self, chat_id: ChatId, text: &str, url: &str, button_label: &str) -> NotifyResult<()>;

    async fn answer_callback(&self, callback_id: &str) -> NotifyResult<()>;
}

#[derive(Debug, Clone)]
pub struct TelegramBot {
    client: HttpsClient,
    endpoint: String,
}

impl TelegramBot {
    pub fn new(client: HttpsClient, api_base: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    async fn call(&self, method: &str, payload: &Value) -> NotifyResult<()> {
        let url = format!("{}/{method}", self.endpoint);
        self.client.post_json(&url, None, payload).await?;
        debug!(method, "bot api call ok");
        Ok(())
    }
}

fn message_payload(chat_id: ChatId, text: &str, mode: ParseMode, keyboard: Option<Value>) -> Value {
    let mut payload = json!({ "chat_id": chat_id, "text": text });
    if let Some(parse_mode) = mode.as_api() {
        payload["parse_mode"] = json!(parse_mode);
    }
    if let Some(buttons) = keyboard {
        payload["reply_markup"] = json!({ "inline_keyboard": [[buttons]] });
    }
    payload
}

#[async_trait]
impl ChannelMessenger for TelegramBot {
    async fn send_text(&self, chat_id: ChatId, text: &str, mode: ParseMode) -> NotifyResult<()> {
        self.call("sendMessage", &message_payload(chat_id, text, mode, None))
            .await
    }

    async fn send_with_cancel_button(&self, chat_id: ChatId, text: &str, button_label: &str) -> NotifyResult<()> {
        let button = json!({ "text": button_label, "callback_data": CANCEL_CALLBACK });
        self.call(
            "sendMessage",
            &message_payload(chat_id, text, ParseMode::Markdown, Some(button)),
        )
        .await
    }

    async fn send_web_app_link(&self, chat_id: ChatId, text: &str, url: &str, button_label: &str) -> NotifyResult<()> {
        let button = json!({ "text": button_label, "web_app": { "url": url } });
        self.call(
            "sendMessage",
            &message_payload(chat_id, text, ParseMode::Markdown, Some(button)),
        )
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> NotifyResult<()> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id }),
        )
        .await
    }
}

// ── Inbound updates ────────────────────────────────────────────────

/// Webhook update. Only the fields the service reacts to are modelled;
/// everything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: ChatId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: String,
}

impl User {
    /// `@username` when set, otherwise the first name.
    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            self.first_name.clone()
        } else {
            format!("@{}", self.username)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_payload_has_no_parse_mode() {
        let p = message_payload(5, "hi", ParseMode::Plain, None);
        assert_eq!(p, json!({ "chat_id": 5, "text": "hi" }));
    }

    #[test]
    fn cancel_button_payload_shape() {
        let button = json!({ "text": "Cancel", "callback_data": CANCEL_CALLBACK });
        let p = message_payload(5, "*hi*", ParseMode::Markdown, Some(button));
        assert_eq!(p["parse_mode"], "Markdown");
        assert_eq!(
            p["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "cancel_rsvp"
        );
    }

    #[test]
    fn update_parses_callback_and_ignores_unknown_fields() {
        let raw = r#"{
            "update_id": 1,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "data": "cancel_rsvp"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.from.id, 42);
        assert_eq!(cb.data, CANCEL_CALLBACK);
        assert!(update.message.is_none());
    }

    #[test]
    fn user_display_name_prefers_username() {
        let mut user = User {
            id: 1,
            first_name: "Ann".to_string(),
            username: String::new(),
        };
        assert_eq!(user.display_name(), "Ann");
        user.username = "ann_k".to_string();
        assert_eq!(user.display_name(), "@ann_k");
    }
}
