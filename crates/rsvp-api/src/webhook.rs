//! Bot webhook: cancel button, `/start`, and phone registration.
//!
//! Every well-formed update is answered with 200, including ones that are
//! ignored, so the bot platform does not redeliver them. Replies are
//! detached.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use rsvp_core::{ChannelIdentity, ChatId, normalize};
use rsvp_core::validate::MIN_PHONE_DIGITS;
use rsvp_notify::channel::{CallbackQuery, Message, Update};
use rsvp_notify::{CANCEL_CALLBACK, ChannelMessenger, ParseMode, messages};
use rsvp_state::Cancellation;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::ApiError;

/// POST /api/tg/webhook
pub async fn telegram_webhook(
    State(state): State<AppState>,
    body: Result<Json<Update>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Some(channel) = state.channel.clone() else {
        return Err(ApiError::Disabled);
    };
    let Json(update) = body?;

    if let Some(callback) = update.callback_query {
        on_callback(&state, channel, callback);
    } else if let Some(message) = update.message {
        on_message(&state, channel, message);
    }
    Ok(StatusCode::OK)
}

fn on_callback(state: &AppState, channel: Arc<dyn ChannelMessenger>, callback: CallbackQuery) {
    if callback.data != CANCEL_CALLBACK {
        debug!(data = %callback.data, "ignoring callback");
        return;
    }

    let chat_id = callback.from.id;
    let reply = match state.cancellations.cancel(chat_id) {
        Ok(Cancellation::Removed(removed)) => {
            info!(chat_id, removed, "rsvp cancelled from chat");
            messages::cancel_confirmation()
        }
        Ok(Cancellation::NoIdentity) => {
            debug!(chat_id, "cancel from unregistered chat");
            messages::cancel_confirmation()
        }
        Err(e) => {
            warn!(chat_id, error = %e, "cancellation failed");
            messages::cancel_failed()
        }
    };

    state.dispatcher.spawn("cancel_reply", async move {
        if let Err(e) = channel.answer_callback(&callback.id).await {
            debug!(error = %e, "callback answer failed");
        }
        channel.send_text(chat_id, reply, ParseMode::Plain).await
    });
}

fn on_message(state: &AppState, channel: Arc<dyn ChannelMessenger>, message: Message) {
    let chat_id = message.chat.id;
    let text = message.text.trim();

    if text == "/start" {
        let url = state.settings.web_app_url.clone();
        state.dispatcher.spawn("start_greeting", async move {
            channel
                .send_web_app_link(chat_id, messages::start_greeting(), &url, messages::START_BUTTON_LABEL)
                .await
        });
        return;
    }

    let name = message.from.as_ref().map(|u| u.display_name()).unwrap_or_default();

    let phone_command = text
        .strip_prefix("/phone")
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace));
    if let Some(rest) = phone_command {
        let phone = rest.trim();
        if phone.is_empty() {
            state.dispatcher.spawn("phone_usage", async move {
                channel
                    .send_text(chat_id, messages::PHONE_USAGE, ParseMode::Plain)
                    .await
            });
        } else {
            register_phone(state, channel, chat_id, phone, name);
        }
        return;
    }

    if normalize(text).len() >= MIN_PHONE_DIGITS {
        register_phone(state, channel, chat_id, text, name);
    }
}

fn register_phone(state: &AppState, channel: Arc<dyn ChannelMessenger>, chat_id: ChatId, phone: &str, name: String) {
    if let Err(e) = state.identities.save(ChannelIdentity::new(chat_id, phone, name)) {
        warn!(chat_id, error = %e, "could not save phone from chat");
        return;
    }
    info!(chat_id, "phone registered from chat");

    let reply = messages::phone_saved(phone);
    state.dispatcher.spawn("phone_saved", async move {
        channel.send_text(chat_id, &reply, ParseMode::Markdown).await
    });
}
