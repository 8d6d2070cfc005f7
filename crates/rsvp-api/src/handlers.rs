//! REST API handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use chrono::Utc;
use rsvp_core::{ChannelIdentity, ChannelInit, RsvpEntry, RsvpSubmission, ValidSubmission};
use rsvp_notify::messages;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::ClientKey;
use crate::error::{ApiError, ApiResponse};
use crate::{AppState, export};

type ApiResult<T> = Result<T, ApiError>;

// ── Submission ─────────────────────────────────────────────────

/// POST /api/rsvp
///
/// Admission, decode, validation, notices, then the durable append.
/// Notices are detached; their failure never blocks the append.
pub async fn submit_rsvp(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: Result<Json<RsvpSubmission>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    if !state.limiter.allow(&client) {
        info!(%client, "submission rate limited");
        return Err(ApiError::RateLimited);
    }
    let Json(submission) = body?;
    let guest = submission.validate()?;

    send_notices(&state, &guest);
    confirm_on_channel(&state, &guest);

    state.rsvps.append(RsvpEntry {
        name: guest.name.clone(),
        phone: guest.phone.clone(),
        email: guest.email.clone(),
        chat_id: guest.chat_id,
        at: Utc::now(),
    })?;
    info!(name = %guest.name, "rsvp recorded");

    Ok(ApiResponse::done())
}

fn send_notices(state: &AppState, guest: &ValidSubmission) {
    let settings = &state.settings;

    let notice = messages::organizer_notice(&settings.from, &settings.organizer, guest);
    let email = Arc::clone(&state.email);
    state
        .dispatcher
        .spawn("organizer_notice", async move { email.send(&notice).await });

    if let Some(address) = &guest.email {
        let thanks = messages::guest_thank_you(&settings.from, address);
        let email = Arc::clone(&state.email);
        state
            .dispatcher
            .spawn("guest_thank_you", async move { email.send(&thanks).await });
    }
}

/// Register the submitting chat (when one came with the form) and send the
/// confirmation to whichever chat is registered for this phone.
fn confirm_on_channel(state: &AppState, guest: &ValidSubmission) {
    let Some(channel) = &state.channel else {
        return;
    };

    if let Some(chat_id) = guest.chat_id {
        let identity = ChannelIdentity::new(chat_id, &guest.phone, guest.name.as_str());
        match state.identities.save(identity) {
            Ok(outcome) => debug!(chat_id, ?outcome, "identity registered from form"),
            Err(e) => warn!(chat_id, error = %e, "could not register identity"),
        }
    }

    let identity = match state.identities.find_by_phone(&guest.phone_key) {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            debug!(name = %guest.name, "no channel identity for this phone");
            return;
        }
        Err(e) => {
            warn!(error = %e, "identity lookup failed");
            return;
        }
    };

    let text = messages::channel_confirmation(&guest.name, &state.settings.event);
    let channel = Arc::clone(channel);
    state.dispatcher.spawn("channel_confirmation", async move {
        channel
            .send_with_cancel_button(identity.chat_id, &text, messages::CANCEL_BUTTON_LABEL)
            .await
    });
}

// ── Export ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub key: Option<String>,
}

/// GET /api/export
pub async fn export_rsvps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let presented = headers
        .get("x-export-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or(query.key);

    let authorized = match (&state.settings.export_secret, presented) {
        (Some(secret), Some(key)) => !secret.is_empty() && *secret == key,
        _ => false,
    };
    if !authorized {
        warn!("export refused");
        return Err(ApiError::Unauthorized);
    }

    let entries = state.rsvps.list()?;
    info!(rows = entries.len(), "rsvp export");
    Ok((
        [
            (CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::FILENAME),
            ),
        ],
        export::to_csv(&entries),
    ))
}

// ── Channel init ───────────────────────────────────────────────

/// POST /api/tg/init
///
/// Sent by the landing page when it is opened inside the chat client.
pub async fn channel_init(
    State(state): State<AppState>,
    body: Result<Json<ChannelInit>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    if state.channel.is_none() {
        return Err(ApiError::Disabled);
    }
    let Json(init) = body?;
    if init.chat_id == 0 {
        return Err(ApiError::BadRequest("chat_id required"));
    }

    let identity = ChannelIdentity::new(init.chat_id, &init.phone, init.display_name());
    let outcome = state.identities.save(identity)?;
    info!(chat_id = init.chat_id, ?outcome, "channel identity registered");
    Ok(ApiResponse::done())
}
