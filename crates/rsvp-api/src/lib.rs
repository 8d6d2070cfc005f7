//! rsvp-api — HTTP surface of the RSVP service.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/rsvp` | Submit an RSVP |
//! | GET | `/api/export` | Download all RSVPs as CSV (shared secret) |
//! | POST | `/api/tg/webhook` | Bot webhook (channel enabled) |
//! | POST | `/api/tg/init` | Register the chat the page was opened from (channel enabled) |
//! | GET | `/` | Landing page with event details filled in |
//! | GET | `/*` | Static files |
//!
//! Every response carries permissive CORS headers and `OPTIONS` is answered
//! with 204 before routing.

pub mod client;
pub mod error;
pub mod export;
pub mod handlers;
pub mod landing;
pub mod limiter;
pub mod webhook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use rsvp_core::ServiceConfig;
use rsvp_core::config::EventConfig;
use rsvp_notify::{ChannelMessenger, Dispatcher, EmailSender};
use rsvp_state::{CancellationResolver, IdentityStore, RsvpStore};

pub use error::{ApiError, ApiResponse};
pub use limiter::RateLimiter;

/// Webhook updates carry whole chat messages; they get more room than forms.
const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

/// Request-independent settings the handlers read.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Sender address for every outbound email.
    pub from: String,
    pub organizer: String,
    pub export_secret: Option<String>,
    pub event: EventConfig,
    pub web_app_url: String,
    pub static_dir: PathBuf,
    /// Store files and their directories; never served as static files.
    pub private_paths: Vec<PathBuf>,
    pub max_body_bytes: usize,
}

impl ApiSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let storage = &config.storage;
        let store_files = [
            storage.rsvp_path.clone(),
            storage.identity_path(),
            storage.reminder_sent_path(),
        ];
        let mut private_paths: Vec<PathBuf> = store_files
            .iter()
            .filter_map(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .collect();
        private_paths.extend(store_files);

        Self {
            from: config.email.from.clone(),
            organizer: config.email.organizer.clone(),
            export_secret: config.export.secret.clone().filter(|s| !s.is_empty()),
            event: config.event.clone(),
            web_app_url: config.channel.web_app_url.clone(),
            static_dir: config.server.static_dir.clone(),
            private_paths,
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub rsvps: RsvpStore,
    pub identities: IdentityStore,
    pub cancellations: CancellationResolver,
    pub limiter: Arc<RateLimiter>,
    pub email: Arc<dyn EmailSender>,
    /// `None` when the chat channel is not configured.
    pub channel: Option<Arc<dyn ChannelMessenger>>,
    pub dispatcher: Dispatcher,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(
        config: &ServiceConfig,
        rsvps: RsvpStore,
        identities: IdentityStore,
        email: Arc<dyn EmailSender>,
        channel: Option<Arc<dyn ChannelMessenger>>,
        dispatcher: Dispatcher,
    ) -> Self {
        let limiter = RateLimiter::new(
            config.limits.max_requests,
            Duration::from_secs(config.limits.window_secs),
        );
        Self {
            cancellations: CancellationResolver::new(identities.clone(), rsvps.clone()),
            rsvps,
            identities,
            limiter: Arc::new(limiter),
            email,
            channel,
            dispatcher,
            settings: Arc::new(ApiSettings::from_config(config)),
        }
    }
}

/// Build the complete router: API, landing page, static files, CORS.
pub fn build_router(state: AppState) -> Router {
    let form_limit = DefaultBodyLimit::max(state.settings.max_body_bytes);

    let api_routes = Router::new()
        .route("/rsvp", post(handlers::submit_rsvp).layer(form_limit))
        .route("/export", get(handlers::export_rsvps))
        .route(
            "/tg/webhook",
            post(webhook::telegram_webhook).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        )
        .route("/tg/init", post(handlers::channel_init).layer(form_limit));

    Router::new()
        .nest("/api", api_routes)
        .route("/", get(landing::index))
        .fallback(landing::static_file)
        .with_state(state)
        .layer(middleware::from_fn(cors))
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-Export-Key"),
    );
    response
}
