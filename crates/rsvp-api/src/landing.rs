//! Landing page and static files.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use rsvp_core::config::EventConfig;
use rsvp_notify::messages::escape_html;
use tracing::{debug, warn};

use crate::AppState;

/// Replace the `{{WEDDING_*}}` placeholders with HTML-escaped event details.
pub fn render_index(template: &str, event: &EventConfig) -> String {
    [
        ("{{WEDDING_PLACE_NAME}}", &event.place_name),
        ("{{WEDDING_PLACE_URL}}", &event.place_url),
        ("{{WEDDING_DATE_DISPLAY}}", &event.date_display),
        ("{{WEDDING_TIME_DISPLAY}}", &event.time_display),
    ]
    .into_iter()
    .fold(template.to_string(), |html, (placeholder, value)| {
        html.replace(placeholder, &escape_html(value))
    })
}

/// GET /
pub async fn index(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = state.settings.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(template) => Html(render_index(&template, &state.settings.event)).into_response(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "index template unavailable");
            static_file(State(state), method, uri).await
        }
    }
}

/// Fallback: serve a file from the static directory.
pub async fn static_file(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(relative) = safe_relative(uri.path()) else {
        return not_found();
    };

    let root = &state.settings.static_dir;
    let mut candidate = root.join(&relative);
    if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_dir()) {
        candidate.push("index.html");
    }

    // Symlinks and the data directory must not leak out through the root.
    let (Ok(resolved), Ok(root)) = (
        tokio::fs::canonicalize(&candidate).await,
        tokio::fs::canonicalize(root).await,
    ) else {
        return not_found();
    };
    if !resolved.starts_with(&root) || is_private(&state, &resolved).await {
        warn!(path = %uri.path(), "static request outside the public tree refused");
        return not_found();
    }

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => ([(CONTENT_TYPE, content_type(&resolved))], bytes).into_response(),
        Err(_) => not_found(),
    }
}

async fn is_private(state: &AppState, resolved: &Path) -> bool {
    for path in &state.settings.private_paths {
        if let Ok(private) = tokio::fs::canonicalize(path).await {
            if resolved.starts_with(&private) {
                return true;
            }
        }
    }
    false
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// Relative path for a request path, or `None` when it tries to climb out
/// of the root or names a hidden file.
pub fn safe_relative(request_path: &str) -> Option<PathBuf> {
    if request_path.contains(['\\', '\0']) {
        return None;
    }
    let mut relative = PathBuf::new();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) if !part.to_string_lossy().starts_with('.') => {
                relative.push(part)
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(relative)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("woff") => "font/woff",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_escaped() {
        let event = EventConfig {
            place_name: "Café <Loft>".to_string(),
            place_url: "https://maps.example.com/?q=a&b".to_string(),
            date_display: "1 August".to_string(),
            time_display: "16:00".to_string(),
            ..EventConfig::default()
        };
        let html = render_index(
            "<a href=\"{{WEDDING_PLACE_URL}}\">{{WEDDING_PLACE_NAME}}</a> {{WEDDING_DATE_DISPLAY}}, {{WEDDING_TIME_DISPLAY}} {{OTHER}}",
            &event,
        );
        assert_eq!(
            html,
            "<a href=\"https://maps.example.com/?q=a&amp;b\">Café &lt;Loft&gt;</a> 1 August, 16:00 {{OTHER}}"
        );
    }

    #[test]
    fn traversal_and_hidden_paths_are_refused() {
        assert_eq!(safe_relative("/css/site.css"), Some(PathBuf::from("css/site.css")));
        assert_eq!(safe_relative("/"), Some(PathBuf::new()));
        assert_eq!(safe_relative("/../etc/passwd"), None);
        assert_eq!(safe_relative("/a/../../b"), None);
        assert_eq!(safe_relative("/.env"), None);
        assert_eq!(safe_relative("/a\\..\\b"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("x/INDEX.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
