//! Provider clients against a local recording HTTP server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use rsvp_notify::*;
use serde_json::Value;

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    auth: Option<String>,
    body: Value,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

async fn record(State(log): State<Log>, uri: Uri, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    let path = uri.path().to_string();
    log.lock().unwrap().push(Recorded {
        path: path.clone(),
        auth: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if path.contains("slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if path.contains("broken") {
        return (StatusCode::BAD_GATEWAY, r#"{"message":"upstream down"}"#.to_string());
    }
    (StatusCode::OK, r#"{"ok":true}"#.to_string())
}

async fn start_server() -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let app = Router::new().fallback(record).with_state(Arc::clone(&log));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn client() -> HttpsClient {
    HttpsClient::new(Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn resend_mailer_posts_bearer_json() {
    let (addr, log) = start_server().await;
    let mailer = ResendMailer::new(client(), format!("http://{addr}/"), "re_test_key");

    mailer
        .send(&OutboundEmail {
            from: "RSVP <rsvp@example.com>".to_string(),
            to: "org@example.com".to_string(),
            subject: "RSVP: Ann".to_string(),
            html: "<p>Ann</p>".to_string(),
        })
        .await
        .unwrap();

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/emails");
    assert_eq!(calls[0].auth.as_deref(), Some("Bearer re_test_key"));
    assert_eq!(calls[0].body["to"], serde_json::json!(["org@example.com"]));
    assert_eq!(calls[0].body["subject"], "RSVP: Ann");
}

#[tokio::test]
async fn non_success_status_becomes_api_error() {
    let (addr, _log) = start_server().await;
    let mailer = ResendMailer::new(client(), format!("http://{addr}/broken"), "k");

    let err = mailer
        .send(&OutboundEmail {
            from: "a@b.c".to_string(),
            to: "d@e.f".to_string(),
            subject: "s".to_string(),
            html: "h".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        NotifyError::Api { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("upstream down"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let (addr, _log) = start_server().await;
    let client = HttpsClient::new(Duration::from_millis(200)).unwrap();

    let err = client
        .post_json(&format!("http://{addr}/slow"), None, &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Timeout(_)));
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client()
        .post_json(&format!("http://{addr}/x"), None, &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Connect { .. }));
}

#[tokio::test]
async fn telegram_bot_methods() {
    let (addr, log) = start_server().await;
    let bot = TelegramBot::new(client(), &format!("http://{addr}"), "123:abc");

    bot.send_text(42, "hello", ParseMode::Plain).await.unwrap();
    bot.send_with_cancel_button(42, "*thanks*", "Cancel")
        .await
        .unwrap();
    bot.send_web_app_link(42, "open", "https://rsvp.example.com", "Go")
        .await
        .unwrap();
    bot.answer_callback("cb-1").await.unwrap();

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 4);
    assert!(calls[..3].iter().all(|c| c.path == "/bot123:abc/sendMessage"));
    assert_eq!(calls[3].path, "/bot123:abc/answerCallbackQuery");

    assert_eq!(calls[0].body["chat_id"], 42);
    assert!(calls[0].body.get("parse_mode").is_none());

    let cancel = &calls[1].body;
    assert_eq!(cancel["parse_mode"], "Markdown");
    assert_eq!(
        cancel["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
        CANCEL_CALLBACK
    );

    assert_eq!(
        calls[2].body["reply_markup"]["inline_keyboard"][0][0]["web_app"]["url"],
        "https://rsvp.example.com"
    );
    assert_eq!(calls[3].body["callback_query_id"], "cb-1");
    assert!(calls.iter().all(|c| c.auth.is_none()));
}

#[tokio::test]
async fn dispatcher_runs_provider_calls_detached() {
    let (addr, log) = start_server().await;
    let bot = Arc::new(TelegramBot::new(client(), &format!("http://{addr}"), "t"));
    let dispatcher = Dispatcher::new();

    for chat in [1, 2, 3] {
        let bot = Arc::clone(&bot);
        dispatcher.spawn("channel_test", async move {
            bot.send_text(chat, "hi", ParseMode::Plain).await
        });
    }

    assert!(dispatcher.drain(Duration::from_secs(5)).await);
    assert_eq!(log.lock().unwrap().len(), 3);
}
