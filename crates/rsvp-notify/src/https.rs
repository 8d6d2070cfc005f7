//! Minimal JSON-over-HTTPS client for the outbound provider APIs.
//!
//! One connection per request: TCP, then TLS (Mozilla roots) for `https`
//! URLs, then an HTTP/1.1 handshake. Plain `http` URLs skip TLS, which is
//! what local test servers use.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{NotifyError, NotifyResult};

/// Error bodies longer than this are cut before they land in an error.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct HttpsClient {
    tls: Arc<rustls::ClientConfig>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpsClient {
    /// Client trusting the Mozilla root store, with a per-request timeout
    /// covering connect, handshake, and the full response.
    pub fn new(timeout: Duration) -> NotifyResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| NotifyError::Tls(format!("protocol version error: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            tls: Arc::new(config),
            timeout,
        })
    }

    /// POST `body` as JSON and return the response body of a 2xx answer.
    pub async fn post_json<B>(&self, url: &str, bearer: Option<&str>, body: &B) -> NotifyResult<Bytes>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).map_err(|e| NotifyError::Encode(e.to_string()))?;
        let target = Target::parse(url)?;

        match tokio::time::timeout(self.timeout, self.send(&target, bearer, payload)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(host = %target.host, path = %target.path, "request timed out");
                Err(NotifyError::Timeout(self.timeout))
            }
        }
    }

    async fn send(&self, target: &Target, bearer: Option<&str>, payload: Vec<u8>) -> NotifyResult<Bytes> {
        let addr = format!("{}:{}", target.host, target.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| NotifyError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let _ = stream.set_nodelay(true);

        let mut builder = http::Request::builder()
            .method("POST")
            .uri(target.path.as_str())
            .header(HOST, target.authority())
            .header(USER_AGENT, concat!("rsvpd/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if target.tls {
            let server_name = ServerName::try_from(target.host.as_str())
                .map_err(|e| NotifyError::Tls(format!("invalid server name '{}': {e}", target.host)))?
                .to_owned();
            let tls_stream = TlsConnector::from(Arc::clone(&self.tls))
                .connect(server_name, stream)
                .await
                .map_err(|e| NotifyError::Tls(e.to_string()))?;
            exchange(tls_stream, request).await
        } else {
            exchange(stream, request).await
        }
    }
}

async fn exchange<S>(io: S, request: http::Request<Full<Bytes>>) -> NotifyResult<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| NotifyError::Http(format!("handshake: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| NotifyError::Http(e.to_string()))?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| NotifyError::Http(format!("read body: {e}")))?
        .to_bytes();

    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(NotifyError::Api {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        });
    }
    Ok(body)
}

/// Where a request goes, split out of its URL.
#[derive(Debug, PartialEq)]
struct Target {
    tls: bool,
    host: String,
    port: u16,
    path: String,
}

impl Target {
    fn parse(url: &str) -> NotifyResult<Self> {
        let invalid = |reason: &str| NotifyError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme")),
        };
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            tls,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            path,
        })
    }

    fn authority(&self) -> String {
        let default = if self.tls { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_https_defaults() {
        let t = Target::parse("https://api.resend.com/emails").unwrap();
        assert_eq!(
            t,
            Target {
                tls: true,
                host: "api.resend.com".to_string(),
                port: 443,
                path: "/emails".to_string(),
            }
        );
        assert_eq!(t.authority(), "api.resend.com");
    }

    #[test]
    fn parse_plain_http_with_port_and_query() {
        let t = Target::parse("http://127.0.0.1:8081/bot123/sendMessage?x=1").unwrap();
        assert!(!t.tls);
        assert_eq!(t.port, 8081);
        assert_eq!(t.path, "/bot123/sendMessage?x=1");
        assert_eq!(t.authority(), "127.0.0.1:8081");
    }

    #[test]
    fn parse_rejects_bad_urls() {
        for url in ["api.resend.com/emails", "ftp://host/x", "https://", "not a url"] {
            assert!(
                matches!(Target::parse(url), Err(NotifyError::InvalidUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn client_builds_with_mozilla_roots() {
        let client = HttpsClient::new(Duration::from_secs(5)).unwrap();
        assert!(format!("{client:?}").contains("timeout"));
    }
}
