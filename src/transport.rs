//! Outbound HTTP transport.
//!
//! Request construction is pure and fully testable; the wire call
//! itself sits behind the [`Transport`] trait so tests can substitute
//! a recording implementation.

use async_trait::async_trait;
use base64::Engine as _;

use crate::error::{ConfigError, TransportError};
use crate::signing::{signature_header_value, SIGNATURE_HEADER};
use crate::types::{AuthScheme, Endpoint, HttpMethod};

/// A fully built outgoing webhook request.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: std::time::Duration,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response metadata for a settled HTTP call.
///
/// Bodies are never parsed; only the status matters for the outcome.
#[derive(Debug, Clone, Copy)]
pub struct TransportResponse {
    pub status: u16,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The wire seam. `Ok` means an HTTP response was received, whatever
/// its status; `Err` means the request never settled (timeout,
/// connection failure, DNS).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<TransportResponse, TransportError>;
}

/// Build the outgoing request for one delivery.
///
/// The body bytes are serialized once by the caller and reused across
/// retries, so the signature computed here stays valid for resends.
pub fn build_request(
    endpoint: &Endpoint,
    body: Vec<u8>,
    user_agent: &str,
) -> Result<WebhookRequest, ConfigError> {
    let parsed = url::Url::parse(&endpoint.url)
        .map_err(|err| ConfigError::Url(format!("{}: {err}", endpoint.url)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Url(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    for (name, value) in &endpoint.headers {
        headers.push((name.clone(), value.clone()));
    }

    match &endpoint.auth {
        AuthScheme::None => {}
        AuthScheme::Bearer { token } => {
            headers.push(("Authorization".into(), format!("Bearer {token}")));
        }
        AuthScheme::Basic { username, password } => {
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{username}:{password}"));
            headers.push(("Authorization".into(), format!("Basic {credentials}")));
        }
        AuthScheme::ApiKey { header, key } => {
            headers.push((header.clone(), key.clone()));
        }
        AuthScheme::Custom {
            headers: custom_headers,
        } => {
            for (name, value) in custom_headers {
                headers.push((name.clone(), value.clone()));
            }
        }
    }

    if let Some(secret) = &endpoint.secret {
        headers.push((SIGNATURE_HEADER.into(), signature_header_value(secret, &body)));
    }

    headers.push(("Content-Type".into(), "application/json".into()));
    headers.push(("User-Agent".into(), user_agent.into()));

    for (name, value) in &headers {
        validate_header(name, value)?;
    }

    Ok(WebhookRequest {
        method: endpoint.method,
        url: endpoint.url.clone(),
        headers,
        body,
        timeout: endpoint.timeout,
    })
}

fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    let name_ok = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !name_ok {
        return Err(ConfigError::Header(format!("invalid header name: {name:?}")));
    }
    if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(ConfigError::Header(format!(
            "control character in value of {name}"
        )));
    }
    Ok(())
}

/// Real HTTP delivery via `reqwest` with a shared client.
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http")]
impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WebhookRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout)
            .body(request.body.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::debug!(url = %request.url, status, "webhook request settled");
                Ok(TransportResponse { status })
            }
            Err(err) if err.is_timeout() => Err(TransportError::Timeout),
            Err(err) => Err(TransportError::Network(err.to_string())),
        }
    }
}
