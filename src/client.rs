//! Minimal outbound HTTP(S) client for the payment and email providers:
//! form-encoded POST/GET with basic auth, JSON response. HTTP/1.0 framing
//! keeps the reply un-chunked so it can be read to end of stream. No
//! retries and no timeouts anywhere, by design.

use crate::error::{AppError, AppResult};
use base64::Engine;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::Url;

pub struct RequestParams {
    pub url: String,
    pub method: &'static str,
    pub body: Vec<(String, String)>,
    /// `user:password` pair for basic auth.
    pub auth: Option<String>,
}

pub struct ClientResponse {
    pub status: u16,
    pub body: Value,
}

impl ClientResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issue a request and parse the JSON reply.
pub async fn request(params: RequestParams) -> AppResult<ClientResponse> {
    let url = Url::parse(&params.url)
        .map_err(|err| AppError::Upstream(format!("Invalid upstream url: {}", err)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Upstream("Upstream url has no host".to_string()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AppError::Upstream("Upstream url has no port".to_string()))?;

    let body = encode_form(&params.body);
    let wire = build_request(&url, &host, &params, &body);

    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|err| AppError::Upstream(format!("Could not connect to {}: {}", host, err)))?;

    let raw = if url.scheme() == "https" {
        let connector = tls_connector();
        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| AppError::Upstream(format!("Invalid server name \"{}\"", host)))?;
        let mut tls = connector
            .connect(server_name, stream)
            .await
            .map_err(|err| AppError::Upstream(format!("TLS handshake failed: {}", err)))?;
        exchange(&mut tls, wire.as_bytes()).await?
    } else {
        let mut stream = stream;
        exchange(&mut stream, wire.as_bytes()).await?
    };

    parse_response(&raw)
}

fn build_request(url: &Url, host: &str, params: &RequestParams, body: &str) -> String {
    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut request = format!("{} {} HTTP/1.0\r\nHost: {}\r\n", params.method, target, host);
    if let Some(auth) = &params.auth {
        let encoded = base64::engine::general_purpose::STANDARD.encode(auth.as_bytes());
        request += &format!("Authorization: Basic {}\r\n", encoded);
    }
    request += "Content-Type: application/x-www-form-urlencoded\r\n";
    request += &format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
    request
}

fn encode_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn exchange<S>(stream: &mut S, request: &[u8]) -> AppResult<Vec<u8>>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    stream
        .write_all(request)
        .await
        .map_err(|err| AppError::Upstream(format!("Could not send request: {}", err)))?;

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .await
        .map_err(|err| AppError::Upstream(format!("Could not read response: {}", err)))?;
    Ok(raw)
}

fn parse_response(raw: &[u8]) -> AppResult<ClientResponse> {
    let separator = b"\r\n\r\n";
    let split = raw
        .windows(separator.len())
        .position(|window| window == separator)
        .ok_or_else(|| AppError::Upstream("Malformed upstream response".to_string()))?;

    let head = String::from_utf8_lossy(&raw[..split]);
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| AppError::Upstream("Malformed upstream status line".to_string()))?;

    let body_bytes = &raw[split + separator.len()..];
    let body = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body_bytes).unwrap_or(Value::Null)
    };

    Ok(ClientResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_encoding_escapes_values() {
        let encoded = encode_form(&[
            ("amount".to_string(), "250".to_string()),
            ("description".to_string(), "pizza & delivery".to_string()),
        ]);
        assert_eq!(encoded, "amount=250&description=pizza%20%26%20delivery");
    }

    #[test]
    fn builds_a_complete_request() {
        let url = Url::parse("https://api.stripe.com/v1/charges").unwrap();
        let params = RequestParams {
            url: url.to_string(),
            method: "POST",
            body: vec![("amount".to_string(), "250".to_string())],
            auth: Some("sk_test:".to_string()),
        };
        let wire = build_request(&url, "api.stripe.com", &params, "amount=250");

        assert!(wire.starts_with("POST /v1/charges HTTP/1.0\r\n"));
        assert!(wire.contains("Host: api.stripe.com\r\n"));
        assert!(wire.contains("Authorization: Basic "));
        assert!(wire.ends_with("Content-Length: 10\r\n\r\namount=250"));
    }

    #[test]
    fn parses_status_and_json_body() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n{\"id\":\"ch_1\"}";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body["id"], "ch_1");
    }

    #[test]
    fn non_json_body_reads_as_null() {
        let raw = b"HTTP/1.0 502 Bad Gateway\r\n\r\nupstream down";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, 502);
        assert!(!response.is_success());
        assert_eq!(response.body, Value::Null);
    }

    #[test]
    fn garbage_is_a_contained_upstream_error() {
        assert!(parse_response(b"not http").is_err());
    }
}
