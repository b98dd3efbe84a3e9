use crate::error::{AppError, AppResult};
use crate::plugins::Plugins;
use crate::session::Session;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl Method {
    pub fn from_string(s: &str) -> Method {
        match s {
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            _ => Method::GET,
        }
    }

    /// Methods whose body is parsed before dispatch.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Per-request context handed through the middleware chain. Created fresh
/// for every request and dropped once the response is written.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Decoded body: JSON document or form fields as a string map. `Null`
    /// for bodyless requests.
    pub body: Value,
    /// Scratch space the middlewares use to pass values downstream
    /// (authenticated user, token, validation errors).
    pub data: HashMap<String, Value>,
    pub session: Session,
    pub session_id: String,
    pub plugins: Plugins,
}

impl Request {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: HashMap::new(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Value::Null,
            data: HashMap::new(),
            session: Session::new(),
            session_id: String::new(),
            plugins: Plugins::new(),
        }
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Content negotiation: a request declaring a JSON body gets JSON error
    /// payloads; everything else is treated as a browser and gets the
    /// flash-and-redirect flow.
    pub fn is_json(&self) -> bool {
        self.get_header("content-type")
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false)
    }

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set_data<T>(&mut self, key: &str, value: T)
    where
        T: serde::Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), value);
        }
    }

    pub fn get_typed_data<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.to_owned()).ok())
    }

    /// Validation messages collected by the validation middleware.
    pub fn errors(&self) -> Vec<String> {
        self.get_typed_data::<Vec<String>>("errors").unwrap_or_default()
    }
}

/// Decode a request body according to its content type: JSON documents are
/// parsed as-is, anything else is treated as URL-encoded form fields. A
/// malformed JSON body is a contained failure, not a crash.
pub fn parse_body(content_type: &str, data: &[u8]) -> AppResult<Value> {
    if data.is_empty() {
        return Ok(Value::Null);
    }

    if content_type.starts_with("application/json") {
        serde_json::from_slice(data).map_err(|err| AppError::BodyDecode(err.to_string()))
    } else {
        parse_urlencoded(data)
    }
}

fn parse_urlencoded(data: &[u8]) -> AppResult<Value> {
    let text = String::from_utf8_lossy(data).replace('+', " ");
    let mut fields = Map::new();

    for pair in text.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key)
            .map_err(|_| AppError::BodyDecode("invalid form field name".to_string()))?;
        let value = urlencoding::decode(value)
            .map_err(|_| AppError::BodyDecode("invalid form field value".to_string()))?;
        fields.insert(key.into_owned(), Value::String(value.into_owned()));
    }

    Ok(Value::Object(fields))
}

/// Split a raw query string into decoded key/value pairs.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Extract key/value pairs from a raw `Cookie` header.
pub fn parse_cookies(header: Option<&str>) -> HashMap<String, String> {
    header
        .unwrap_or("")
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_cookie_header() {
        let cookies = parse_cookies(Some("sessionId=abc123; token=t0k3n; flag="));
        assert_eq!(cookies.get("sessionId").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("token").map(String::as_str), Some("t0k3n"));
        assert_eq!(cookies.get("flag").map(String::as_str), Some(""));
        assert!(parse_cookies(None).is_empty());
    }

    #[test]
    fn parses_json_body() {
        let body = parse_body("application/json", br#"{"email":"a@bc.com"}"#).unwrap();
        assert_eq!(body, json!({"email": "a@bc.com"}));
    }

    #[test]
    fn malformed_json_is_a_contained_failure() {
        let err = parse_body("application/json", b"{not json").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn non_json_bodies_decode_as_forms() {
        let body = parse_body(
            "application/x-www-form-urlencoded",
            b"email=a%40bc.com&name=Big+Tony",
        )
        .unwrap();
        assert_eq!(body["email"], "a@bc.com");
        assert_eq!(body["name"], "Big Tony");
    }

    #[test]
    fn query_strings_decode() {
        let query = parse_query("id=abc&email=a%40bc.com");
        assert_eq!(query.get("id").map(String::as_str), Some("abc"));
        assert_eq!(query.get("email").map(String::as_str), Some("a@bc.com"));
    }

    #[test]
    fn json_detection_uses_content_type() {
        let mut req = Request::new(Method::POST, "/sign-up");
        assert!(!req.is_json());
        req.headers
            .insert("content-type".to_string(), "application/json".to_string());
        assert!(req.is_json());
    }
}
