use crate::error::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Outgoing response. Cookies are collected separately from headers so the
/// wire layer can emit one `Set-Cookie` line per cookie; a `None` value
/// instructs the client to drop the cookie.
#[derive(Debug, Default)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, Option<String>>,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    pub fn body<T: AsRef<str>>(&mut self, body: T) -> &mut Self {
        self.body = body.as_ref().as_bytes().to_vec();
        self
    }

    pub fn body_bytes(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = body;
        self
    }

    pub fn header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        self.headers
            .insert(name.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    pub fn json<T: Serialize>(&mut self, value: &T) -> AppResult<&mut Self> {
        let json_string = serde_json::to_string(value)
            .map_err(|e| AppError::InternalError(format!("JSON serialization error: {}", e)))?;
        self.header("Content-Type", "application/json");
        self.body(json_string);
        Ok(self)
    }

    /// Content-negotiated reply: structured values are serialized as JSON,
    /// plain values go out verbatim as `text/plain`.
    pub fn send(data: Value, code: u16) -> Response {
        let mut response = Response::new(code);
        match data {
            Value::Object(_) | Value::Array(_) => {
                response.header("Content-Type", "application/json");
                response.body(data.to_string());
            }
            Value::String(text) => {
                response.header("Content-Type", "text/plain");
                response.body(text);
            }
            other => {
                response.header("Content-Type", "text/plain");
                response.body(other.to_string());
            }
        }
        response
    }

    pub fn ok<T: Serialize>(data: &T) -> AppResult<Response> {
        let mut response = Response::new(200);
        response.json(data)?;
        Ok(response)
    }

    /// The app's uniform failure payload: `{"errors": [...]}`.
    pub fn errors<S: AsRef<str>>(messages: &[S], code: u16) -> Response {
        let list: Vec<&str> = messages.iter().map(|m| m.as_ref()).collect();
        let mut response = Response::new(code);
        response
            .header("Content-Type", "application/json")
            .body(serde_json::json!({ "errors": list }).to_string());
        response
    }

    pub fn error(err: &AppError) -> Response {
        Response::errors(&err.messages(), err.status_code())
    }

    pub fn text<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response.header("Content-Type", "text/plain").body(content);
        response
    }

    pub fn html<T: AsRef<str>>(content: T) -> Response {
        Response::send_html(content, 200)
    }

    pub fn send_html<T: AsRef<str>>(content: T, code: u16) -> Response {
        let mut response = Response::new(code);
        response.header("Content-Type", "text/html").body(content);
        response
    }

    pub fn redirect(location: &str) -> Response {
        let mut response = Response::new(302);
        response.header("Location", location);
        response
    }

    pub fn permanent_redirect(location: &str) -> Response {
        let mut response = Response::new(301);
        response.header("Location", location);
        response
    }

    /// Queue a cookie for the response; `None` expires it on the client.
    pub fn cookie(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        self.cookies
            .insert(name.to_string(), value.map(str::to_string));
        self
    }

    /// Queue a whole map of cookies at once.
    pub fn set_cookies(&mut self, cookies: HashMap<String, Option<String>>) -> &mut Self {
        self.cookies.extend(cookies);
        self
    }

    /// One `Set-Cookie` header value per pending cookie.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("{}={}; Path=/", name, value),
                None => format!("{}=; Path=/; Max-Age=0", name),
            })
            .collect();
        lines.sort();
        lines
    }
}

#[macro_export]
macro_rules! ok_json {
    ($($json:tt)+) => {{
        let mut response = $crate::http::Response::new(200);
        response.json(&$crate::json!($($json)+))?;
        Ok(response)
    }};
}
