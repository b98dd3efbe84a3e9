//! The server: a TCP accept loop (plain or TLS), a hand-rolled HTTP/1.1
//! request parser, and the dispatch pipeline turning a parsed request into
//! a [`Response`]. Dispatch is exposed as [`Application::process`] so the
//! whole pipeline can be driven in-process by tests.

use crate::error::{AppError, AppResult};
use crate::http::request::{parse_body, parse_cookies, parse_query};
use crate::http::{Method, Request, Response};
use crate::middleware::Middleware;
use crate::plugins::Plugins;
use crate::router::Router;
use crate::session::SessionStore;
use crate::static_files::StaticFiles;
use futures::FutureExt;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const MAX_HEAD_BYTES: usize = 64 * 1024;
const NOT_FOUND_BODY: &str = "Not Found\n";
const PANIC_BODY: &str = "Something went wrong\n";

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone)]
pub struct Application {
    router: Router,
    plugins: Plugins,
    sessions: SessionStore,
    static_files: Option<StaticFiles>,
}

impl Application {
    pub fn new(sessions: SessionStore) -> Self {
        Self {
            router: Router::new(),
            plugins: Plugins::new(),
            sessions,
            static_files: None,
        }
    }

    /// Register a shared service; available as `req.plugins.get::<T>()`.
    /// Must happen before the server starts accepting connections.
    pub fn plugin<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.plugins.insert(value);
        self
    }

    /// Application-wide middleware, applied to every route mounted later.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.router.middleware(middleware);
        self
    }

    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.router.mount(prefix, router);
        self
    }

    /// Serve unmatched GET requests from `root`; the 404 page is rendered
    /// out of `views`.
    pub fn static_files<P: AsRef<Path>>(&mut self, root: P, views: P) -> &mut Self {
        self.static_files = Some(StaticFiles::new(root, views));
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn listen(self, port: u16) -> AppResult<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        log::info!("Listening on port {}", port);

        let app = Arc::new(self);
        loop {
            let (stream, _addr) = listener.accept().await?;
            let app = app.clone();
            tokio::spawn(async move {
                handle_connection(app, stream).await;
            });
        }
    }

    pub async fn listen_tls(self, port: u16, tls: TlsConfig) -> AppResult<()> {
        let acceptor = tls_acceptor(&tls)?;
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        log::info!("Listening on port {} (TLS)", port);

        let app = Arc::new(self);
        loop {
            let (stream, _addr) = listener.accept().await?;
            let app = app.clone();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                match acceptor.accept(stream).await {
                    Ok(stream) => handle_connection(app, stream).await,
                    Err(err) => log::debug!("TLS handshake failed: {}", err),
                }
            });
        }
    }

    /// The dispatch pipeline: cookies, session, body, route or static file.
    /// The resolved session id is always set back as a cookie.
    pub async fn process(
        &self,
        method: Method,
        target: &str,
        headers: HashMap<String, String>,
        body: &[u8],
    ) -> Response {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let cookies = parse_cookies(headers.get("cookie").map(String::as_str));
        let (session_id, session, _created) = self
            .sessions
            .get_or_create(cookies.get("sessionId").map(String::as_str));

        let parsed_body = if method.has_body() {
            let content_type = headers.get("content-type").map(String::as_str).unwrap_or("");
            match parse_body(content_type, body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    let mut response = Response::error(&err);
                    response.cookie("sessionId", Some(&session_id));
                    return response;
                }
            }
        } else {
            serde_json::Value::Null
        };

        let mut req = Request::new(method, path);
        req.query = parse_query(query);
        req.cookies = cookies;
        req.headers = headers;
        req.body = parsed_body;
        req.session = session;
        req.session_id = session_id.clone();
        req.plugins = self.plugins.clone();

        let mut response = self.dispatch(req).await;
        response.cookie("sessionId", Some(&session_id));
        response
    }

    async fn dispatch(&self, req: Request) -> Response {
        let method = req.method;
        let path = req.path.clone();

        if let Some(route) = self.router.route(method, &path) {
            let route = route.clone();
            return match AssertUnwindSafe(route.handle(req)).catch_unwind().await {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    if err.status_code() >= 500 {
                        log::error!("{:?} {} failed: {}", method, path, err);
                    }
                    Response::error(&err)
                }
                Err(panic) => {
                    log::error!("{:?} {} panicked: {}", method, path, panic_message(&panic));
                    Response::send(serde_json::Value::String(PANIC_BODY.to_string()), 500)
                }
            };
        }

        if method == Method::GET {
            if let Some(static_files) = &self.static_files {
                return static_files.serve(&path).await;
            }
        }

        Response::send(serde_json::Value::String(NOT_FOUND_BODY.to_string()), 404)
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn tls_acceptor(tls: &TlsConfig) -> AppResult<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(&tls.cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(&tls.key_path)?))?
        .ok_or_else(|| AppError::InternalError("no private key in key file".to_string()))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| AppError::InternalError(format!("invalid TLS material: {}", err)))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

async fn handle_connection<S>(app: Arc<Application>, mut stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match read_request(&mut stream).await {
        Ok(Some((method, target, headers, body))) => {
            let response = app.process(method, &target, headers, &body).await;
            if let Err(err) = write_response(&mut stream, &response).await {
                log::debug!("Could not write response: {}", err);
            }
        }
        // Connection closed before a full request arrived.
        Ok(None) => {}
        Err(err) => log::debug!("Could not read request: {}", err),
    }
}

type ParsedRequest = (Method, String, HashMap<String, String>, Vec<u8>);

async fn read_request<S>(stream: &mut S) -> io::Result<Option<ParsedRequest>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = Method::from_string(parts.next().unwrap_or("GET"));
    let target = parts.next().unwrap_or("/").to_string();

    // Header names are case-insensitive; normalize to lowercase once.
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some((method, target, headers, body)))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn write_response<S>(stream: &mut S, response: &Response) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason(response.status)
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    for cookie in response.set_cookie_headers() {
        head.push_str(&format!("Set-Cookie: {}\r\n", cookie));
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app() -> Application {
        Application::new(SessionStore::new())
    }

    #[tokio::test]
    async fn matched_route_runs_its_handler() {
        let mut app = app();
        let mut router = Router::new();
        router.get("/ping", |_req| async { Ok(Response::text("pong")) });
        app.mount("", router);

        let res = app
            .process(Method::GET, "/ping", HashMap::new(), b"")
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, b"pong");
    }

    #[tokio::test]
    async fn every_response_carries_the_session_cookie() {
        let app = app();
        let res = app.process(Method::GET, "/", HashMap::new(), b"").await;

        let cookie = res.cookies.get("sessionId").cloned().flatten().unwrap();
        assert_eq!(cookie.len(), 20);
    }

    #[tokio::test]
    async fn known_session_cookie_is_echoed_back() {
        let app = app();
        let first = app.process(Method::GET, "/", HashMap::new(), b"").await;
        let id = first.cookies.get("sessionId").cloned().flatten().unwrap();

        let mut headers = HashMap::new();
        headers.insert("cookie".to_string(), format!("sessionId={}", id));
        let second = app.process(Method::GET, "/", headers, b"").await;

        assert_eq!(second.cookies.get("sessionId").cloned().flatten(), Some(id));
    }

    #[tokio::test]
    async fn unmatched_non_get_is_plain_404() {
        let app = app();
        let res = app
            .process(Method::POST, "/nowhere", HashMap::new(), b"")
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body, NOT_FOUND_BODY.as_bytes());
        assert_eq!(
            res.headers.get("Content-Type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn unmatched_get_without_static_root_is_404() {
        let app = app();
        let res = app.process(Method::GET, "/nowhere", HashMap::new(), b"").await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_contained_400() {
        let mut app = app();
        let mut router = Router::new();
        router.post("/echo", |req: Request| async move {
            Ok(Response::send(req.body, 200))
        });
        app.mount("", router);

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let res = app.process(Method::POST, "/echo", headers, b"{oops").await;

        assert_eq!(res.status, 400);
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert!(body["errors"].is_array());
    }

    #[tokio::test]
    async fn handler_panic_becomes_a_500() {
        let mut app = app();
        let mut router = Router::new();
        router.get("/boom", |_req| async {
            if true {
                panic!("exploded");
            }
            Ok(Response::text(""))
        });
        app.mount("", router);

        let res = app.process(Method::GET, "/boom", HashMap::new(), b"").await;
        assert_eq!(res.status, 500);
        assert_eq!(res.body, PANIC_BODY.as_bytes());
    }

    #[tokio::test]
    async fn handler_error_maps_through_the_error_responder() {
        let mut app = app();
        let mut router = Router::new();
        router.get("/fail", |_req| async {
            Err(AppError::Validation(vec!["bad input".to_string()]))
        });
        app.mount("", router);

        let res = app.process(Method::GET, "/fail", HashMap::new(), b"").await;
        assert_eq!(res.status, 422);
        assert_eq!(res.body, json!({"errors": ["bad input"]}).to_string().as_bytes());
    }

    #[test]
    fn request_parsing_covers_line_headers_and_body() {
        let raw = b"POST /carts?token=t HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"count\": 2}\n";
        let (method, target, headers, body) = futures::executor::block_on(async {
            read_request(&mut &raw[..]).await.unwrap().unwrap()
        });

        assert_eq!(method, Method::POST);
        assert_eq!(target, "/carts?token=t");
        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(body, b"{\"count\": 2}\n");
    }

    #[tokio::test]
    async fn responses_serialize_with_one_set_cookie_line_each() {
        let mut response = Response::text("ok");
        response.cookie("sessionId", Some("abc"));
        response.cookie("token", None);

        let mut wire = Vec::new();
        write_response(&mut wire, &response).await.unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(text.matches("Set-Cookie:").count(), 2);
        assert!(text.contains("Set-Cookie: sessionId=abc; Path=/\r\n"));
        assert!(text.contains("Set-Cookie: token=; Path=/; Max-Age=0\r\n"));
        assert!(text.ends_with("\r\n\r\nok"));
    }
}
