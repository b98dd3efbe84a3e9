//! In-process test harness: a fully wired application over a temporary data
//! directory, driven through `Application::process` without opening sockets.

use forno::app::Application;
use forno::config::Config;
use forno::http::{Method, Response};
use forno::modules::Services;
use forno::routes::{self, Views};
use forno::session::SessionStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestApp {
    pub app: Application,
    pub services: Services,
    pub data_dir: PathBuf,
    _data: TempDir,
}

pub fn spawn() -> TestApp {
    let data = TempDir::new().unwrap();
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    let config = Config::staging();
    let services = Services::new(config, data.path());

    let mut app = Application::new(SessionStore::new());
    app.plugin(services.clone());
    app.plugin(Views {
        root: root.join("views"),
    });

    app.mount("", routes::index::router(&services));
    app.mount("/users", routes::users::router(&services));
    app.mount("/pizzas", routes::pizzas::router(&services));
    app.mount("/carts", routes::carts::router(&services));
    app.mount("/orders", routes::orders::router(&services));

    app.static_files(root.join("public"), root.join("views"));

    TestApp {
        app,
        services,
        data_dir: data.path().to_path_buf(),
        _data: data,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        target: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Response {
        let mut headers = HashMap::new();
        let payload = match body {
            Some(body) => {
                headers.insert("content-type".to_string(), "application/json".to_string());
                body.to_string().into_bytes()
            }
            None => {
                // Token-protected endpoints still negotiate on the content
                // type, so API calls without a body declare JSON as well.
                headers.insert("content-type".to_string(), "application/json".to_string());
                Vec::new()
            }
        };
        if let Some(token) = token {
            headers.insert("token".to_string(), token.to_string());
        }

        self.app.process(method, target, headers, &payload).await
    }

    /// A browser-style request: no JSON content type, optional form body and
    /// cookies.
    pub async fn browse(
        &self,
        method: Method,
        target: &str,
        form: Option<&str>,
        cookies: Option<&str>,
    ) -> Response {
        let mut headers = HashMap::new();
        if form.is_some() {
            headers.insert(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            );
        }
        if let Some(cookies) = cookies {
            headers.insert("cookie".to_string(), cookies.to_string());
        }

        self.app
            .process(method, target, headers, form.unwrap_or("").as_bytes())
            .await
    }

    /// Sign up a user through the API and return the issued token id.
    pub async fn sign_up(&self, email: &str) -> String {
        let res = self
            .request(
                Method::POST,
                "/sign-up",
                Some(&json!({
                    "firstName": "Tony",
                    "lastName": "Pepperoni",
                    "email": email,
                    "address": "1 Oven Lane",
                    "password": "hunter22",
                })),
                None,
            )
            .await;
        assert_eq!(res.status, 200, "sign-up failed: {:?}", json_body(&res));
        json_body(&res)["token"]["id"].as_str().unwrap().to_string()
    }

    /// Put a pizza on the menu directly through the service layer.
    pub async fn seed_pizza(&self, name: &str, price_cents: u64) -> String {
        let pizza = self
            .services
            .pizzas
            .create(json!({"name": name, "price": price_cents}))
            .await
            .unwrap();
        pizza["id"].as_str().unwrap().to_string()
    }
}

pub fn json_body(res: &Response) -> Value {
    serde_json::from_slice(&res.body).unwrap_or(Value::Null)
}

pub fn body_text(res: &Response) -> String {
    String::from_utf8_lossy(&res.body).into_owned()
}

pub fn session_cookie(res: &Response) -> String {
    res.cookies
        .get("sessionId")
        .cloned()
        .flatten()
        .expect("response carries no session cookie")
}
