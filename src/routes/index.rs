//! HTML pages and the account/auth endpoints, mounted at the root. Every
//! endpoint is content-negotiated: a JSON request gets JSON, anything else
//! is treated as a browser form and gets the flash-and-redirect flow.

use crate::handler::HttpResponse;
use crate::http::{Request, Response};
use crate::middleware::Middleware;
use crate::middlewares;
use crate::modules::users::Users;
use crate::modules::Services;
use crate::routes::{
    body_str, current_user, flash_redirect, reject_invalid, services, user_email, views, EMAIL_RE,
};
use crate::router::Router;
use crate::template;
use crate::validation::{Rule, Validation};
use serde_json::{json, Value};

pub fn router(services: &Services) -> Router {
    let verify = services.tokens.verify();
    let sign_up_rules = Validation::new(vec![
        ("firstName", Rule::string().required()),
        ("lastName", Rule::string().required()),
        ("email", Rule::string().pattern(&EMAIL_RE).required()),
        ("address", Rule::string().required()),
        ("password", Rule::string().min(6.0).required()),
    ]);
    let sign_in_rules = Validation::new(vec![
        ("email", Rule::string().pattern(&EMAIL_RE).required()),
        ("password", Rule::string().required()),
    ]);
    let me_rules = || {
        Validation::new(vec![
            ("firstName", Rule::string()),
            ("lastName", Rule::string()),
            ("address", Rule::string()),
            ("password", Rule::string().min(6.0)),
        ])
    };

    let mut router = Router::new();

    router.get("/", home);
    router.get("/sign-up", sign_up_page);
    router.get("/sign-in", sign_in_page);
    router.get("/error", error_page);
    router.get("/logout", logout_page);
    router.get("/profile", middlewares!(verify.clone(), profile_page));

    router.post("/sign-up", middlewares!(sign_up_rules, sign_up));
    router.post("/sign-in", middlewares!(sign_in_rules, sign_in));
    router.delete("/logout", middlewares!(verify.clone(), logout));
    router.get("/me", middlewares!(verify.clone(), me));
    router.put("/me", middlewares!(verify.clone(), me_rules(), update_me));
    router.post("/me", middlewares!(verify, me_rules(), update_me));

    router
}

/// Base page data: title, flashed errors, echoed form fields. Form fields
/// are seeded empty so the template never leaks raw placeholders.
fn page_data(title: &str, req: &Request, fields: &[&str]) -> Value {
    let mut data = json!({"title": title, "errors": ""});
    for field in fields {
        data[*field] = Value::String(String::new());
    }

    if let Some(flash) = req.session.flash_get() {
        if let Some(errors) = flash.get("errors").and_then(Value::as_array) {
            let joined = errors
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("<br>");
            data["errors"] = Value::String(joined);
        }
        if let Some(saved) = flash.get("fields").and_then(Value::as_object) {
            for (key, value) in saved {
                if value.is_string() {
                    data[key.as_str()] = value.clone();
                }
            }
        }
    }

    data
}

fn display_pizza(pizza: &Value) -> Value {
    let cents = pizza.get("price").and_then(Value::as_u64).unwrap_or(0);
    json!({
        "id": pizza.get("id").cloned().unwrap_or(Value::Null),
        "name": pizza.get("name").cloned().unwrap_or(Value::Null),
        "price": format!("{:.2}", cents as f64 / 100.0),
    })
}

async fn home(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let views = views(&req)?;

    let pizzas: Vec<Value> = services
        .pizzas
        .find()
        .await?
        .iter()
        .map(display_pizza)
        .collect();

    let mut data = page_data("Menu", &req, &[]);
    data["pizzas"] = Value::Array(pizzas);

    let html = template::render(&views, "index.html", &data).await?;
    Ok(Response::html(html))
}

async fn sign_up_page(req: Request) -> HttpResponse {
    let views = views(&req)?;
    let data = page_data(
        "Create your account",
        &req,
        &["firstName", "lastName", "email", "address"],
    );
    let html = template::render(&views, "sign-up.html", &data).await?;
    Ok(Response::html(html))
}

async fn sign_in_page(req: Request) -> HttpResponse {
    let views = views(&req)?;
    let data = page_data("Sign in", &req, &["email"]);
    let html = template::render(&views, "sign-in.html", &data).await?;
    Ok(Response::html(html))
}

async fn error_page(req: Request) -> HttpResponse {
    let views = views(&req)?;
    let mut data = page_data("Something went wrong", &req, &[]);
    if data["errors"] == "" {
        data["errors"] = Value::String("You need to sign in to see this page".to_string());
    }
    let html = template::render(&views, "error.html", &data).await?;
    Ok(Response::html(html))
}

async fn profile_page(req: Request) -> HttpResponse {
    let views = views(&req)?;
    let user = current_user(&req)?;

    let mut data = page_data(
        "Your profile",
        &req,
        &["firstName", "lastName", "email", "address"],
    );
    if let Some(fields) = user.as_object() {
        for key in ["firstName", "lastName", "email", "address"] {
            if let Some(value) = fields.get(key) {
                if data[key] == "" {
                    data[key] = value.clone();
                }
            }
        }
    }

    let html = template::render(&views, "profile.html", &data).await?;
    Ok(Response::html(html))
}

/// Browser logout: drop the token record if the cookie still points at one,
/// clear the cookie and go home.
async fn logout_page(req: Request) -> HttpResponse {
    let services = services(&req)?;
    if let Some(id) = req.cookies.get("token") {
        if let Err(err) = services.tokens.delete(id).await {
            log::debug!("Logout for an unknown token: {}", err);
        }
    }

    let mut res = Response::redirect("/");
    res.cookie("token", None);
    Ok(res)
}

async fn sign_up(req: Request) -> HttpResponse {
    if let Some(res) = reject_invalid(&req, "/sign-up") {
        return Ok(res);
    }

    let services = services(&req)?;
    let password = body_str(&req, "password").unwrap_or_default();
    let email = body_str(&req, "email").unwrap_or_default();

    let user = match services.users.create(req.body.clone()).await {
        Ok(user) => user,
        Err(err) if !req.is_json() => {
            return Ok(flash_redirect(&req, "/sign-up", err.messages()));
        }
        Err(err) => return Err(err),
    };

    let token = services.tokens.create(&email, &password).await?;
    respond_signed_in(&req, &user, &token)
}

async fn sign_in(req: Request) -> HttpResponse {
    if let Some(res) = reject_invalid(&req, "/sign-in") {
        return Ok(res);
    }

    let services = services(&req)?;
    let email = body_str(&req, "email").unwrap_or_default();
    let password = body_str(&req, "password").unwrap_or_default();

    match services.tokens.create(&email, &password).await {
        Ok(token) => {
            let user = services
                .users
                .find_one(&email)
                .await?
                .unwrap_or(Value::Null);
            respond_signed_in(&req, &user, &token)
        }
        Err(err) if !req.is_json() => Ok(flash_redirect(&req, "/sign-in", err.messages())),
        Err(err) => Err(err),
    }
}

fn respond_signed_in(req: &Request, user: &Value, token: &Value) -> HttpResponse {
    let token_id = token.get("id").and_then(Value::as_str).unwrap_or_default();

    if req.is_json() {
        return Ok(Response::send(
            json!({"user": Users::sanitize(user), "token": token}),
            200,
        ));
    }

    let mut res = Response::permanent_redirect("/profile");
    res.cookie("token", Some(token_id));
    Ok(res)
}

/// API logout; the token middleware already resolved the record.
async fn logout(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let id = req
        .get_data("token")
        .and_then(|token| token.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    services.tokens.delete(&id).await?;

    let mut res = Response::send(json!({"message": "You have been logged out"}), 200);
    res.cookie("token", None);
    Ok(res)
}

async fn me(req: Request) -> HttpResponse {
    let user = current_user(&req)?;
    Ok(Response::send(Users::sanitize(&user), 200))
}

async fn update_me(req: Request) -> HttpResponse {
    if let Some(res) = reject_invalid(&req, "/profile") {
        return Ok(res);
    }

    let services = services(&req)?;
    let email = user_email(&req)?;

    // The account email is the record key and cannot be changed here.
    let mut params = req.body.clone();
    if let Some(fields) = params.as_object_mut() {
        fields.remove("email");
        fields.remove("admin");
        fields.remove("orders");
        // An empty form field means "leave it alone".
        fields.retain(|_, value| value.as_str().map(|s| !s.is_empty()).unwrap_or(true));
    }

    let user = services.users.update(&email, params).await?;

    if req.is_json() {
        return Ok(Response::send(Users::sanitize(&user), 200));
    }
    Ok(Response::permanent_redirect("/profile"))
}
