//! The authenticated user's shopping cart, mounted at `/carts`.

use crate::handler::HttpResponse;
use crate::http::{Request, Response};
use crate::middleware::Middleware;
use crate::middlewares;
use crate::modules::Services;
use crate::routes::{body_str, body_u64, services, user_email};
use crate::router::Router;
use crate::validation::{Rule, Validation};
use serde_json::Value;

pub fn router(services: &Services) -> Router {
    let verify = services.tokens.verify();
    let item_rules = || {
        Validation::new(vec![
            ("id", Rule::string().required()),
            ("count", Rule::number().min(1.0).required()),
        ])
    };
    let mut router = Router::new();

    router.get("/", middlewares!(verify.clone(), list));
    router.post("/", middlewares!(verify.clone(), item_rules(), add));
    router.put("/", middlewares!(verify.clone(), item_rules(), update));
    router.delete("/", middlewares!(verify, remove));

    router
}

async fn list(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let items = services.carts.find(&user_email(&req)?).await?;
    Ok(Response::send(Value::Array(items), 200))
}

async fn add(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let id = body_str(&req, "id").unwrap_or_default();
    let count = body_u64(&req, "count").unwrap_or(1);
    let items = services.carts.add(&user_email(&req)?, &id, count).await?;
    Ok(Response::send(Value::Array(items), 200))
}

async fn update(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let id = body_str(&req, "id").unwrap_or_default();
    let count = body_u64(&req, "count").unwrap_or(1);
    let items = services.carts.update(&user_email(&req)?, &id, count).await?;
    Ok(Response::send(Value::Array(items), 200))
}

/// `?id=` removes one item; without it the whole cart is emptied.
async fn remove(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let email = user_email(&req)?;

    match req.query.get("id") {
        Some(id) => {
            let items = services.carts.remove(&email, id).await?;
            Ok(Response::send(Value::Array(items), 200))
        }
        None => {
            services.carts.empty(&email).await?;
            Ok(Response::send(Value::Array(Vec::new()), 200))
        }
    }
}
