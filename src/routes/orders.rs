//! Checkout and payment, mounted at `/orders`.

use crate::handler::HttpResponse;
use crate::http::{Request, Response};
use crate::middleware::Middleware;
use crate::middlewares;
use crate::modules::Services;
use crate::routes::{body_str, current_user, services};
use crate::router::Router;
use crate::validation::{Rule, Validation};
use serde_json::Value;

pub fn router(services: &Services) -> Router {
    let verify = services.tokens.verify();
    let pay_rules = || {
        Validation::new(vec![
            ("id", Rule::string().required()),
            ("source", Rule::string().required()),
        ])
    };
    let mut router = Router::new();

    router.get("/", middlewares!(verify.clone(), list));
    router.post("/", middlewares!(verify.clone(), create));
    // Forms cannot PUT, so payment answers both verbs.
    router.put("/pay", middlewares!(verify.clone(), pay_rules(), pay));
    router.post("/pay", middlewares!(verify, pay_rules(), pay));

    router
}

/// `?id=` returns a single order, otherwise the full history.
async fn list(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let user = current_user(&req)?;

    match req.query.get("id") {
        Some(id) => match services.orders.find_one(&user, id).await? {
            Some(order) => Ok(Response::send(order, 200)),
            None => Ok(Response::errors(&["The specified order does not exist"], 404)),
        },
        None => {
            let orders = services.orders.find(&user).await?;
            Ok(Response::send(Value::Array(orders), 200))
        }
    }
}

async fn create(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let user = current_user(&req)?;
    let order = services.orders.create(&user).await?;
    Ok(Response::send(order, 200))
}

async fn pay(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let user = current_user(&req)?;
    let id = body_str(&req, "id").unwrap_or_default();
    let source = body_str(&req, "source").unwrap_or_default();

    let order = services.orders.pay(&user, &id, &source).await?;
    Ok(Response::send(order, 200))
}
