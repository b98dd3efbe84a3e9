//! The menu API, mounted at `/pizzas`. Reading takes a token; writing takes
//! an admin.

use crate::handler::HttpResponse;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, RequireAdmin};
use crate::middlewares;
use crate::modules::Services;
use crate::routes::{body_str, services};
use crate::router::Router;
use crate::validation::{Rule, Validation};
use serde_json::Value;

pub fn router(services: &Services) -> Router {
    let verify = services.tokens.verify();
    let mut router = Router::new();

    router.get("/", middlewares!(verify.clone(), list));
    router.post(
        "/",
        middlewares!(
            verify.clone(),
            RequireAdmin,
            Validation::new(vec![
                ("name", Rule::string().required()),
                ("price", Rule::number().min(1.0).required()),
            ]),
            create
        ),
    );
    router.put(
        "/",
        middlewares!(
            verify.clone(),
            RequireAdmin,
            Validation::new(vec![
                ("id", Rule::string().required()),
                ("name", Rule::string()),
                ("price", Rule::number().min(1.0)),
            ]),
            update
        ),
    );
    router.delete("/", middlewares!(verify, RequireAdmin, remove));

    router
}

async fn list(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let pizzas = services.pizzas.find().await?;
    Ok(Response::send(Value::Array(pizzas), 200))
}

async fn create(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let pizza = services.pizzas.create(req.body.clone()).await?;
    Ok(Response::send(pizza, 200))
}

async fn update(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let id = body_str(&req, "id").unwrap_or_default();
    let pizza = services.pizzas.update(&id, req.body.clone()).await?;
    Ok(Response::send(pizza, 200))
}

async fn remove(req: Request) -> HttpResponse {
    let id = match req.query.get("id") {
        Some(id) => id.clone(),
        None => return Ok(Response::errors(&["The field \"id\" is required"], 422)),
    };

    let services = services(&req)?;
    services.pizzas.delete(&id).await?;
    Ok(Response::send(
        serde_json::json!({"message": "The pizza has been deleted"}),
        200,
    ))
}
