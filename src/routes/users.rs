//! Admin-only account management, mounted at `/users`.

use crate::handler::HttpResponse;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, RequireAdmin};
use crate::middlewares;
use crate::modules::users::Users;
use crate::modules::Services;
use crate::routes::{body_str, services, EMAIL_RE};
use crate::validation::{Rule, Validation};
use crate::router::Router;
use serde_json::Value;

pub fn router(services: &Services) -> Router {
    let verify = services.tokens.verify();
    let mut router = Router::new();

    router.get("/", middlewares!(verify.clone(), RequireAdmin, list));
    router.post(
        "/",
        middlewares!(
            verify.clone(),
            RequireAdmin,
            Validation::new(vec![
                ("firstName", Rule::string().required()),
                ("lastName", Rule::string().required()),
                ("email", Rule::string().pattern(&EMAIL_RE).required()),
                ("address", Rule::string().required()),
                ("password", Rule::string().min(6.0).required()),
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
                ("email", Rule::string().pattern(&EMAIL_RE).required()),
                ("firstName", Rule::string()),
                ("lastName", Rule::string()),
                ("address", Rule::string()),
                ("password", Rule::string().min(6.0)),
            ]),
            update
        ),
    );
    router.delete("/", middlewares!(verify, RequireAdmin, remove));

    router
}

async fn list(req: Request) -> HttpResponse {
    let services = services(&req)?;
    let users: Vec<Value> = services
        .users
        .find()
        .await?
        .iter()
        .map(Users::sanitize)
        .collect();
    Ok(Response::send(Value::Array(users), 200))
}

async fn create(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let user = services.users.create(req.body.clone()).await?;
    Ok(Response::send(Users::sanitize(&user), 200))
}

async fn update(req: Request) -> HttpResponse {
    let errors = req.errors();
    if !errors.is_empty() {
        return Ok(Response::errors(&errors, 422));
    }

    let services = services(&req)?;
    let email = body_str(&req, "email")
        .unwrap_or_default();
    let user = services.users.update(&email, req.body.clone()).await?;
    Ok(Response::send(Users::sanitize(&user), 200))
}

async fn remove(req: Request) -> HttpResponse {
    let email = match req.query.get("email") {
        Some(email) => email.clone(),
        None => return Ok(Response::errors(&["The field \"email\" is required"], 422)),
    };

    let services = services(&req)?;
    services.users.delete(&email).await?;
    services.carts.empty(&email).await?;
    Ok(Response::send(
        serde_json::json!({"message": "The user has been deleted"}),
        200,
    ))
}
