//! Route tables, one feature router per file, mounted onto the application
//! router in `main`. Handlers pull the shared [`Services`] bundle out of the
//! request plugins.

pub mod carts;
pub mod index;
pub mod orders;
pub mod pizzas;
pub mod users;

use crate::error::{AppError, AppResult};
use crate::http::{Request, Response};
use crate::modules::Services;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::path::PathBuf;

lazy_static! {
    pub static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-z0-9_\-+.]+@[a-z0-9]{2,}\.[a-z]{2,}$").unwrap();
}

/// Location of the HTML templates, injected as a plugin next to [`Services`].
#[derive(Clone, Debug)]
pub struct Views {
    pub root: PathBuf,
}

pub(crate) fn services(req: &Request) -> AppResult<Services> {
    req.plugins
        .get::<Services>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("services are not registered".to_string()))
}

pub(crate) fn views(req: &Request) -> AppResult<PathBuf> {
    req.plugins
        .get::<Views>()
        .map(|views| views.root.clone())
        .ok_or_else(|| AppError::InternalError("views are not registered".to_string()))
}

/// The authenticated user attached by the token middleware.
pub(crate) fn current_user(req: &Request) -> AppResult<Value> {
    req.get_data("user")
        .cloned()
        .ok_or_else(|| AppError::Auth(crate::modules::tokens::UNAUTHORIZED.to_string()))
}

pub(crate) fn user_email(req: &Request) -> AppResult<String> {
    current_user(req)?
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::InternalError("user record has no email".to_string()))
}

pub(crate) fn body_str(req: &Request, field: &str) -> Option<String> {
    req.body.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Accept both a JSON number and a form-encoded numeric string.
pub(crate) fn body_u64(req: &Request, field: &str) -> Option<u64> {
    match req.body.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Short-circuit response for collected validation failures: a 422 payload
/// for JSON clients, flash + redirect back to the form for browsers.
pub(crate) fn reject_invalid(req: &Request, back: &str) -> Option<Response> {
    let errors = req.errors();
    if errors.is_empty() {
        return None;
    }
    if req.is_json() {
        return Some(Response::errors(&errors, 422));
    }
    Some(flash_redirect(req, back, errors))
}

/// Stash errors plus the submitted fields (minus the password) in the flash
/// and send the browser back to the form.
pub(crate) fn flash_redirect(req: &Request, to: &str, errors: Vec<String>) -> Response {
    let mut fields = req.body.clone();
    if let Some(map) = fields.as_object_mut() {
        map.remove("password");
    }
    req.session.flash_set(json!({"errors": errors, "fields": fields}));
    Response::permanent_redirect(to)
}
