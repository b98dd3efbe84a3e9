//! Bearer tokens and the auth middleware built on them. A token is
//! `{id, email, expires}` with `expires` in unix millis.

use crate::error::{AppError, AppResult};
use crate::helpers::{now_millis, random_string};
use crate::http::{Request, Response};
use crate::middleware::{Middleware, MiddlewareResult, Next};
use crate::modules::users::Users;
use crate::store::Store;
use serde_json::{json, Value};
use std::path::Path;

pub const UNAUTHORIZED: &str = "You are not authorized for this resource";

const TOKEN_ID_LEN: usize = 20;

#[derive(Clone)]
pub struct Tokens {
    store: Store,
    users: Users,
    expiration_ms: u64,
}

impl Tokens {
    pub fn new(base: &Path, users: Users, expiration_ms: u64) -> Self {
        Self {
            store: Store::new(base, "tokens", "id"),
            users,
            expiration_ms,
        }
    }

    /// Issue a token for valid credentials.
    pub async fn create(&self, email: &str, password: &str) -> AppResult<Value> {
        let user = self
            .users
            .find_one(email)
            .await?
            .ok_or_else(|| AppError::Auth("Could not find the specified user".to_string()))?;

        if !self.users.verify_password(&user, password) {
            return Err(AppError::Auth(
                "The password did not match the specified user's stored password".to_string(),
            ));
        }

        self.store
            .create(json!({
                "id": random_string(TOKEN_ID_LEN),
                "email": email,
                "expires": now_millis() + self.expiration_ms,
            }))
            .await
    }

    pub async fn find_one(&self, id: &str) -> AppResult<Option<Value>> {
        self.store.find_one(id).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(id).await
    }

    /// Resolve a token id to its record and owning user; any hole in the
    /// chain reads as unauthorized.
    pub async fn verify_id(&self, id: &str) -> AppResult<(Value, Value)> {
        let unauthorized = || AppError::Auth(UNAUTHORIZED.to_string());

        let token = self.find_one(id).await?.ok_or_else(unauthorized)?;
        if is_expired(&token) {
            return Err(unauthorized());
        }

        let email = token
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(unauthorized)?;
        let user = self.users.find_one(email).await?.ok_or_else(unauthorized)?;

        Ok((token, user))
    }

    /// The auth middleware for token-protected routes.
    pub fn verify(&self) -> Verify {
        Verify {
            tokens: self.clone(),
        }
    }
}

fn is_expired(token: &Value) -> bool {
    token
        .get("expires")
        .and_then(Value::as_u64)
        .map(|expires| expires <= now_millis())
        .unwrap_or(true)
}

/// Accepts the token id from the `token` header, body field, query parameter
/// or cookie, in that order. On success the user and token records are
/// attached to the request; failures answer 401 for JSON clients and send
/// browsers to the error page.
#[derive(Clone)]
pub struct Verify {
    tokens: Tokens,
}

fn token_id(req: &Request) -> Option<String> {
    req.get_header("token")
        .map(str::to_string)
        .or_else(|| {
            req.body
                .get("token")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| req.query.get("token").cloned())
        .or_else(|| req.cookies.get("token").cloned())
}

impl Middleware for Verify {
    fn call(&self, mut req: Request, next: Next) -> MiddlewareResult {
        let tokens = self.tokens.clone();
        Box::pin(async move {
            let verified = match token_id(&req) {
                Some(id) => tokens.verify_id(&id).await.ok(),
                None => None,
            };

            match verified {
                Some((token, user)) => {
                    req.set_data("token", token);
                    req.set_data("user", user);
                    next.handle(req).await
                }
                None if req.is_json() => Ok(Response::errors(&[UNAUTHORIZED], 401)),
                None => Ok(Response::permanent_redirect("/error")),
            }
        })
    }

    fn boxed_clone(&self) -> Box<dyn Middleware> {
        Box::new(self.clone())
    }
}
