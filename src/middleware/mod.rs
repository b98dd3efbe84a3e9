//! Middleware pipeline: an ordered chain of handlers, each deciding whether
//! to advance via the [`Next`] continuation. A middleware that replies
//! without calling `next` terminates the chain.

use crate::handler::{BoxedHandler, Handler, HttpResponse};
use crate::http::{Request, Response};
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Instant;

/// Continuation handed to a middleware; invoking it runs the rest of the
/// chain down to the terminal handler.
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        Self {
            inner: Box::new(handler),
        }
    }

    pub(crate) fn from_boxed(inner: BoxedHandler) -> Self {
        Self { inner }
    }

    pub async fn handle(&self, req: Request) -> HttpResponse {
        self.inner.handle(req).await
    }
}

pub type MiddlewareResult = BoxFuture<'static, HttpResponse>;

/// One link of the pipeline: reply directly, or hand the request on through
/// `next` (possibly after mutating it).
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult;

    fn boxed_clone(&self) -> Box<dyn Middleware>;
}

impl Clone for Box<dyn Middleware> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// An ordered list of middlewares plus the machinery to run them.
#[derive(Clone, Default)]
pub(crate) struct Chain {
    links: Vec<Box<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.links.push(Box::new(middleware));
    }

    pub fn extend(&mut self, mut other: Chain) {
        self.links.append(&mut other.links);
    }

    /// Run the chain: walking the links back to front, each one is wrapped
    /// around the continuation built so far, so the first registered link
    /// ends up outermost and runs first.
    pub async fn run(&self, req: Request, terminal: Next) -> HttpResponse {
        let entry = self.links.iter().rev().fold(terminal, |next, link| {
            let link = link.clone();
            Next::new(move |req| link.call(req, next.clone()))
        });
        entry.handle(req).await
    }
}

/// Build a per-route handler chain: `middlewares!(auth, validate, handler)`
/// runs `auth`, then `validate`, then the terminal handler, each step
/// advancing explicitly through its continuation.
#[macro_export]
macro_rules! middlewares {
    ($handler:expr) => {
        $handler
    };

    ($middleware:expr, $($rest:tt)*) => {{
        let middleware = $middleware;
        let next = $crate::middleware::Next::new($crate::middlewares!($($rest)*));
        move |req| middleware.call(req, next.clone())
    }};

    () => {
        compile_error!("The middlewares! macro requires at least one handler")
    };
}

/// Request log line written once the chain finished.
#[derive(Clone)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            let start = Instant::now();
            let path = req.path.clone();
            let method = req.method;
            let res = next.handle(req).await;
            let status = match &res {
                Ok(res) => res.status,
                Err(err) => err.status_code(),
            };
            log::info!(
                "[{}] {:?} {} - {}ms",
                status,
                method,
                path,
                start.elapsed().as_millis()
            );
            res
        })
    }

    fn boxed_clone(&self) -> Box<dyn Middleware> {
        Box::new(Self)
    }
}

/// Gate for admin-only endpoints; expects the auth middleware to have
/// attached the user already.
#[derive(Clone)]
pub struct RequireAdmin;

impl Middleware for RequireAdmin {
    fn call(&self, req: Request, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            let is_admin = req
                .get_data("user")
                .and_then(|user| user.get("admin"))
                .and_then(|flag| flag.as_bool())
                .unwrap_or(false);

            if !is_admin {
                return Ok(Response::errors(
                    &["Only admin can access to this resource"],
                    403,
                ));
            }

            next.handle(req).await
        })
    }

    fn boxed_clone(&self) -> Box<dyn Middleware> {
        Box::new(Self)
    }
}
