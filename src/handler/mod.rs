//! The terminal end of a route chain. Any cloneable closure that maps a
//! [`Request`] to a response future is a [`Handler`]; boxing it erases the
//! concrete closure type so routes and continuations can store it.

use crate::error::AppResult;
use crate::http::{Request, Response};
use futures::future::BoxFuture;
use std::future::Future;

pub type HttpResponse = AppResult<Response>;

/// Type-erased handler, cloneable through [`Handler::boxed_clone`].
pub type BoxedHandler = Box<dyn Handler>;

pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse>;

    fn boxed_clone(&self) -> BoxedHandler;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse> {
        Box::pin(self(req))
    }

    fn boxed_clone(&self) -> BoxedHandler {
        Box::new(self.clone())
    }
}

impl Clone for BoxedHandler {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}
