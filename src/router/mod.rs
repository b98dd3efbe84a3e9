use crate::handler::{BoxedHandler, HttpResponse};
use crate::http::{Method, Request};
use crate::middleware::{Chain, Middleware, Next};
use std::collections::HashMap;
use std::future::Future;

#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) middlewares: Chain,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    pub async fn handle(&self, req: Request) -> HttpResponse {
        self.middlewares
            .run(req, Next::from_boxed(self.handler.clone()))
            .await
    }
}

/// Exact-path route table: `path → method → handler chain`. Paths carry no
/// pattern or parameter segments by design; matching is string equality
/// after trailing-slash normalization. Populated at startup, read-only
/// while serving.
#[derive(Clone)]
pub struct Router {
    pub(crate) middlewares: Chain,
    pub(crate) routes: HashMap<String, HashMap<Method, Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            middlewares: Chain::new(),
            routes: HashMap::new(),
        }
    }

    pub fn get<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add(Method::GET, path, handler);
        self
    }

    pub fn post<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add(Method::POST, path, handler);
        self
    }

    pub fn put<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add(Method::PUT, path, handler);
        self
    }

    pub fn patch<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add(Method::PATCH, path, handler);
        self
    }

    pub fn delete<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add(Method::DELETE, path, handler);
        self
    }

    /// Register a handler chain for an exact (method, path) pair; a second
    /// registration for the same pair replaces the first.
    fn add<F, Fut>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        let path = Self::normalize(path);
        self.routes.entry(path).or_default().insert(
            method,
            Route {
                middlewares: self.middlewares.clone(),
                handler: Box::new(handler),
            },
        );
    }

    /// True iff a handler chain exists for that exact pair.
    pub fn has_route(&self, method: Method, path: &str) -> bool {
        self.routes
            .get(&Self::normalize(path))
            .map(|methods| methods.contains_key(&method))
            .unwrap_or(false)
    }

    pub(crate) fn route(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes
            .get(&Self::normalize(path))
            .and_then(|methods| methods.get(&method))
    }

    /// Router-wide middleware; applies to routes registered afterwards.
    pub fn middleware(&mut self, middleware: impl Middleware) {
        self.middlewares.push(middleware);
    }

    /// Attach a feature router under a path prefix. Mounted routes inherit
    /// this router's middlewares followed by their own.
    pub fn mount(&mut self, prefix: &str, router: Router) {
        for (key, methods) in router.routes.into_iter() {
            let path = Self::normalize(&(prefix.to_owned() + &key));

            for (method, route) in methods {
                let mut middlewares = self.middlewares.clone();
                middlewares.extend(route.middlewares.clone());

                self.routes.entry(path.clone()).or_default().insert(
                    method,
                    Route {
                        middlewares,
                        handler: route.handler,
                    },
                );
            }
        }
    }

    fn normalize(path: &str) -> String {
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            "/".to_owned()
        } else {
            path.to_owned()
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    #[tokio::test]
    async fn has_route_reflects_registrations() {
        let mut router = Router::new();
        router.get("/pizzas", |_req| async { Ok(Response::text("menu")) });

        assert!(router.has_route(Method::GET, "/pizzas"));
        assert!(router.has_route(Method::GET, "/pizzas/"));
        assert!(!router.has_route(Method::POST, "/pizzas"));
        assert!(!router.has_route(Method::GET, "/orders"));
    }

    #[tokio::test]
    async fn matching_is_exact_without_patterns() {
        let mut router = Router::new();
        router.get("/pizzas", |_req| async { Ok(Response::text("menu")) });

        assert!(!router.has_route(Method::GET, "/pizzas/42"));
        assert!(!router.has_route(Method::GET, "/pizza"));
    }

    #[tokio::test]
    async fn re_registration_replaces_the_chain() {
        let mut router = Router::new();
        router.get("/", |_req| async { Ok(Response::text("old")) });
        router.get("/", |_req| async { Ok(Response::text("new")) });

        let route = router.route(Method::GET, "/").unwrap();
        let res = route.handle(Request::new(Method::GET, "/")).await.unwrap();
        assert_eq!(res.body, b"new");
    }

    #[tokio::test]
    async fn mounting_prefixes_paths() {
        let mut feature = Router::new();
        feature.get("/", |_req| async { Ok(Response::text("list")) });
        feature.post("/pay", |_req| async { Ok(Response::text("paid")) });

        let mut root = Router::new();
        root.mount("/orders", feature);

        assert!(root.has_route(Method::GET, "/orders"));
        assert!(root.has_route(Method::POST, "/orders/pay"));
        assert!(!root.has_route(Method::GET, "/"));
    }

    #[tokio::test]
    async fn mounting_at_root_keeps_index_path() {
        let mut feature = Router::new();
        feature.get("/", |_req| async { Ok(Response::text("home")) });

        let mut root = Router::new();
        root.mount("", feature);

        assert!(root.has_route(Method::GET, "/"));
    }
}
