//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Middleware is captured per
//! route when the route is registered, so [`Router::layer`] only affects routes
//! added after it, and a [`group`](Router::group) can add middleware without
//! touching its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::Handler;
use crate::middleware::{Endpoint, Middleware, Next, Stack};
use crate::request::Request;
use crate::testing::Recorder;
use crate::writer::ResponseWriter;

struct Route {
    endpoint: Endpoint,
    middleware: Arc<[Arc<dyn Middleware>]>,
}

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Every method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    prefix: String,
    middleware: Stack,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), prefix: String::new(), middleware: Vec::new() }
    }

    /// Registers a handler for a method and path.
    ///
    /// Path parameters use `{name}` syntax and are read with
    /// [`Request::param`]:
    ///
    /// ```rust,no_run
    /// # use tsuki::{Builder, Request, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Builder { Builder::default() }
    /// # async fn create_user(_: Request) -> Builder { Builder::default() }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route or conflicts with one already
    /// registered for the same method.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let path = join(&self.prefix, path);
        let route = Route {
            endpoint: Endpoint::Handler(handler.into_boxed_handler()),
            middleware: self.middleware.clone().into(),
        };

        self.routes
            .entry(method)
            .or_default()
            .insert(path.as_str(), route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::HEAD, path, handler)
    }

    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::OPTIONS, path, handler)
    }

    /// Appends `middleware` to the stack of every route registered from now
    /// on. The first layer added runs first.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers routes under `prefix`. Middleware layered inside `routes`
    /// only applies to the group.
    ///
    /// ```rust,no_run
    /// # use tsuki::{Builder, Request, Router};
    /// # use tsuki::middleware::Logger;
    /// # async fn list(_: Request) -> Builder { Builder::default() }
    /// Router::new().group("/api", |api| api.layer(Logger).get("/users", list));
    /// ```
    pub fn group(self, prefix: &str, routes: impl FnOnce(Router) -> Router) -> Self {
        let prefix = join(&self.prefix, prefix);
        self.nest(prefix, None, routes)
    }

    /// Registers routes with one extra middleware, without a path prefix.
    pub fn with(self, middleware: impl Middleware, routes: impl FnOnce(Router) -> Router) -> Self {
        let prefix = self.prefix.clone();
        self.nest(prefix, Some(Arc::new(middleware)), routes)
    }

    fn nest(
        mut self,
        prefix: String,
        extra: Option<Arc<dyn Middleware>>,
        routes: impl FnOnce(Router) -> Router,
    ) -> Self {
        let mut middleware = self.middleware.clone();
        middleware.extend(extra);

        let child = Router { routes: std::mem::take(&mut self.routes), prefix, middleware };
        self.routes = routes(child).routes;
        self
    }

    /// Whether a route matches `method` and `path`.
    pub fn has(&self, method: &Method, path: &str) -> bool {
        self.lookup(method, path).is_some()
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// Routes `request` and writes the response to `writer`.
    ///
    /// Unmatched requests run through the router's own middleware and resolve
    /// a `404` problem.
    pub async fn dispatch(&self, request: Request, writer: &mut dyn ResponseWriter) {
        match self.lookup(request.method(), request.path()) {
            Some((route, params)) => {
                Next::new(&route.middleware, &route.endpoint)
                    .run(request.with_params(params), writer)
                    .await
            }
            None => Next::new(&self.middleware, &Endpoint::NotFound).run(request, writer).await,
        }
    }

    /// Dispatches `request` in memory and returns what was written.
    pub async fn record<B: Into<bytes::Bytes>>(&self, request: http::Request<B>) -> Recorder {
        let mut rec = Recorder::new();
        self.dispatch(Request::from(request), &mut rec).await;
        rec
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins route segments the way paths nest: `("/api/", "/users")` gives
/// `/api/users`, and a bare `/` under a prefix is the prefix itself.
fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{path}"),
        (false, true) => prefix.to_owned(),
        (false, false) => format!("{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use http::StatusCode;

    async fn ok(_req: Request) -> Builder {
        Builder::new(StatusCode::OK)
    }

    #[test]
    fn joins_prefixes() {
        assert_eq!(join("", "/users"), "/users");
        assert_eq!(join("", ""), "/");
        assert_eq!(join("/api/", "/users"), "/api/users");
        assert_eq!(join("/api", "/"), "/api");
        assert_eq!(join("/api", "v1"), "/api/v1");
    }

    #[test]
    fn has_reports_registered_routes() {
        let router = Router::new()
            .get("/users/{id}", ok)
            .group("/admin", |admin| admin.delete("/users/{id}", ok));

        assert!(router.has(&Method::GET, "/users/7"));
        assert!(router.has(&Method::DELETE, "/admin/users/7"));
        assert!(!router.has(&Method::POST, "/users/7"));
        assert!(!router.has(&Method::GET, "/admin/users/7"));
    }

    #[tokio::test]
    async fn params_reach_the_handler() {
        async fn echo(req: Request) -> Builder {
            Builder::new(StatusCode::OK).text(req.param("id").unwrap_or_default().to_owned())
        }

        let router = Router::new().get("/users/{id}", echo);
        let rec = router.record(http::Request::get("/users/42").body("").unwrap()).await;

        assert_eq!(rec.body_str(), "42");
    }

    #[tokio::test]
    async fn unmatched_routes_are_404_problems() {
        let router = Router::new().get("/", ok);
        let rec = router.record(http::Request::get("/missing").body("").unwrap()).await;

        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
        assert!(rec.body_str().starts_with("404\n\nnot found"));
    }
}
