//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::hook::{ErrorNext, Hook, ServerError};

/// An incoming HTTP request with its body already collected.
///
/// The request doubles as the per-request scope: [`extensions`](Request::extensions)
/// carry values such as [`ProblemControls`](crate::ProblemControls) and the
/// error [`Hook`]. Cloning a request shares its hook and cancellation token, so
/// callbacks registered on one clone are seen by every other.
#[derive(Clone, Debug)]
pub struct Request {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Request {
    pub(crate) fn new(mut parts: Parts, body: Bytes, cancel: CancellationToken) -> Self {
        if parts.extensions.get::<Arc<Hook>>().is_none() {
            parts.extensions.insert(Arc::new(Hook::new()));
        }
        Self { parts, body, params: HashMap::new(), cancel }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The request target as received, used as a problem's default `instance`.
    pub fn url(&self) -> String {
        self.parts.uri.to_string()
    }

    /// First value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(crate::headers::as_str)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Fires when the client goes away. Streaming responses stop on it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The request's server-error hook.
    pub fn hook(&self) -> Arc<Hook> {
        match self.parts.extensions.get::<Arc<Hook>>() {
            Some(hook) => Arc::clone(hook),
            // Only reachable if a middleware removed the hook; a detached one
            // keeps the write path infallible.
            None => Arc::new(Hook::new()),
        }
    }

    /// Registers a server-error callback on this request's hook.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ServerError, ErrorNext<'_>) + Send + Sync + 'static,
    {
        self.hook().on_error(callback);
    }
}

impl<B: Into<Bytes>> From<http::Request<B>> for Request {
    fn from(request: http::Request<B>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body.into(), CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        Request::from(
            http::Request::get(uri)
                .header("Accept", "application/json")
                .body(r#"{"name":"alice"}"#)
                .unwrap(),
        )
    }

    #[test]
    fn exposes_request_line_and_headers() {
        let req = request("/users/42?full=1");

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.url(), "/users/42?full=1");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.param("id"), None);
    }

    #[test]
    fn decodes_json_body() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
        }

        let user: User = request("/").json().unwrap();
        assert_eq!(user.name, "alice");
    }

    #[test]
    fn clones_share_hook_and_cancellation() {
        let req = request("/");
        let copy = req.clone();

        copy.on_error(|err, next| next.run(err));
        assert_eq!(req.hook().len(), 1);

        copy.cancellation().cancel();
        assert!(req.cancellation().is_cancelled());
    }
}
