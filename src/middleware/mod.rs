//! Middleware layer.
//!
//! Middleware wraps the transport-level handling of a request: it receives the
//! request, the [`ResponseWriter`] and a [`Next`] continuation, and decides
//! whether (and with which request) the rest of the chain runs.
//!
//! ```text
//! Router::layer(a).layer(b)
//!
//! request ─▶ a ─next─▶ b ─next─▶ handler ─▶ resolve ─▶ writer
//! ```
//!
//! Because the writer is shared, a middleware can also answer on its own by
//! resolving a reply instead of calling `next`, which is how [`Authorize`],
//! [`Validate`] and [`Check`] reject requests.
//!
//! Built-in middleware:
//! - [`Recover`]: turns handler panics into a `500` problem
//! - [`Logger`]: logs every server error through `tracing`
//! - [`Problems`]: installs [`ProblemControls`](crate::ProblemControls) for the request
//! - [`Authorize`]: `403` problem when an [`Authorizer`] rejects the request
//! - [`Validate`]: `422` problem when a [`Validator`] rejects the request
//! - [`Check`]: both of the above in one step
//! - [`Transform`]: passes on the request a [`Transformer`] returns, or a `422`
//!   problem when it fails

mod authorize;
mod check;
mod logger;
mod problems;
mod recover;
mod transform;
mod validate;

pub use authorize::{Authorize, Authorizer, authorize_with};
pub use check::{Check, check_with};
pub use logger::Logger;
pub use problems::Problems;
pub use recover::Recover;
pub use transform::{Transform, Transformer, transform_with};
pub use validate::{Validate, Validator, validate_with};

use std::sync::Arc;

use http::StatusCode;
use tracing::trace;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::problem::Problem;
use crate::request::Request;
use crate::resolve::resolve;
use crate::writer::ResponseWriter;

/// A request interceptor.
///
/// ```rust
/// use tsuki::middleware::{Middleware, Next};
/// use tsuki::handler::BoxFuture;
/// use tsuki::{Request, ResponseWriter};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle<'a>(
///         &'a self,
///         request: Request,
///         writer: &'a mut dyn ResponseWriter,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, ()> {
///         writer.headers_mut().insert("x-powered-by", http::HeaderValue::from_static("tsuki"));
///         next.run(request, writer)
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()>;
}

/// Shared, ordered middleware list.
pub(crate) type Stack = Vec<Arc<dyn Middleware>>;

/// What sits at the end of the chain.
pub(crate) enum Endpoint {
    Handler(BoxedHandler),
    NotFound,
}

/// The remainder of the middleware chain.
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    endpoint: &'a Endpoint,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stack: &'a [Arc<dyn Middleware>], endpoint: &'a Endpoint) -> Self {
        Self { stack, endpoint }
    }

    /// Runs the following middleware, or the handler once the chain is
    /// exhausted.
    pub fn run<'b>(self, request: Request, writer: &'b mut dyn ResponseWriter) -> BoxFuture<'b, ()>
    where
        'a: 'b,
    {
        match self.stack.split_first() {
            Some((first, rest)) => first.handle(request, writer, Next { stack: rest, endpoint: self.endpoint }),
            None => endpoint(self.endpoint, request, writer),
        }
    }
}

fn endpoint<'a>(
    endpoint: &'a Endpoint,
    request: Request,
    writer: &'a mut dyn ResponseWriter,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let reply = match endpoint {
            Endpoint::Handler(handler) => {
                trace!(handler = handler.name(), url = %request.url(), "calling handler");
                handler.call(request.clone()).await
            }
            Endpoint::NotFound => not_found(&request).into(),
        };
        resolve(writer, &request, reply, None).await
    })
}

fn not_found(request: &Request) -> Problem {
    let mut problem = Problem::default();
    problem.status = StatusCode::NOT_FOUND.as_u16();
    problem.detail = format!("no route for {} {}", request.method(), request.path());
    problem
}
