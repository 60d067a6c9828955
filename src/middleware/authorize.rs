use http::StatusCode;

use super::{Middleware, Next};
use crate::builder::failed;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::problem::Problem;
use crate::reply::BoxError;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Decides whether a request may proceed.
///
/// Implemented for any `Fn(&Request) -> Result<(), BoxError>`.
pub trait Authorizer: Send + Sync + 'static {
    fn authorize(&self, request: &Request) -> Result<(), BoxError>;
}

impl<F> Authorizer for F
where
    F: Fn(&Request) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn authorize(&self, request: &Request) -> Result<(), BoxError> {
        self(request)
    }
}

/// Rejects requests the [`Authorizer`] refuses with a `403` problem whose
/// detail starts with "authorization failed".
pub struct Authorize<A> {
    authorizer: A,
}

impl<A: Authorizer> Authorize<A> {
    pub fn new(authorizer: A) -> Self {
        Self { authorizer }
    }
}

/// Runs `authorizer` against `request` outside of any middleware chain.
pub fn authorize_with(request: &Request, authorizer: &impl Authorizer) -> Result<(), Problem> {
    authorizer
        .authorize(request)
        .map_err(|err| Problem::new(Error::AuthorizationFailed(err), StatusCode::FORBIDDEN))
}

impl<A: Authorizer> Middleware for Authorize<A> {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        match authorize_with(&request, &self.authorizer) {
            Ok(()) => next.run(request, writer),
            Err(problem) => Box::pin(async move { failed(problem).handle(writer, &request).await }),
        }
    }
}
