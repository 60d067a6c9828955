use http::StatusCode;

use super::{Middleware, Next};
use crate::builder::failed;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::problem::Problem;
use crate::reply::BoxError;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Checks a request before it reaches the handler.
pub trait Validator: Send + Sync + 'static {
    fn validate(&self, request: &Request) -> Result<(), BoxError>;
}

impl<F> Validator for F
where
    F: Fn(&Request) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn validate(&self, request: &Request) -> Result<(), BoxError> {
        self(request)
    }
}

/// Rejects invalid requests with a `422` problem whose detail starts with
/// "validation failed".
pub struct Validate<V> {
    validator: V,
}

impl<V: Validator> Validate<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }
}

/// Runs `validator` against `request` outside of any middleware chain.
pub fn validate_with(request: &Request, validator: &impl Validator) -> Result<(), Problem> {
    validator
        .validate(request)
        .map_err(|err| Problem::new(Error::ValidationFailed(err), StatusCode::UNPROCESSABLE_ENTITY))
}

impl<V: Validator> Middleware for Validate<V> {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        match validate_with(&request, &self.validator) {
            Ok(()) => next.run(request, writer),
            Err(problem) => Box::pin(async move { failed(problem).handle(writer, &request).await }),
        }
    }
}
