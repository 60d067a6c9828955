use http::StatusCode;

use super::{Middleware, Next};
use crate::builder::failed;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::problem::Problem;
use crate::reply::BoxError;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Rewrites a request before the rest of the chain sees it.
///
/// Implemented for any `Fn(Request) -> Result<Request, BoxError>`.
pub trait Transformer: Send + Sync + 'static {
    fn transform(&self, request: Request) -> Result<Request, BoxError>;
}

impl<F> Transformer for F
where
    F: Fn(Request) -> Result<Request, BoxError> + Send + Sync + 'static,
{
    fn transform(&self, request: Request) -> Result<Request, BoxError> {
        self(request)
    }
}

/// Hands the transformed request to the next step, or answers with a `422`
/// problem whose detail starts with "transform failed".
pub struct Transform<T> {
    transformer: T,
}

impl<T: Transformer> Transform<T> {
    pub fn new(transformer: T) -> Self {
        Self { transformer }
    }
}

/// Runs `transformer` on `request` outside of any middleware chain.
pub fn transform_with(request: Request, transformer: &impl Transformer) -> Result<Request, Problem> {
    transformer
        .transform(request)
        .map_err(|err| Problem::new(Error::TransformFailed(err), StatusCode::UNPROCESSABLE_ENTITY))
}

impl<T: Transformer> Middleware for Transform<T> {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        match transform_with(request.clone(), &self.transformer) {
            Ok(transformed) => next.run(transformed, writer),
            Err(problem) => Box::pin(async move { failed(problem).handle(writer, &request).await }),
        }
    }
}
