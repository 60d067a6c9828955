use super::{Authorizer, Middleware, Next, Validator, authorize_with, validate_with};
use crate::builder::failed;
use crate::handler::BoxFuture;
use crate::problem::Problem;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// [`Authorize`](super::Authorize) followed by [`Validate`](super::Validate)
/// as one step: `403` when the authorizer refuses, otherwise `422` when the
/// validator does. The validator never sees unauthorized requests.
pub struct Check<A, V> {
    authorizer: A,
    validator: V,
}

impl<A: Authorizer, V: Validator> Check<A, V> {
    pub fn new(authorizer: A, validator: V) -> Self {
        Self { authorizer, validator }
    }
}

/// Runs both checks against `request` outside of any middleware chain.
pub fn check_with(
    request: &Request,
    authorizer: &impl Authorizer,
    validator: &impl Validator,
) -> Result<(), Problem> {
    authorize_with(request, authorizer)?;
    validate_with(request, validator)
}

impl<A: Authorizer, V: Validator> Middleware for Check<A, V> {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        match check_with(&request, &self.authorizer, &self.validator) {
            Ok(()) => next.run(request, writer),
            Err(problem) => Box::pin(async move { failed(problem).handle(writer, &request).await }),
        }
    }
}
