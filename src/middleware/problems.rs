use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::problem::ProblemControls;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Makes every [`Problem`](crate::Problem) rendered for the request use
/// `controls` instead of the built-in defaults.
#[derive(Clone, Debug)]
pub struct Problems {
    controls: ProblemControls,
}

impl Problems {
    pub fn new(controls: ProblemControls) -> Self {
        Self { controls }
    }
}

impl Middleware for Problems {
    fn handle<'a>(
        &'a self,
        mut request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        request.extensions_mut().insert(self.controls.clone());
        next.run(request, writer)
    }
}
