use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::warn;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::reply::{BoxError, Reply};
use crate::request::Request;
use crate::resolve::resolve;
use crate::writer::ResponseWriter;

type PanicMapper = Box<dyn Fn(Box<dyn Any + Send>) -> BoxError + Send + Sync>;

/// Catches panics from the rest of the chain and resolves them as a `500`
/// problem.
///
/// If the panic happens after the response head went out, nothing more can be
/// sent and the panic is only logged.
pub struct Recover {
    map: PanicMapper,
}

impl Recover {
    /// Panic payloads that are strings become the problem detail; anything
    /// else reads "an unexpected error occurred".
    pub fn new() -> Self {
        Self::with(|payload| Box::new(Error::Panic(message(payload.as_ref()))))
    }

    /// Maps the panic payload to the error that gets resolved.
    pub fn with<F>(map: F) -> Self
    where
        F: Fn(Box<dyn Any + Send>) -> BoxError + Send + Sync + 'static,
    {
        Self { map: Box::new(map) }
    }
}

impl Default for Recover {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Recover {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(request.clone(), &mut *writer))
                .catch_unwind()
                .await;

            let Err(payload) = outcome else { return };
            let error = (self.map)(payload);

            if writer.head_written() {
                warn!(url = %request.url(), "panic after response head was written: {error}");
                return;
            }

            warn!(url = %request.url(), "recovered from panic: {error}");
            resolve(writer, &request, Reply::failed(error), None).await
        })
    }
}

fn message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "an unexpected error occurred".to_owned()
    }
}
