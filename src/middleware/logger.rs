use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::status::status_text;
use crate::writer::ResponseWriter;

/// Logs every server error written for the request at `error` level.
///
/// Subscribes to the request's [`Hook`](crate::Hook) and forwards to the
/// callbacks registered after it, so it composes with other subscribers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Logger {
    fn handle<'a>(
        &'a self,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        request.on_error(|err, next| {
            error!(
                status = err.status.as_u16(),
                text = status_text(err.status),
                url = %err.url,
                kind = %err.kind,
                "server error",
            );
            next.run(err);
        });

        next.run(request, writer)
    }
}
