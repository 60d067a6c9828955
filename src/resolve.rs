//! Response resolution: from a handler's [`Reply`] to bytes on the transport.
//!
//! ```text
//!            ┌──────────── parent builder (optional) ────────────┐
//!            ▼                                                   │
//! Reply ─┬─ Empty    ─▶ parent, or bare 200 ─────────────────────┼─▶ Builder::handle
//!        ├─ Builder  ─▶ parent.merge(builder) ───────────────────┤
//!        ├─ Respond  ─▶ parent.merge(responder.respond(req)) ────┤
//!        ├─ Failed   ─▶ Problem(err, parent status or 500) ──────┘
//!        └─ Raw      ─▶ raw.serve(writer, req)
//! ```
//!
//! `Builder::handle` calls back in here when the builder carries an error, with
//! itself (minus the error) as the parent. Each round trip strips one level of
//! nesting, so resolution always ends in exactly one write.

use http::StatusCode;

use crate::builder::Builder;
use crate::handler::BoxFuture;
use crate::problem::Problem;
use crate::reply::{Reply, Responder};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Resolves `reply` for `request` and writes it to `writer`.
///
/// When `parent` is given, the builder the reply produces is merged over it,
/// so fields the reply leaves unset keep the parent's values.
pub fn resolve<'a>(
    writer: &'a mut dyn ResponseWriter,
    request: &'a Request,
    reply: Reply,
    parent: Option<Builder>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let builder = match reply {
            Reply::Empty => parent.unwrap_or_default(),
            Reply::Builder(builder) => merged(parent, *builder),
            Reply::Respond(responder) => merged(parent, responder.respond(request)),
            Reply::Raw(raw) => return raw.serve(writer, request),
            Reply::Failed(error) => {
                let status = parent
                    .as_ref()
                    .and_then(Builder::status_code)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let problem = Problem::shared(error, status);
                merged(parent, problem.respond(request))
            }
        };

        builder.handle(writer, request).await
    })
}

fn merged(parent: Option<Builder>, builder: Builder) -> Builder {
    match parent {
        Some(parent) => parent.merge(builder),
        None => builder,
    }
}
