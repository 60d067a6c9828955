//! What a handler returns, and the capabilities that decide how it renders.
//!
//! A handler's result is turned into a [`Reply`] through [`IntoReply`]. The
//! resolution pipeline then dispatches on the variant:
//!
//! | Reply | Rendering |
//! |---|---|
//! | `Empty` | `200 OK`, no body (or the parent builder as-is) |
//! | `Builder` | written directly, merged over the parent |
//! | `Respond` | the value's own [`Responder::respond`] builder, merged over the parent |
//! | `Raw` | [`RawResponder::serve`] writes to the transport itself |
//! | `Failed` | wrapped in a [`Problem`] and rendered like `Respond` |
//!
//! Any `std::error::Error + Send + Sync + 'static` converts into
//! `Reply::Failed`, so a handler returning `Result<_, Reply>` can use `?` on
//! ordinary errors.

use std::fmt;
use std::sync::Arc;

use crate::builder::Builder;
use crate::problem::Problem;
use crate::request::Request;
use crate::writer::ResponseWriter;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A cheaply clonable error, as stored in replies and problems.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A value that knows how to describe its own response for a request.
///
/// [`Problem`] and [`Builder`] implement it; implement it on your own types
/// and return them with [`Reply::responder`].
pub trait Responder: Send + Sync + 'static {
    fn respond(&self, request: &Request) -> Builder;
}

/// A value that takes full control of the transport, bypassing builders.
pub trait RawResponder: Send + Sync + 'static {
    fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request);
}

/// The result of a handler, ready for resolution.
#[derive(Clone)]
pub enum Reply {
    Empty,
    Builder(Box<Builder>),
    Respond(Arc<dyn Responder>),
    Raw(Arc<dyn RawResponder>),
    Failed(SharedError),
}

impl Reply {
    pub fn responder(responder: impl Responder) -> Self {
        Self::Respond(Arc::new(responder))
    }

    pub fn raw(raw: impl RawResponder) -> Self {
        Self::Raw(Arc::new(raw))
    }

    /// Wraps an already boxed error.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(Arc::from(error.into()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty      => f.write_str("Empty"),
            Self::Builder(b) => f.debug_tuple("Builder").field(b).finish(),
            Self::Respond(_) => f.write_str("Respond(..)"),
            Self::Raw(_)     => f.write_str("Raw(..)"),
            Self::Failed(e)  => f.debug_tuple("Failed").field(&e.to_string()).finish(),
        }
    }
}

impl<E> From<E> for Reply
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::Failed(Arc::new(error))
    }
}

impl From<Builder> for Reply {
    fn from(builder: Builder) -> Self {
        Self::Builder(Box::new(builder))
    }
}

impl From<Problem> for Reply {
    fn from(problem: Problem) -> Self {
        Self::Respond(Arc::new(problem))
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a [`Reply`].
///
/// ```rust
/// use http::StatusCode;
/// use tsuki::{Builder, Problem, Reply, Request};
///
/// async fn show(_req: Request) -> Builder {
///     Builder::new(StatusCode::OK).text("hello")
/// }
///
/// async fn delete(_req: Request) -> Result<(), Reply> {
///     std::fs::remove_file("/tmp/does-not-exist")?; // io::Error → 500 problem
///     Ok(())
/// }
///
/// async fn find(_req: Request) -> Result<Builder, Problem> {
///     Err(Problem::new(std::fmt::Error, StatusCode::NOT_FOUND))
/// }
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply { self }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply { Reply::Empty }
}

impl IntoReply for Builder {
    fn into_reply(self) -> Reply { self.into() }
}

impl IntoReply for Problem {
    fn into_reply(self) -> Reply { self.into() }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Reply>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(value) => value.into_reply(),
            Err(error) => error.into(),
        }
    }
}
