//! The response [`Builder`] and its write algorithm.
//!
//! A builder is a plain value describing a pending response: an optional
//! status, headers, and a payload. Every mutator consumes the builder and
//! returns the changed one, so to branch off a shared base you clone it first;
//! nothing in a clone aliases the original.
//!
//! # Payload priority
//!
//! A builder may hold several payloads at once. [`Builder::handle`] acts on the
//! first one present in this order and ignores the rest:
//!
//! 1. **error**: resolved through the pipeline with this builder (error and
//!    writer removed) as the parent
//! 2. **writer**: head written, then the closure gets the transport
//! 3. **body**: read fully, then head and bytes written
//! 4. **stream**: head written, then every chunk written and flushed until the
//!    channel closes or the request is cancelled
//! 5. **nothing**: head only
//!
//! That order belongs to the default write routine. A builder given its own
//! routine with [`Builder::handler`] is written by it instead; the routine can
//! still delegate to [`Builder::handle_default`].

use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::debug;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::headers::Headers;
use crate::hook::{ServerError, ServerErrorKind};
use crate::problem::Problem;
use crate::reply::{Reply, Responder};
use crate::request::Request;
use crate::resolve::resolve;
use crate::status::is_server_error;
use crate::writer::ResponseWriter;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Builder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    EventStream,  // text/event-stream  (SSE)
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    ProblemJson,  // application/problem+json  (RFC 9457)
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::ProblemJson => "application/problem+json",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

type Reader = Arc<Mutex<Box<dyn Read + Send>>>;
type Stream = Arc<AsyncMutex<mpsc::Receiver<Bytes>>>;
type BodyWriter = Arc<dyn Fn(&mut dyn ResponseWriter) + Send + Sync>;

/// A custom write routine, see [`Builder::handler`].
pub type WriteRoutine =
    Arc<dyn for<'a> Fn(Builder, &'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a, ()> + Send + Sync>;

/// A response body source.
///
/// Byte bodies can be written any number of times. A reader is drained on the
/// first write; clones of the builder share it.
#[derive(Clone)]
pub enum Body {
    Bytes(Bytes),
    Reader(Reader),
}

impl Body {
    fn read_all(&self) -> std::io::Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Reader(reader) => {
                let mut buf = Vec::new();
                reader
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Which payload [`Builder::handle`] will act on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Payload {
    Error,
    Writer,
    Body,
    Stream,
    Empty,
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Value description of a pending HTTP response.
///
/// ```rust
/// use http::StatusCode;
/// use tsuki::Builder;
///
/// let base = Builder::new(StatusCode::OK).header("x-request-id", "42");
///
/// let created = base.clone().status(StatusCode::CREATED).json(&[1, 2, 3]);
/// let plain = base.text("hello");
///
/// assert_eq!(created.status_code(), Some(StatusCode::CREATED));
/// assert_eq!(plain.headers_ref().first("x-request-id"), Some("42"));
/// ```
#[derive(Clone, Default)]
pub struct Builder {
    status: Option<StatusCode>,
    headers: Headers,
    error: Option<Reply>,
    writer: Option<BodyWriter>,
    body: Option<Body>,
    stream: Option<Stream>,
    routine: Option<WriteRoutine>,
}

/// Shorthand for [`Builder::new`].
pub fn response(status: StatusCode) -> Builder {
    Builder::new(status)
}

/// A `500` builder failing with `error`.
///
/// Typical for errors outside the request's control (database, upstream). A
/// [`Problem`] passed here keeps its own status when rendered.
pub fn failed(error: impl Into<Reply>) -> Builder {
    Builder::new(StatusCode::INTERNAL_SERVER_ERROR).failed(error)
}

impl Builder {
    pub fn new(status: StatusCode) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Replaces all headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a header, replacing previous values for `key`.
    ///
    /// An invalid name or value turns the builder into a `500` failure.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        match self.headers.set(key, value) {
            Ok(()) => self,
            Err(err) => self.status(StatusCode::INTERNAL_SERVER_ERROR).failed(err),
        }
    }

    /// Adds a header value without replacing previous ones.
    pub fn append_header(mut self, key: &str, value: &str) -> Self {
        match self.headers.append(key, value) {
            Ok(()) => self,
            Err(err) => self.status(StatusCode::INTERNAL_SERVER_ERROR).failed(err),
        }
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Bytes(body.into()));
        self
    }

    /// Lazy body, read to the end when the response is written.
    pub fn body_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.body = Some(Body::Reader(Arc::new(Mutex::new(Box::new(reader)))));
        self
    }

    /// Body with an explicit content type.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Self {
        self.header("content-type", content_type.as_str()).body(body)
    }

    pub fn text(self, body: impl Into<String>) -> Self {
        self.bytes(ContentType::Text, body.into())
    }

    pub fn html(self, body: impl Into<String>) -> Self {
        self.bytes(ContentType::Html, body.into())
    }

    /// Serialises `value` as the body.
    ///
    /// If serialisation fails the builder becomes a `500` failing with the
    /// serde error instead.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.bytes(ContentType::Json, bytes),
            Err(err) => self.status(StatusCode::INTERNAL_SERVER_ERROR).failed(Error::Json(err)),
        }
    }

    /// Streams chunks from `stream` until it closes or the client goes away.
    ///
    /// Sets `Cache-Control: no-cache` and `Connection: keep-alive`.
    pub fn stream(mut self, stream: mpsc::Receiver<Bytes>) -> Self {
        self.stream = Some(Arc::new(AsyncMutex::new(stream)));
        self.header("cache-control", "no-cache")
            .header("connection", "keep-alive")
    }

    /// [`stream`](Builder::stream) with `Content-Type: text/event-stream`.
    /// Pair it with [`sse::channel`](crate::sse::channel) to send typed events.
    pub fn sse(self, stream: mpsc::Receiver<Bytes>) -> Self {
        self.header("content-type", ContentType::EventStream.as_str())
            .stream(stream)
    }

    /// Appends a `Set-Cookie` header with the cookie's string form. Empty
    /// cookies are skipped.
    pub fn cookie(self, cookie: impl fmt::Display) -> Self {
        let cookie = cookie.to_string();
        if cookie.is_empty() {
            return self;
        }
        self.append_header("set-cookie", &cookie)
    }

    /// Marks the builder as failing with `error`. The status is unchanged.
    pub fn failed(mut self, error: impl Into<Reply>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Hands the transport to `writer` once the head is written. Useful for
    /// downloads and custom framing.
    pub fn body_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter) + Send + Sync + 'static,
    {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Replaces the write routine [`handle`](Builder::handle) runs.
    ///
    /// ```rust
    /// use http::StatusCode;
    /// use tsuki::Builder;
    ///
    /// let builder = Builder::new(StatusCode::OK).text("hi").handler(|builder, writer, request| {
    ///     Box::pin(builder.header("x-served-by", "edge").handle_default(writer, request))
    /// });
    /// ```
    pub fn handler<F>(mut self, routine: F) -> Self
    where
        F: for<'a> Fn(Builder, &'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        self.routine = Some(Arc::new(routine));
        self
    }

    pub fn without_error(mut self) -> Self {
        self.error = None;
        self
    }

    /// Overrides this builder with every field set on `other`.
    ///
    /// Status and payloads are taken from `other` when present. Headers are
    /// overlaid key by key: keys set on `other` replace this builder's values,
    /// other keys are kept.
    pub fn merge(mut self, other: Builder) -> Self {
        if other.status.is_some() {
            self.status = other.status;
        }
        self.headers.overlay(&other.headers);
        if other.error.is_some() {
            self.error = other.error;
        }
        if other.writer.is_some() {
            self.writer = other.writer;
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        if other.stream.is_some() {
            self.stream = other.stream;
        }
        if other.routine.is_some() {
            self.routine = other.routine;
        }
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// `None` until a status is set; written as `200`.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers_ref(&self) -> &Headers {
        &self.headers
    }

    pub fn error_ref(&self) -> Option<&Reply> {
        self.error.as_ref()
    }

    pub fn payload(&self) -> Payload {
        if self.error.is_some() {
            Payload::Error
        } else if self.writer.is_some() {
            Payload::Writer
        } else if self.body.is_some() {
            Payload::Body
        } else if self.stream.is_some() {
            Payload::Stream
        } else {
            Payload::Empty
        }
    }

    // ── Writing ───────────────────────────────────────────────────────────

    /// Writes the response to `writer` with this builder's routine, or
    /// [`handle_default`](Builder::handle_default) when none was set.
    pub async fn handle(self, writer: &mut dyn ResponseWriter, request: &Request) {
        match self.routine.clone() {
            Some(routine) => routine(self, writer, request).await,
            None => self.handle_default(writer, request).await,
        }
    }

    /// The default write routine: the first payload in priority order.
    ///
    /// The request's [`Hook`](crate::Hook) is notified once if the written
    /// status is `5xx`.
    pub async fn handle_default(self, writer: &mut dyn ResponseWriter, request: &Request) {
        if let Some(error) = self.error.clone() {
            // The parent keeps its status, headers and data payloads, but a
            // writer would outrank whatever the error renders.
            let mut parent = self.without_error();
            parent.writer = None;
            return resolve(writer, request, error, Some(parent)).await;
        }

        let status = self.status.unwrap_or(StatusCode::OK);

        if let Some(body_writer) = &self.writer {
            self.write_head(writer, request, status, ServerErrorKind::Writer);
            body_writer(writer);
            return;
        }

        if let Some(body) = &self.body {
            let bytes = match body.read_all() {
                Ok(bytes) => bytes,
                Err(err) => {
                    let problem = Problem::new(Error::BodyRead(err), StatusCode::INTERNAL_SERVER_ERROR);
                    return resolve(writer, request, problem.into(), None).await;
                }
            };
            self.write_head(writer, request, status, ServerErrorKind::Body);
            if let Err(err) = writer.write(&bytes) {
                debug!(url = %request.url(), "body write failed: {err}");
            }
            return;
        }

        if let Some(stream) = &self.stream {
            if !writer.can_flush() {
                let problem = Problem::new(Error::FlushUnsupported, StatusCode::INTERNAL_SERVER_ERROR);
                return resolve(writer, request, problem.into(), None).await;
            }
            self.write_head(writer, request, status, ServerErrorKind::Stream);
            return stream_to(writer, request, stream).await;
        }

        self.write_head(writer, request, status, ServerErrorKind::Default);
    }

    /// Copies headers, emits the status line and notifies the hook on `5xx`.
    fn write_head(
        &self,
        writer: &mut dyn ResponseWriter,
        request: &Request,
        status: StatusCode,
        kind: ServerErrorKind,
    ) {
        self.headers.write_into(writer.headers_mut());
        writer.write_head(status);

        if is_server_error(status) {
            request.hook().handle_error(&ServerError { status, url: request.url(), kind });
        }
    }
}

/// Forwards chunks until the channel closes or the request is cancelled,
/// whichever comes first.
///
/// The next chunk is only taken from the channel once the writer is ready,
/// so a client that stops reading stalls the producer instead of growing a
/// queue.
async fn stream_to(writer: &mut dyn ResponseWriter, request: &Request, stream: &Stream) {
    let mut stream = stream.lock().await;
    let cancelled = request.cancellation();

    if let Err(err) = writer.flush() {
        debug!(url = %request.url(), "stream flush failed: {err}");
        return;
    }

    loop {
        tokio::select! {
            biased;

            () = cancelled.cancelled() => {
                debug!(url = %request.url(), "stream cancelled while the client was busy");
                return;
            }

            ready = writer.ready() => {
                if let Err(err) = ready {
                    debug!(url = %request.url(), "stream writer closed: {err}");
                    return;
                }
            }
        }

        tokio::select! {
            // Cancellation wins ties so nothing is written once it fired.
            biased;

            () = cancelled.cancelled() => {
                debug!(url = %request.url(), "stream cancelled");
                return;
            }

            chunk = stream.recv() => {
                let Some(chunk) = chunk else { return };
                if let Err(err) = writer.write(&chunk).and_then(|()| writer.flush()) {
                    debug!(url = %request.url(), "stream write failed: {err}");
                    return;
                }
            }
        }
    }
}

impl Responder for Builder {
    fn respond(&self, _request: &Request) -> Builder {
        self.clone()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("error", &self.error)
            .field("payload", &self.payload())
            .field("routine", &self.routine.is_some())
            .finish()
    }
}
