//! In-memory response recording for tests.
//!
//! ```rust
//! use http::StatusCode;
//! use tsuki::{Builder, Request, testing};
//!
//! async fn hello(_req: Request) -> Builder {
//!     Builder::new(StatusCode::OK).text("hi")
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let rec = testing::record(hello, http::Request::get("/").body("").unwrap()).await;
//! assert_eq!(rec.status(), StatusCode::OK);
//! assert_eq!(rec.body_str(), "hi");
//! # }
//! ```

use std::borrow::Cow;
use std::io;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::handler::Handler;
use crate::request::Request;
use crate::resolve::resolve;
use crate::writer::ResponseWriter;

/// A [`ResponseWriter`] that keeps everything in memory.
#[derive(Clone, Debug)]
pub struct Recorder {
    pending: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
    flushes: usize,
    flushable: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            pending: HeaderMap::new(),
            head: None,
            body: Vec::new(),
            flushes: 0,
            flushable: true,
        }
    }

    /// A recorder that reports it cannot flush, like a buffering transport.
    pub fn without_flush() -> Self {
        Self { flushable: false, ..Self::new() }
    }

    /// The written status; `200` if only the body was written, or nothing.
    pub fn status(&self) -> StatusCode {
        self.head.as_ref().map_or(StatusCode::OK, |(status, _)| *status)
    }

    /// Headers as sent with the head, or the pending ones if no head yet.
    pub fn headers(&self) -> &HeaderMap {
        match &self.head {
            Some((_, headers)) => headers,
            None => &self.pending,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(crate::headers::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl ResponseWriter for Recorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.pending
    }

    fn write_head(&mut self, status: StatusCode) {
        if let Some((written, _)) = &self.head {
            warn!(%written, ignored = %status, "superfluous write_head");
            return;
        }
        self.head = Some((status, self.pending.clone()));
    }

    fn head_written(&self) -> bool {
        self.head.is_some()
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.head.is_none() {
            self.write_head(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn can_flush(&self) -> bool {
        self.flushable
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.flushable {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "flush not supported"));
        }
        self.flushes += 1;
        Ok(())
    }
}

/// Runs `handler` on `request` without a router and records the response.
pub async fn record<H, B>(handler: H, request: http::Request<B>) -> Recorder
where
    H: Handler,
    B: Into<bytes::Bytes>,
{
    let request = Request::from(request);
    let reply = handler.into_boxed_handler().call(request.clone()).await;

    let mut rec = Recorder::new();
    resolve(&mut rec, &request, reply, None).await;
    rec
}
