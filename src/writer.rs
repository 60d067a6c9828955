//! The transport sink a response is written into.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::handler::BoxFuture;

/// Where a resolved response goes: header map, status line, body bytes.
///
/// Writes are synchronous and must not block; implementations queue bytes
/// (the server forwards them to hyper through a bounded channel, the
/// [`Recorder`](crate::testing::Recorder) keeps them in memory). Producers of
/// many chunks await [`ready`](ResponseWriter::ready) between writes so the
/// queue stays bounded by what the client actually reads. Headers must be
/// final before [`write_head`](ResponseWriter::write_head) is called; changes
/// made afterwards are not sent.
pub trait ResponseWriter: Send {
    /// Header map of the pending response.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Emits the status line with the current headers. Only the first call
    /// has an effect.
    fn write_head(&mut self, status: StatusCode);

    fn head_written(&self) -> bool;

    /// Writes body bytes, emitting a `200 OK` head first if none was written.
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Whether [`flush`](ResponseWriter::flush) pushes bytes to the client
    /// incrementally. Streaming responses require it.
    fn can_flush(&self) -> bool {
        false
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "flush not supported"))
    }

    /// Resolves once previously written bytes have been handed to the
    /// transport, failing if the client went away.
    fn ready(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(std::future::ready(Ok(())))
    }
}
