//! HTTP server and graceful shutdown.
//!
//! # Request flow
//!
//! hyper wants a `Response` value, while the resolution pipeline writes to a
//! [`ResponseWriter`] as it goes. The two meet through channels:
//!
//! ```text
//! hyper service ──spawn──▶ router.dispatch(request, ChannelWriter)
//!      │                         │ write_head ──oneshot──▶ status + headers
//!      │                         │ write      ──mpsc────▶ body frames
//!      ▼                         ▼
//! Response<ChannelBody> ◀── awaits the head, then streams the body
//! ```
//!
//! The body channel holds `BODY_FRAMES` frames. A write that finds it full
//! is parked in the writer until [`ResponseWriter::ready`] delivers it, which
//! streaming responses await before taking their next chunk: a slow client
//! slows the producer down rather than growing memory.
//!
//! The body holds a drop guard for the request's cancellation token: when
//! hyper drops it (response finished, or the client went away) streaming
//! responses stop.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body::{Body, Frame};
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::router::Router;
use crate::writer::ResponseWriter;

/// Body frames buffered between a request task and hyper.
const BODY_FRAMES: usize = 16;

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use tsuki::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self { addr })
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// [`serve`](Server::serve) with a custom shutdown trigger.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);

        info!(addr = %listener.local_addr()?, "tsuki listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first so a signal stops accepting even if
                // connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| dispatch(Arc::clone(&router), req));

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsuki stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request on its own task and answers hyper once the head is
/// written. Failures are rendered as responses, so hyper never sees an error.
async fn dispatch<B>(
    router: Arc<Router>,
    req: http::Request<B>,
) -> Result<http::Response<ChannelBody>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(uri = %parts.uri, "request body read failed: {e}");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_FRAMES);

    let request = Request::new(parts, body, cancel);
    tokio::spawn(async move {
        let mut writer = ChannelWriter::new(head_tx, body_tx);
        router.dispatch(request, &mut writer).await;
        if let Err(e) = writer.ready().await {
            debug!("response body dropped before the last frames: {e}");
        }
    });

    let Ok((status, headers)) = head_rx.await else {
        // The writer sends a head when dropped, so the task was aborted.
        error!("request task ended before writing a response");
        return Ok(status_only(StatusCode::INTERNAL_SERVER_ERROR));
    };

    let mut response = http::Response::new(ChannelBody { rx: body_rx, _guard: Some(guard) });
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn status_only(status: StatusCode) -> http::Response<ChannelBody> {
    let (_, rx) = mpsc::channel(1);
    let mut response = http::Response::new(ChannelBody { rx, _guard: None });
    *response.status_mut() = status;
    response
}

/// [`ResponseWriter`] feeding a hyper response through channels.
struct ChannelWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<(StatusCode, HeaderMap)>>,
    body: mpsc::Sender<Bytes>,
    // Frames written while the channel was full, in order.
    parked: VecDeque<Bytes>,
    status: Option<StatusCode>,
}

impl ChannelWriter {
    fn new(head: oneshot::Sender<(StatusCode, HeaderMap)>, body: mpsc::Sender<Bytes>) -> Self {
        Self { headers: HeaderMap::new(), head: Some(head), body, parked: VecDeque::new(), status: None }
    }
}

fn body_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response body closed")
}

impl ResponseWriter for ChannelWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        let Some(head) = self.head.take() else {
            warn!(written = ?self.status, ignored = %status, "superfluous write_head");
            return;
        };
        self.status = Some(status);
        if head.send((status, self.headers.clone())).is_err() {
            debug!("client went away before the response head");
        }
    }

    fn head_written(&self) -> bool {
        self.head.is_none()
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.head.is_some() {
            self.write_head(StatusCode::OK);
        }
        if self.body.is_closed() {
            return Err(body_closed());
        }

        let frame = Bytes::copy_from_slice(chunk);
        if !self.parked.is_empty() {
            self.parked.push_back(frame);
            return Ok(());
        }
        match self.body.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) => {
                self.parked.push_back(frame);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(body_closed()),
        }
    }

    fn can_flush(&self) -> bool {
        true
    }

    /// Frames reach hyper as soon as the channel has room; see
    /// [`ready`](ResponseWriter::ready).
    fn flush(&mut self) -> io::Result<()> {
        if self.body.is_closed() {
            return Err(body_closed());
        }
        Ok(())
    }

    fn ready(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            while let Some(frame) = self.parked.pop_front() {
                self.body.send(frame).await.map_err(|_| body_closed())?;
            }
            Ok(())
        })
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        // A raw responder may finish without writing anything; a panic
        // unwinding through the task must not look like success.
        if self.head.is_some() {
            let status = if std::thread::panicking() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            self.write_head(status);
        }
    }
}

/// Response body fed by a [`ChannelWriter`].
pub(crate) struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
    _guard: Option<DropGuard>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C) the process receives.
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
