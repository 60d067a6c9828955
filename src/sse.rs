//! Server-sent events.
//!
//! [`Builder::sse`](crate::Builder::sse) streams raw byte chunks; this module
//! supplies the event framing and a typed sender for it:
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tsuki::{Builder, Request, sse};
//!
//! async fn ticks(_req: Request) -> Builder {
//!     let (events, stream) = sse::channel(16);
//!
//!     tokio::spawn(async move {
//!         for i in 0..5 {
//!             let event = sse::Event::new().event("tick").data(i.to_string());
//!             if events.send(event).await.is_err() {
//!                 break; // client gone
//!             }
//!         }
//!     });
//!
//!     Builder::new(StatusCode::OK).sse(stream)
//! }
//! ```
//!
//! ## Wire format
//!
//! ```text
//! id: 7
//! event: tick
//! retry: 3000
//! data: 42
//!
//! ```
//!
//! Empty fields (and a zero `retry`) are omitted entirely.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

/// One server-sent event.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Event {
    pub id: String,
    pub event: String,
    pub data: Bytes,
    /// Reconnection delay in milliseconds; `0` omits the field.
    pub retry: u64,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn retry(mut self, millis: u64) -> Self {
        self.retry = millis;
        self
    }

    /// Encodes the event, terminated by a blank line.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();

        if !self.id.is_empty() {
            field(&mut buf, "id", self.id.as_bytes());
        }
        if !self.event.is_empty() {
            field(&mut buf, "event", self.event.as_bytes());
        }
        if self.retry > 0 {
            field(&mut buf, "retry", self.retry.to_string().as_bytes());
        }
        if !self.data.is_empty() {
            field(&mut buf, "data", &self.data);
        }
        buf.put_u8(b'\n');

        buf.freeze()
    }
}

fn field(buf: &mut BytesMut, name: &str, value: &[u8]) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value);
    buf.put_u8(b'\n');
}

/// Producer half of [`channel`].
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Bytes>,
}

impl EventSender {
    /// Queues `event`, waiting for capacity. Fails once the response is gone.
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Bytes>> {
        self.tx.send(event.to_bytes()).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An event sender and the byte stream to hand to
/// [`Builder::sse`](crate::Builder::sse).
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, rx)
}
