//! Per-request server-error notification.
//!
//! Every request carries a [`Hook`]: an append-only list of callbacks that the
//! write path invokes once when it emits a `5xx` status. Each callback gets the
//! [`ServerError`] and an [`ErrorNext`] continuation; calling
//! [`ErrorNext::run`] hands control to the next callback, not calling it stops
//! the chain.
//!
//! ```text
//! hook.on_error(a); hook.on_error(b);
//!
//! handle_error(e) ─▶ a(e, next₁) ──next₁.run(e)──▶ b(e, next₂) ──next₂.run(e)──▶ (end)
//! ```
//!
//! Dispatch walks the list by index over a snapshot, so a callback may
//! register further callbacks without deadlocking; those take effect on the
//! next server error.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use http::StatusCode;
use thiserror::Error;

use crate::status::status_text;

/// Which branch of the write algorithm produced the server error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerErrorKind {
    Writer,
    Body,
    Stream,
    Default,
}

impl ServerErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Writer  => "writer",
            Self::Body    => "body",
            Self::Stream  => "stream",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `5xx` response that has just been written.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{}: {}", status.as_u16(), status_text(*status))]
pub struct ServerError {
    pub status: StatusCode,
    pub url: String,
    pub kind: ServerErrorKind,
}

type Callback = Arc<dyn Fn(&ServerError, ErrorNext<'_>) + Send + Sync>;

/// Continuation handed to each hook callback.
pub struct ErrorNext<'a> {
    callbacks: &'a [Callback],
    index: usize,
}

impl ErrorNext<'_> {
    /// Invokes the following callback, if any, with `error`.
    pub fn run(self, error: &ServerError) {
        if let Some(callback) = self.callbacks.get(self.index) {
            callback(error, ErrorNext { callbacks: self.callbacks, index: self.index + 1 });
        }
    }
}

/// Ordered observer chain for server errors, scoped to one request.
#[derive(Default)]
pub struct Hook {
    callbacks: Mutex<Vec<Callback>>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback. Callbacks run in registration order.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ServerError, ErrorNext<'_>) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the chain from the first callback. No-op when empty.
    pub(crate) fn handle_error(&self, error: &ServerError) {
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        ErrorNext { callbacks: &callbacks, index: 0 }.run(error);
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("callbacks", &self.len()).finish()
    }
}
